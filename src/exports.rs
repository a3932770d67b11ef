//! The C ABI consumed by the managed host. Every function returns an HRESULT
//! unless noted; strings are NUL-terminated UTF-16.

#![allow(non_snake_case)]

use std::rc::Rc;

use windows::Win32::Foundation::{HINSTANCE, HWND};

use crate::boundary::guard;
use crate::error::{to_hresult, Error, Result, E_UNEXPECTED};
use crate::events::{HostCallbacks, HostMessageSink, InvokeCallback, WebMessageReceivedCallback, WebResourceRequestedCallback};
use crate::options::{WindowOptions, WindowStartupOptions};
use crate::platform::{self, WindowsPlatform};
use crate::registry::WindowHandle;
use crate::scheme::HostSchemeHandler;
use crate::wide::from_wide_ptr;

fn export(label: &str, f: impl FnOnce() -> Result<()>) -> i32 {
    guard(label, E_UNEXPECTED, || to_hresult(f()))
}

/// Run `f` on the UI thread's platform for the window behind `hwnd`.
fn on_window(hwnd: HWND, f: impl FnOnce(&WindowsPlatform, WindowHandle) -> Result<()>) -> Result<()> {
    let handle = WindowHandle::from_raw(hwnd.0 as isize);
    platform::with_platform(|p| f(p, handle))
}

/// # Safety
/// `ptr` must be null or a valid NUL-terminated UTF-16 string.
unsafe fn required_string(ptr: *const u16, what: &'static str) -> Result<String> {
    from_wide_ptr(ptr).ok_or(Error::InvalidArgument(what))
}

#[no_mangle]
pub extern "C" fn WebWindow_RegisterClass(hinstance: HINSTANCE) -> i32 {
    crate::init_logging();
    export("RegisterClass", || platform::register_class(hinstance))
}

/// Returns the new window handle, or null on failure.
#[no_mangle]
pub extern "C" fn WebWindow_CreateWebWindow(options: WindowStartupOptions) -> HWND {
    crate::init_logging();
    let created = guard("CreateWebWindow", Err(Error::runtime("CreateWebWindow", E_UNEXPECTED)), || {
        platform::claim_ui_thread()?;
        let window = unsafe { WindowOptions::from_startup(&options) };
        let events = Rc::new(HostCallbacks::from_startup(&options));
        platform::with_platform(|p| p.create_window(&window, events))
    });
    match created {
        Ok(handle) => HWND(handle.raw() as *mut _),
        Err(e) => {
            log::error!("{e}");
            HWND::default()
        }
    }
}

#[no_mangle]
pub extern "C" fn WebWindow_AttachWebView(hwnd: HWND, on_message: Option<WebMessageReceivedCallback>) -> i32 {
    export("AttachWebView", || {
        let on_message = on_message.ok_or(Error::InvalidArgument("message callback is null"))?;
        on_window(hwnd, |p, handle| p.attach(handle, Rc::new(HostMessageSink(on_message))))
    })
}

#[no_mangle]
pub unsafe extern "C" fn WebWindow_NavigateToUrl(hwnd: HWND, url: *const u16) -> i32 {
    export("NavigateToUrl", || {
        let url = required_string(url, "url is null")?;
        on_window(hwnd, |p, handle| p.navigate(handle, &url))
    })
}

#[no_mangle]
pub unsafe extern "C" fn WebWindow_NavigateToString(hwnd: HWND, html: *const u16) -> i32 {
    export("NavigateToString", || {
        let html = required_string(html, "html is null")?;
        on_window(hwnd, |p, handle| p.navigate_to_string(handle, &html))
    })
}

#[no_mangle]
pub unsafe extern "C" fn WebWindow_PostMessageAsJson(hwnd: HWND, json: *const u16) -> i32 {
    export("PostMessageAsJson", || {
        let json = required_string(json, "json is null")?;
        on_window(hwnd, |p, handle| p.post_message_as_json(handle, &json))
    })
}

/// Blocks until the last window closes.
#[no_mangle]
pub extern "C" fn WebWindow_WaitForExit() -> i32 {
    export("WaitForExit", platform::run_message_loop)
}

/// Runs `callback` on the UI thread; callable from any thread.
#[no_mangle]
pub extern "C" fn WebWindow_Invoke(callback: Option<InvokeCallback>) -> i32 {
    export("Invoke", || {
        let callback = callback.ok_or(Error::InvalidArgument("invoke callback is null"))?;
        platform::invoke_on_ui_thread(move || callback())
    })
}

#[no_mangle]
pub unsafe extern "C" fn WebWindow_AddCustomScheme(
    hwnd: HWND,
    scheme: *const u16,
    handler: Option<WebResourceRequestedCallback>,
) -> i32 {
    export("AddCustomScheme", || {
        let scheme = required_string(scheme, "scheme is null")?;
        let handler = handler.ok_or(Error::InvalidArgument("scheme handler is null"))?;
        on_window(hwnd, |p, handle| p.add_custom_scheme(handle, &scheme, Rc::new(HostSchemeHandler(handler))))
    })
}

#[no_mangle]
pub extern "C" fn WebWindow_Show(hwnd: HWND) -> i32 {
    export("Show", || on_window(hwnd, |p, handle| p.show(handle)))
}

#[no_mangle]
pub extern "C" fn WebWindow_Minimize(hwnd: HWND) -> i32 {
    export("Minimize", || on_window(hwnd, |p, handle| p.minimize(handle)))
}

#[no_mangle]
pub extern "C" fn WebWindow_Maximize(hwnd: HWND) -> i32 {
    export("Maximize", || on_window(hwnd, |p, handle| p.maximize(handle)))
}

#[no_mangle]
pub extern "C" fn WebWindow_Restore(hwnd: HWND) -> i32 {
    export("Restore", || on_window(hwnd, |p, handle| p.restore(handle)))
}

#[no_mangle]
pub extern "C" fn WebWindow_Close(hwnd: HWND) -> i32 {
    export("Close", || on_window(hwnd, |p, handle| p.close(handle)))
}

#[no_mangle]
pub extern "C" fn WebWindow_Reload(hwnd: HWND) -> i32 {
    export("Reload", || on_window(hwnd, |p, handle| p.reload(handle)))
}

#[no_mangle]
pub extern "C" fn WebWindow_Move(hwnd: HWND, x: i32, y: i32) -> i32 {
    export("Move", || on_window(hwnd, |p, handle| p.move_to(handle, x, y)))
}

#[no_mangle]
pub extern "C" fn WebWindow_DragMove(hwnd: HWND) -> i32 {
    export("DragMove", || on_window(hwnd, |p, handle| p.begin_drag_move(handle)))
}

/// Returns the window's DPI, or 0 on failure.
#[no_mangle]
pub extern "C" fn WebWindow_GetScreenDpi(hwnd: HWND) -> i32 {
    guard("GetScreenDpi", 0, || {
        let handle = WindowHandle::from_raw(hwnd.0 as isize);
        match platform::with_platform(|p| p.screen_dpi(handle)) {
            Ok(dpi) => i32::try_from(dpi).unwrap_or(0),
            Err(e) => {
                log::warn!("{e}");
                0
            }
        }
    })
}

/// Whether a WebView2 runtime is installed. Callable from any thread.
#[no_mangle]
pub extern "C" fn WebWindow_IsRuntimeAvailable() -> bool {
    guard("IsRuntimeAvailable", false, || {
        let options = crate::options::EnvironmentOptions::from_env();
        crate::runtime::browser_version(options.browser_executable_folder.as_deref()).is_some()
    })
}
