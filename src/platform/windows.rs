use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicU32, Ordering};

use log::{debug, error, warn};

use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::HiDpi::{
    GetDpiForWindow, SetThreadDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE,
};
use windows::Win32::UI::Input::KeyboardAndMouse::ReleaseCapture;
use windows::Win32::UI::WindowsAndMessaging::*;

use webview2_com::Microsoft::Web::WebView2::Win32::ICoreWebView2Environment;

use super::webview::{self, EnvironmentResult, WebView};
use crate::boundary::guard;
use crate::completion::{Completion, Pump, SharedInit};
use crate::error::{Context, Error, Result};
use crate::events::{CloseAction, MessageSink, WindowEvents};
use crate::invoke::{invoke, InvokeRequest, UiThread};
use crate::options::{EnvironmentOptions, WindowOptions, WindowStyle};
use crate::registry::{WindowHandle, WindowRecord};
use crate::scheme::SchemeHandler;
use crate::window_manager::WindowManager;

/// Thread message carrying a boxed `InvokeRequest` in its `LPARAM`.
const WM_USER_INVOKE: u32 = WM_USER + 2;

const CLASS_NAME: PCWSTR = w!("WebWindow");

/// Extra height taken from the top of the non-client frame.
const FRAME_TOP_INSET: i32 = 7;

/// Thread that owns the windows. Zero until the first window or loop.
static UI_THREAD_ID: AtomicU32 = AtomicU32::new(0);
static CLASS_REGISTERED: AtomicBool = AtomicBool::new(false);
static INSTANCE: AtomicIsize = AtomicIsize::new(0);

thread_local! {
    static PLATFORM: WindowsPlatform = WindowsPlatform::new();
}

/// Per-UI-thread state: the windows and the shared browser environment.
pub struct WindowsPlatform {
    pub(super) manager: WindowManager<WebView>,
    environment: SharedInit<ICoreWebView2Environment, EnvironmentResult>,
    environment_options: EnvironmentOptions,
}

impl WindowsPlatform {
    fn new() -> Self {
        // WebView2 requires a single-threaded apartment.
        unsafe {
            if let Err(e) = CoInitializeEx(None, COINIT_APARTMENTTHREADED).ok() {
                error!("[webwindow] COM init failed: {e}");
            }
        }
        Self {
            manager: WindowManager::new(),
            environment: SharedInit::new(),
            environment_options: EnvironmentOptions::from_env(),
        }
    }

    /// The browser environment, created on first use and shared afterwards.
    /// Attachments started while it is being created wait for the same one.
    pub(super) fn environment(&self) -> Result<ICoreWebView2Environment> {
        self.environment.get_or_create(
            || webview::start_environment(&self.environment_options),
            |slot| webview::finish_environment(slot, &self.environment_options),
        )
    }

    // ── Windows ────────────────────────────────────────────────

    pub fn create_window(&self, options: &WindowOptions, events: Rc<dyn WindowEvents>) -> Result<WindowHandle> {
        if !CLASS_REGISTERED.load(Ordering::SeqCst) {
            register_class(HINSTANCE::default())?;
        }

        let mut style = WS_OVERLAPPEDWINDOW;
        if options.maximized {
            style |= WS_MAXIMIZE;
        }
        let ex_style = match options.style {
            WindowStyle::Toolbox => WS_EX_TOOLWINDOW,
            WindowStyle::Default | WindowStyle::Transparent => WINDOW_EX_STYLE::default(),
        };
        let title = crate::wide::to_wide(&options.title);

        let hwnd = unsafe {
            CreateWindowExW(
                ex_style,
                CLASS_NAME,
                PCWSTR(title.as_ptr()),
                style,
                options.x,
                options.y,
                options.width,
                options.height,
                None,
                None,
                instance(),
                None,
            )
        }
        .context("CreateWindowExW")?;

        let handle = handle_of(hwnd);
        self.manager
            .register(WindowRecord::new(handle, options.style, events));
        Ok(handle)
    }

    /// Create a browser in the window and wait until it is ready, pumping
    /// messages meanwhile.
    pub fn attach(&self, handle: WindowHandle, sink: Rc<dyn MessageSink>) -> Result<()> {
        self.manager.begin_attach(handle, sink)?;
        let view = match webview::create_browser(self, handle, hwnd_of(handle)) {
            Ok(view) => view,
            Err(e) => {
                self.manager.abort_attach(handle);
                return Err(e);
            }
        };
        self.manager.complete_attach(handle, view.clone())?;
        // Attachment stands even if the browser stays hidden.
        if let Err(e) = view.set_visible(true) {
            warn!("[webwindow] showing browser of {handle} failed: {e}");
        }
        Ok(())
    }

    pub fn add_custom_scheme(&self, handle: WindowHandle, scheme: &str, handler: Rc<dyn SchemeHandler>) -> Result<()> {
        self.manager.add_custom_scheme(handle, scheme, handler)
    }

    pub fn navigate(&self, handle: WindowHandle, url: &str) -> Result<()> {
        self.manager.navigate(handle, url)
    }

    pub fn navigate_to_string(&self, handle: WindowHandle, html: &str) -> Result<()> {
        self.manager.navigate_to_string(handle, html)
    }

    pub fn post_message_as_json(&self, handle: WindowHandle, json: &str) -> Result<()> {
        self.manager.post_message_as_json(handle, json)
    }

    pub fn reload(&self, handle: WindowHandle) -> Result<()> {
        self.manager.reload(handle)
    }

    // ── Window control ─────────────────────────────────────────

    pub fn show(&self, handle: WindowHandle) -> Result<()> {
        let style = self.manager.style(handle)?;
        let hwnd = hwnd_of(handle);
        unsafe {
            let _ = ShowWindow(hwnd, SW_SHOWDEFAULT);
            if style == WindowStyle::Transparent {
                let current = GetWindowLongW(hwnd, GWL_STYLE);
                let restyled = (current | WS_THICKFRAME.0 as i32) & !(WS_CAPTION.0 as i32);
                SetWindowLongW(hwnd, GWL_STYLE, restyled);
                SetWindowPos(
                    hwnd,
                    None,
                    0,
                    0,
                    0,
                    0,
                    SWP_FRAMECHANGED | SWP_NOMOVE | SWP_NOSIZE | SWP_NOZORDER | SWP_NOOWNERZORDER,
                )
                .context("SetWindowPos")?;
            }
        }
        Ok(())
    }

    fn show_with(&self, handle: WindowHandle, command: SHOW_WINDOW_CMD) -> Result<()> {
        self.manager.ensure_window(handle)?;
        unsafe {
            let _ = ShowWindow(hwnd_of(handle), command);
        }
        Ok(())
    }

    pub fn minimize(&self, handle: WindowHandle) -> Result<()> {
        self.show_with(handle, SW_MINIMIZE)
    }

    pub fn maximize(&self, handle: WindowHandle) -> Result<()> {
        self.show_with(handle, SW_MAXIMIZE)
    }

    pub fn restore(&self, handle: WindowHandle) -> Result<()> {
        self.show_with(handle, SW_RESTORE)
    }

    /// Ask the window to close. The closing callback still gets its say.
    pub fn close(&self, handle: WindowHandle) -> Result<()> {
        let Some(handle) = self.manager.close_target(handle)? else {
            debug!("[webwindow] close of unknown window {handle} ignored");
            return Ok(());
        };
        let hwnd = hwnd_of(handle);
        unsafe {
            if !IsWindow(hwnd).as_bool() {
                debug!("[webwindow] close of {handle} ignored, window already gone");
                return Ok(());
            }
            PostMessageW(hwnd, WM_CLOSE, WPARAM(0), LPARAM(0)).context("PostMessageW")
        }
    }

    /// Move the outer window to (`x`, `y`), keeping its size.
    pub fn move_to(&self, handle: WindowHandle, x: i32, y: i32) -> Result<()> {
        self.manager.ensure_window(handle)?;
        let hwnd = hwnd_of(handle);
        unsafe {
            let mut rect = RECT::default();
            GetWindowRect(hwnd, &mut rect).context("GetWindowRect")?;
            MoveWindow(hwnd, x, y, rect.right - rect.left, rect.bottom - rect.top, false)
                .context("MoveWindow")
        }
    }

    /// Start dragging the window as if its caption had been grabbed.
    pub fn begin_drag_move(&self, handle: WindowHandle) -> Result<()> {
        self.manager.ensure_window(handle)?;
        unsafe {
            let _ = ReleaseCapture();
            SendMessageW(hwnd_of(handle), WM_NCLBUTTONDOWN, WPARAM(HTCAPTION as usize), LPARAM(0));
        }
        Ok(())
    }

    pub fn screen_dpi(&self, handle: WindowHandle) -> Result<u32> {
        self.manager.ensure_window(handle)?;
        Ok(unsafe { GetDpiForWindow(hwnd_of(handle)) })
    }
}

// ── Thread ownership ───────────────────────────────────────────

fn current_thread_id() -> u32 {
    unsafe { GetCurrentThreadId() }
}

/// Make the calling thread the UI thread unless another thread already is.
pub fn claim_ui_thread() -> Result<()> {
    let current = current_thread_id();
    match UI_THREAD_ID.compare_exchange(0, current, Ordering::SeqCst, Ordering::SeqCst) {
        Ok(_) => {
            debug!("[webwindow] thread {current} is the UI thread");
            Ok(())
        }
        Err(owner) if owner == current => Ok(()),
        Err(_) => Err(Error::WrongThread),
    }
}

fn ensure_ui_thread() -> Result<()> {
    match UI_THREAD_ID.load(Ordering::SeqCst) {
        0 => Err(Error::NoUiThread),
        owner if owner == current_thread_id() => Ok(()),
        _ => Err(Error::WrongThread),
    }
}

/// Run `f` against the UI thread's platform. Fails unless called on the UI
/// thread.
pub fn with_platform<R>(f: impl FnOnce(&WindowsPlatform) -> Result<R>) -> Result<R> {
    ensure_ui_thread()?;
    PLATFORM.try_with(f).map_err(|_| Error::NoUiThread)?
}

/// Platform access from OS and browser callbacks, which only ever run on the
/// UI thread. `None` once the thread is shutting down.
pub(super) fn platform<R>(f: impl FnOnce(&WindowsPlatform) -> R) -> Option<R> {
    PLATFORM.try_with(f).ok()
}

// ── Window class and procedure ─────────────────────────────────

fn instance() -> HINSTANCE {
    HINSTANCE(INSTANCE.load(Ordering::SeqCst) as *mut _)
}

pub(super) fn handle_of(hwnd: HWND) -> WindowHandle {
    WindowHandle::from_raw(hwnd.0 as isize)
}

pub(super) fn hwnd_of(handle: WindowHandle) -> HWND {
    HWND(handle.raw() as *mut _)
}

/// Register the window class under `hinstance` (the calling module when
/// null) and opt the thread into per-monitor DPI awareness.
pub fn register_class(hinstance: HINSTANCE) -> Result<()> {
    unsafe {
        let hinstance = if hinstance.is_invalid() {
            GetModuleHandleW(None).context("GetModuleHandleW")?.into()
        } else {
            hinstance
        };
        INSTANCE.store(hinstance.0 as isize, Ordering::SeqCst);

        let _ = SetThreadDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE);

        let wc = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(wnd_proc),
            hInstance: hinstance,
            hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
            lpszClassName: CLASS_NAME,
            ..Default::default()
        };

        if RegisterClassExW(&wc) == 0 {
            let e = windows::core::Error::from_win32();
            if e.code() != ERROR_CLASS_ALREADY_EXISTS.to_hresult() {
                return Err(Error::runtime("RegisterClassExW", e.code().0));
            }
        }
    }
    CLASS_REGISTERED.store(true, Ordering::SeqCst);
    Ok(())
}

unsafe extern "system" fn wnd_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let handled = guard("window procedure", None, || handle_message(hwnd, msg, wparam, lparam));
    handled.unwrap_or_else(|| DefWindowProcW(hwnd, msg, wparam, lparam))
}

/// `None` falls through to `DefWindowProcW`.
unsafe fn handle_message(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> Option<LRESULT> {
    let handle = handle_of(hwnd);
    match msg {
        WM_SIZE => {
            let width = (lparam.0 & 0xFFFF) as i32;
            let height = ((lparam.0 >> 16) & 0xFFFF) as i32;
            let maximized = wparam.0 as u32 == SIZE_MAXIMIZED;
            platform(|p| p.manager.size_changed(handle, width, height, maximized));
            None
        }
        WM_MOVE => {
            // Report the outer window's origin, not the client area's.
            let mut rect = RECT::default();
            if GetWindowRect(hwnd, &mut rect).is_ok() {
                platform(|p| p.manager.moved(handle, rect.left, rect.top));
            }
            None
        }
        WM_NCCALCSIZE => {
            let result = DefWindowProcW(hwnd, msg, wparam, lparam);
            // The first proposed rectangle leads both NCCALCSIZE_PARAMS and the bare RECT form.
            if let Some(rect) = (lparam.0 as *mut RECT).as_mut() {
                rect.top -= FRAME_TOP_INSET;
            }
            Some(result)
        }
        WM_CLOSE => {
            let action = platform(|p| p.manager.close_requested(handle)).flatten()?;
            if action == CloseAction::Destroy {
                if let Err(e) = DestroyWindow(hwnd) {
                    error!("[webwindow] DestroyWindow({handle}) failed: {e}");
                }
            }
            Some(LRESULT(0))
        }
        WM_DESTROY => {
            let remaining = platform(|p| p.manager.destroyed(handle)).unwrap_or(0);
            if remaining == 0 {
                debug!("[webwindow] last window closed, quitting");
                PostQuitMessage(0);
            }
            None
        }
        WM_DPICHANGED => {
            if platform(|p| p.manager.contains(handle)).unwrap_or(false) {
                if let Some(suggested) = (lparam.0 as *const RECT).as_ref() {
                    let _ = SetWindowPos(
                        hwnd,
                        None,
                        suggested.left,
                        suggested.top,
                        suggested.right - suggested.left,
                        suggested.bottom - suggested.top,
                        SWP_NOZORDER | SWP_NOACTIVATE,
                    );
                }
                let dpi = (wparam.0 & 0xFFFF) as u32;
                platform(|p| p.manager.dpi_changed(handle, dpi));
            }
            Some(LRESULT(0))
        }
        _ => None,
    }
}

// ── Message loop and invoke ────────────────────────────────────

fn dispatch(msg: &MSG) {
    if msg.message == WM_USER_INVOKE && msg.hwnd.is_invalid() {
        // SAFETY: only `Win32UiThread::post` sends this message, with a leaked box.
        let request = unsafe { Box::from_raw(msg.lParam.0 as *mut InvokeRequest) };
        request.run();
        return;
    }
    unsafe {
        let _ = TranslateMessage(msg);
        DispatchMessageW(msg);
    }
}

/// Block for one message and dispatch it.
fn pump_one() -> Pump {
    let mut msg = MSG::default();
    let status = unsafe { GetMessageW(&mut msg, None, 0, 0) };
    if status.0 <= 0 {
        return Pump::Quit;
    }
    dispatch(&msg);
    Pump::Continue
}

/// Wait for `slot` while keeping the UI thread's messages flowing. A quit
/// request received meanwhile is re-posted for the outer loop.
pub(super) fn wait_pumped<T>(slot: &Completion<T>, what: &'static str) -> Result<T> {
    slot.wait_pumping(pump_one).ok_or_else(|| interrupted(what))
}

/// `wait_pumped` for a slot that other waiters may be nested on.
pub(super) fn wait_pumped_shared<T: Clone>(slot: &Completion<T>, what: &'static str) -> Result<T> {
    slot.wait_pumping_shared(pump_one).ok_or_else(|| interrupted(what))
}

/// Re-post the quit that ended a pumped wait so the outer loop sees it too.
fn interrupted(what: &'static str) -> Error {
    warn!("[webwindow] quit requested while waiting for {what}");
    unsafe { PostQuitMessage(0) };
    Error::Interrupted(what)
}

/// Run the message loop until the last window closes or a quit is posted.
pub fn run_message_loop() -> Result<()> {
    claim_ui_thread()?;
    let mut msg = MSG::default();
    loop {
        let status = unsafe { GetMessageW(&mut msg, None, 0, 0) };
        match status.0 {
            0 => return Ok(()),
            -1 => {
                let code = windows::core::Error::from_win32().code().0;
                return Err(Error::runtime("GetMessageW", code));
            }
            _ => dispatch(&msg),
        }
    }
}

struct Win32UiThread {
    thread_id: u32,
}

impl UiThread for Win32UiThread {
    fn is_current(&self) -> bool {
        current_thread_id() == self.thread_id
    }

    fn post(&self, request: Box<InvokeRequest>) -> Result<()> {
        let raw = Box::into_raw(request);
        let posted = unsafe {
            PostThreadMessageW(self.thread_id, WM_USER_INVOKE, WPARAM(0), LPARAM(raw as isize))
        };
        if let Err(e) = posted {
            // SAFETY: the message was not queued, so the box is still ours.
            drop(unsafe { Box::from_raw(raw) });
            return Err(Error::runtime("PostThreadMessageW", e.code().0));
        }
        Ok(())
    }
}

/// Run `action` on the UI thread and return once it has finished.
pub fn invoke_on_ui_thread(action: impl FnOnce() + Send + 'static) -> Result<()> {
    match UI_THREAD_ID.load(Ordering::SeqCst) {
        0 => Err(Error::NoUiThread),
        thread_id => invoke(&Win32UiThread { thread_id }, action),
    }
}
