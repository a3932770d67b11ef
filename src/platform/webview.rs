use std::rc::Rc;

use log::{debug, info};

use windows::core::{w, PCWSTR, PWSTR};
use windows::Win32::Foundation::{E_FAIL, HWND, RECT};
use windows::Win32::System::Com::CoTaskMemFree;
use windows::Win32::UI::Shell::SHCreateMemStream;
use windows::Win32::UI::WindowsAndMessaging::GetClientRect;

use webview2_com::Microsoft::Web::WebView2::Win32::*;
use webview2_com::{
    CoreWebView2EnvironmentOptions, CreateCoreWebView2ControllerCompletedHandler,
    CreateCoreWebView2EnvironmentCompletedHandler, NavigationStartingEventHandler,
    WebMessageReceivedEventHandler, WebResourceRequestedEventHandler,
};

use super::windows::{platform, wait_pumped, wait_pumped_shared, WindowsPlatform};
use crate::boundary::guard;
use crate::bridge::BRIDGE_SCRIPT;
use crate::completion::Completion;
use crate::error::{Context, Result};
use crate::options::EnvironmentOptions;
use crate::registry::WindowHandle;
use crate::wide::to_wide;
use crate::window_manager::BrowserView;

/// A WebView2 browser hosted in one window.
#[derive(Clone)]
pub struct WebView {
    hwnd: HWND,
    controller: ICoreWebView2Controller,
    webview: ICoreWebView2,
}

impl WebView {
    pub fn set_visible(&self, visible: bool) -> Result<()> {
        unsafe { self.controller.SetIsVisible(visible) }.context("SetIsVisible")
    }
}

impl BrowserView for WebView {
    fn refit(&self) -> Result<()> {
        unsafe {
            let mut rect = RECT::default();
            GetClientRect(self.hwnd, &mut rect).context("GetClientRect")?;
            self.controller.SetBounds(rect).context("SetBounds")
        }
    }

    fn navigate(&self, url: &str) -> Result<()> {
        let url = to_wide(url);
        unsafe { self.webview.Navigate(PCWSTR(url.as_ptr())) }.context("Navigate")
    }

    fn navigate_to_string(&self, html: &str) -> Result<()> {
        let html = to_wide(html);
        unsafe { self.webview.NavigateToString(PCWSTR(html.as_ptr())) }.context("NavigateToString")
    }

    fn post_message_as_json(&self, json: &str) -> Result<()> {
        let json = to_wide(json);
        unsafe { self.webview.PostWebMessageAsJson(PCWSTR(json.as_ptr())) }.context("PostWebMessageAsJson")
    }

    fn reload(&self) -> Result<()> {
        unsafe { self.webview.Reload() }.context("Reload")
    }

    fn close(&self) -> Result<()> {
        unsafe { self.controller.Close() }.context("ICoreWebView2Controller::Close")
    }
}

/// Copy out a runtime-allocated string and free it.
unsafe fn take_pwstr(value: PWSTR) -> String {
    if value.is_null() {
        return String::new();
    }
    let text = value.to_string().unwrap_or_default();
    CoTaskMemFree(Some(value.0 as *const _));
    text
}

fn optional_wide(path: Option<&std::path::Path>) -> Option<Vec<u16>> {
    path.map(|p| to_wide(&p.to_string_lossy()))
}

fn as_pcwstr(wide: &Option<Vec<u16>>) -> PCWSTR {
    wide.as_ref().map_or(PCWSTR::null(), |w| PCWSTR(w.as_ptr()))
}

/// What the environment-created handler reports.
pub(super) type EnvironmentResult = windows::core::Result<ICoreWebView2Environment>;

/// Begin creating the browser environment; the returned slot is filled by
/// the runtime on the UI thread.
pub(super) fn start_environment(options: &EnvironmentOptions) -> Result<Rc<Completion<EnvironmentResult>>> {
    let browser_folder = optional_wide(options.browser_executable_folder.as_deref());
    let user_data_folder = optional_wide(options.user_data_folder.as_deref());
    let environment_options = CoreWebView2EnvironmentOptions::default();
    if let Some(arguments) = &options.additional_browser_arguments {
        unsafe { environment_options.set_additional_browser_arguments(arguments.clone()) };
    }

    let slot = Rc::new(Completion::new());
    let filler = Rc::clone(&slot);
    let handler = CreateCoreWebView2EnvironmentCompletedHandler::create(Box::new(
        move |result, environment| {
            filler.complete(result.and_then(|()| {
                environment.ok_or_else(|| windows::core::Error::from(E_FAIL))
            }));
            Ok(())
        },
    ));

    unsafe {
        CreateCoreWebView2EnvironmentWithOptions(
            as_pcwstr(&browser_folder),
            as_pcwstr(&user_data_folder),
            &ICoreWebView2EnvironmentOptions::from(environment_options),
            &handler,
        )
    }
    .context("CreateCoreWebView2EnvironmentWithOptions")?;
    Ok(slot)
}

/// Wait for an environment started by `start_environment`. Every waiter on
/// the slot gets the same environment.
pub(super) fn finish_environment(
    slot: &Completion<EnvironmentResult>,
    options: &EnvironmentOptions,
) -> Result<ICoreWebView2Environment> {
    let environment = wait_pumped_shared(slot, "browser environment")?
        .context("CreateCoreWebView2EnvironmentCompleted")?;
    info!(
        "[webwindow] browser environment created (runtime {})",
        crate::runtime::browser_version(options.browser_executable_folder.as_deref())
            .unwrap_or_else(|| "unknown".into())
    );
    Ok(environment)
}

fn create_controller(environment: &ICoreWebView2Environment, hwnd: HWND) -> Result<ICoreWebView2Controller> {
    let slot = Rc::new(Completion::new());
    let filler = Rc::clone(&slot);
    let handler = CreateCoreWebView2ControllerCompletedHandler::create(Box::new(
        move |result, controller| {
            filler.complete(result.and_then(|()| {
                controller.ok_or_else(|| windows::core::Error::from(E_FAIL))
            }));
            Ok(())
        },
    ));

    unsafe { environment.CreateCoreWebView2Controller(hwnd, &handler) }
        .context("CreateCoreWebView2Controller")?;

    wait_pumped(&slot, "browser controller")?.context("CreateCoreWebView2ControllerCompleted")
}

/// Create and configure the browser for `hwnd`. The result is not yet stored
/// anywhere.
pub(super) fn create_browser(platform: &WindowsPlatform, handle: WindowHandle, hwnd: HWND) -> Result<WebView> {
    let environment = platform.environment()?;
    let controller = create_controller(&environment, hwnd)?;
    let webview = unsafe { controller.CoreWebView2() }.context("ICoreWebView2Controller::CoreWebView2")?;

    unsafe {
        let settings = webview.Settings().context("ICoreWebView2::Settings")?;
        settings.SetAreDefaultContextMenusEnabled(false).context("SetAreDefaultContextMenusEnabled")?;
        settings.SetIsStatusBarEnabled(false).context("SetIsStatusBarEnabled")?;
        settings.SetAreDefaultScriptDialogsEnabled(false).context("SetAreDefaultScriptDialogsEnabled")?;

        let script = to_wide(BRIDGE_SCRIPT);
        webview
            .AddScriptToExecuteOnDocumentCreated(PCWSTR(script.as_ptr()), None)
            .context("AddScriptToExecuteOnDocumentCreated")?;

        add_handlers(&environment, &webview, handle)?;
    }

    debug!("[webwindow] browser created for {handle}");
    Ok(WebView { hwnd, controller, webview })
}

unsafe fn add_handlers(environment: &ICoreWebView2Environment, webview: &ICoreWebView2, handle: WindowHandle) -> Result<()> {
    let mut message_token = std::mem::zeroed();
    webview
        .add_WebMessageReceived(
            &WebMessageReceivedEventHandler::create(Box::new(move |_webview, args| {
                if let Some(args) = args {
                    let mut message = PWSTR::null();
                    args.WebMessageAsJson(&mut message)?;
                    let json = take_pwstr(message);
                    guard("web message handler", (), || {
                        platform(|p| p.manager.message_received(handle, &json));
                    });
                }
                Ok(())
            })),
            &mut message_token,
        )
        .context("add_WebMessageReceived")?;

    webview
        .AddWebResourceRequestedFilter(w!("*"), COREWEBVIEW2_WEB_RESOURCE_CONTEXT_ALL)
        .context("AddWebResourceRequestedFilter")?;

    let responder = environment.clone();
    let mut resource_token = std::mem::zeroed();
    webview
        .add_WebResourceRequested(
            &WebResourceRequestedEventHandler::create(Box::new(move |_webview, args| {
                let Some(args) = args else {
                    return Ok(());
                };
                let mut uri = PWSTR::null();
                args.Request()?.Uri(&mut uri)?;
                let uri = take_pwstr(uri);

                let response = guard("resource request handler", None, || {
                    platform(|p| p.manager.resource_requested(handle, &uri)).flatten()
                });
                let Some(response) = response else {
                    return Ok(());
                };
                let Some(stream) = SHCreateMemStream(Some(&response.body)) else {
                    return Err(windows::core::Error::from(E_FAIL));
                };
                let reason = to_wide(response.reason);
                let headers = to_wide(&response.headers);
                let native = responder.CreateWebResourceResponse(
                    &stream,
                    response.status,
                    PCWSTR(reason.as_ptr()),
                    PCWSTR(headers.as_ptr()),
                )?;
                args.SetResponse(&native)
            })),
            &mut resource_token,
        )
        .context("add_WebResourceRequested")?;

    let mut navigation_token = std::mem::zeroed();
    webview
        .add_NavigationStarting(
            &NavigationStartingEventHandler::create(Box::new(move |_webview, args| {
                if let Some(args) = args {
                    let mut uri = PWSTR::null();
                    args.Uri(&mut uri)?;
                    let uri = take_pwstr(uri);
                    guard("navigation handler", (), || {
                        platform(|p| p.manager.navigation_starting(handle, &uri));
                    });
                }
                Ok(())
            })),
            &mut navigation_token,
        )
        .context("add_NavigationStarting")?;

    Ok(())
}
