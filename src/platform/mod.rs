//! Win32 host: the window class, the message loop and the WebView2 browsers.

mod webview;
mod windows;

pub use self::webview::WebView;
pub use self::windows::{
    claim_ui_thread, invoke_on_ui_thread, register_class, run_message_loop, with_platform,
    WindowsPlatform,
};
