use std::ffi::c_void;

use crate::options::WindowStartupOptions;
use crate::wide::to_wide;

/// Callback for messages posted by page script: (message).
pub type WebMessageReceivedCallback = extern "C" fn(message: *const u16);

/// Resolves a custom-scheme request: (url, out byte count, out content type) -> body.
/// A null body or content type leaves the request to default handling.
pub type WebResourceRequestedCallback = extern "C" fn(
    url: *const u16,
    out_num_bytes: *mut i32,
    out_content_type: *mut *const u16,
) -> *mut c_void;

/// Callback for move events: (x, y) of the outer window in screen coordinates.
pub type WindowMovedCallback = extern "C" fn(x: i32, y: i32);

/// Callback for resize events: (width, height, is_maximized).
pub type WindowSizeChangedCallback = extern "C" fn(width: i32, height: i32, is_maximized: bool);

/// Callback asked before closing. A result > 0 allows the close.
pub type WindowClosingCallback = extern "C" fn() -> i32;

/// Callback for the destroy notification (no payload).
pub type WindowClosedCallback = extern "C" fn();

/// Callback for DPI changes: (new dpi).
pub type WindowDpiChangedCallback = extern "C" fn(dpi: i32);

/// Callback for navigation starts: (target uri).
pub type NavigationStartingCallback = extern "C" fn(uri: *const u16);

/// Work scheduled onto the UI thread by `WebWindow_Invoke`.
pub type InvokeCallback = extern "C" fn();

/// What to do with a close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    Destroy,
    Keep,
}

impl CloseAction {
    /// Interpret a closing callback's result: zero or negative cancels.
    pub fn from_host(result: i32) -> Self {
        if result > 0 {
            Self::Destroy
        } else {
            Self::Keep
        }
    }
}

/// Per-window lifecycle notifications. Every method has a no-op default.
pub trait WindowEvents {
    fn moved(&self, _x: i32, _y: i32) {}

    fn size_changed(&self, _width: i32, _height: i32, _maximized: bool) {}

    /// Asked when the user or host requests a close.
    fn closing(&self) -> CloseAction {
        CloseAction::Destroy
    }

    fn closed(&self) {}

    fn dpi_changed(&self, _dpi: u32) {}

    fn navigation_starting(&self, _uri: &str) {}
}

/// Receives messages posted by page script.
pub trait MessageSink {
    fn message_received(&self, message: &str);
}

/// `WindowEvents` backed by the host's function pointers.
#[derive(Clone, Copy, Default)]
pub struct HostCallbacks {
    pub moved: Option<WindowMovedCallback>,
    pub size_changed: Option<WindowSizeChangedCallback>,
    pub closing: Option<WindowClosingCallback>,
    pub closed: Option<WindowClosedCallback>,
    pub dpi_changed: Option<WindowDpiChangedCallback>,
    pub navigation_starting: Option<NavigationStartingCallback>,
}

impl HostCallbacks {
    pub fn from_startup(options: &WindowStartupOptions) -> Self {
        Self {
            moved: options.moved_callback,
            size_changed: options.size_changed_callback,
            closing: options.closing_callback,
            closed: options.closed_callback,
            dpi_changed: options.dpi_changed_callback,
            navigation_starting: options.navigation_starting_callback,
        }
    }
}

impl WindowEvents for HostCallbacks {
    fn moved(&self, x: i32, y: i32) {
        if let Some(cb) = self.moved {
            cb(x, y);
        }
    }

    fn size_changed(&self, width: i32, height: i32, maximized: bool) {
        if let Some(cb) = self.size_changed {
            cb(width, height, maximized);
        }
    }

    fn closing(&self) -> CloseAction {
        match self.closing {
            Some(cb) => CloseAction::from_host(cb()),
            None => CloseAction::Destroy,
        }
    }

    fn closed(&self) {
        if let Some(cb) = self.closed {
            cb();
        }
    }

    fn dpi_changed(&self, dpi: u32) {
        if let Some(cb) = self.dpi_changed {
            cb(i32::try_from(dpi).unwrap_or(i32::MAX));
        }
    }

    fn navigation_starting(&self, uri: &str) {
        if let Some(cb) = self.navigation_starting {
            let uri = to_wide(uri);
            cb(uri.as_ptr());
        }
    }
}

/// `MessageSink` backed by the host's function pointer.
#[derive(Clone, Copy)]
pub struct HostMessageSink(pub WebMessageReceivedCallback);

impl MessageSink for HostMessageSink {
    fn message_received(&self, message: &str) {
        let message = to_wide(message);
        (self.0)(message.as_ptr());
    }
}
