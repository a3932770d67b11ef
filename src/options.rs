use std::path::PathBuf;

use crate::events::{
    NavigationStartingCallback, WindowClosedCallback, WindowClosingCallback,
    WindowDpiChangedCallback, WindowMovedCallback, WindowSizeChangedCallback,
};
use crate::wide::from_wide_ptr;

/// Default inner width when the host passes a non-positive width.
pub const DEFAULT_WIDTH: i32 = 800;
/// Default inner height when the host passes a non-positive height.
pub const DEFAULT_HEIGHT: i32 = 600;

/// Browser arguments used when `WEBWINDOW_BROWSER_ARGUMENTS` is unset.
pub const DEFAULT_BROWSER_ARGUMENTS: &str = "--auto-open-devtools-for-tabs";

/// Visual style of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowStyle {
    #[default]
    Default,
    /// Frameless: the caption is swapped for a thick frame when shown.
    Transparent,
    /// Tool window: no taskbar button, small caption.
    Toolbox,
}

impl WindowStyle {
    /// Decode the host's integer style. Unknown values fall back to `Default`.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Transparent,
            2 => Self::Toolbox,
            0 => Self::Default,
            other => {
                log::warn!("[webwindow] unknown window style {other}, using Default");
                Self::Default
            }
        }
    }
}

/// Window placement as laid out by the host.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowPosition {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub is_maximized: bool,
}

/// Startup options passed by value to `WebWindow_CreateWebWindow`.
/// Every callback may be null. Field order is part of the ABI.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct WindowStartupOptions {
    pub position: WindowPosition,
    pub title: *const u16,
    pub style: i32,
    pub moved_callback: Option<WindowMovedCallback>,
    pub size_changed_callback: Option<WindowSizeChangedCallback>,
    pub closing_callback: Option<WindowClosingCallback>,
    pub dpi_changed_callback: Option<WindowDpiChangedCallback>,
    pub closed_callback: Option<WindowClosedCallback>,
    pub navigation_starting_callback: Option<NavigationStartingCallback>,
}

/// Options for creating a new native window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowOptions {
    /// Window title. Default: ""
    pub title: String,
    /// X position in screen coordinates
    pub x: i32,
    /// Y position in screen coordinates
    pub y: i32,
    /// Outer width. Default: 800
    pub width: i32,
    /// Outer height. Default: 600
    pub height: i32,
    /// Start maximized. Default: false
    pub maximized: bool,
    pub style: WindowStyle,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            x: 0,
            y: 0,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            maximized: false,
            style: WindowStyle::Default,
        }
    }
}

impl WindowOptions {
    /// Read the host's startup options.
    ///
    /// # Safety
    /// `raw.title` must be null or a valid NUL-terminated UTF-16 string.
    pub unsafe fn from_startup(raw: &WindowStartupOptions) -> Self {
        let position = raw.position;
        Self {
            title: from_wide_ptr(raw.title).unwrap_or_default(),
            x: position.x,
            y: position.y,
            width: if position.width > 0 { position.width } else { DEFAULT_WIDTH },
            height: if position.height > 0 { position.height } else { DEFAULT_HEIGHT },
            maximized: position.is_maximized,
            style: WindowStyle::from_raw(raw.style),
        }
    }
}

/// Configuration of the shared browser environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentOptions {
    /// Extra command-line switches for the browser process.
    pub additional_browser_arguments: Option<String>,
    /// Where the runtime keeps profile data. `None` lets the runtime decide.
    pub user_data_folder: Option<PathBuf>,
    /// Fixed-version runtime location. `None` uses the installed runtime.
    pub browser_executable_folder: Option<PathBuf>,
}

impl Default for EnvironmentOptions {
    fn default() -> Self {
        Self {
            additional_browser_arguments: Some(DEFAULT_BROWSER_ARGUMENTS.to_string()),
            user_data_folder: None,
            browser_executable_folder: None,
        }
    }
}

impl EnvironmentOptions {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let additional_browser_arguments = match lookup("WEBWINDOW_BROWSER_ARGUMENTS") {
            Some(args) if args.trim().is_empty() => None,
            Some(args) => Some(args),
            None => defaults.additional_browser_arguments,
        };
        let folder = |key: &str| lookup(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from);
        Self {
            additional_browser_arguments,
            user_data_folder: folder("WEBWINDOW_USER_DATA_FOLDER"),
            browser_executable_folder: folder("WEBWINDOW_BROWSER_FOLDER"),
        }
    }
}
