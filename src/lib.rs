//! Native windows hosting a WebView2 browser, exposed to a managed host
//! through a flat C ABI (`WebWindow_*`).
//!
//! The window bookkeeping, event routing, invoke adapter and scheme handling
//! are platform independent; the Win32 and WebView2 glue lives in `platform`.

mod boundary;
pub mod bridge;
pub mod completion;
pub mod error;
pub mod events;
pub mod invoke;
pub mod options;
pub mod registry;
pub mod runtime;
pub mod scheme;
pub mod wide;
pub mod window_manager;

#[cfg(target_os = "windows")]
mod exports;
#[cfg(target_os = "windows")]
mod platform;

use std::sync::Once;

use env_logger::{Builder, Env};

pub use error::{Error, Result};
pub use events::{CloseAction, MessageSink, WindowEvents};
pub use options::{EnvironmentOptions, WindowOptions, WindowPosition, WindowStartupOptions, WindowStyle};
pub use registry::WindowHandle;
pub use scheme::{SchemeHandler, WebResource};
pub use window_manager::{BrowserView, WindowManager};

#[cfg(target_os = "windows")]
pub use exports::*;

/// Environment variable holding the log filter, in `env_logger` syntax.
pub const LOG_ENV: &str = "WEBWINDOW_LOG";

static LOGGER_INIT: Once = Once::new();

/// Install the logger once. A logger installed by the embedding process wins.
pub fn init_logging() {
    LOGGER_INIT.call_once(|| {
        let _ = Builder::from_env(Env::new().filter_or(LOG_ENV, "warn")).try_init();
    });
}
