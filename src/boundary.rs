//! Panic guard for every entry point reached from the host, the OS or the
//! browser runtime. A panic is logged and replaced with a neutral value so it
//! never unwinds into foreign frames.

use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run `f`, returning `fallback` if it panics.
pub fn guard<R>(label: &str, fallback: R, f: impl FnOnce() -> R) -> R {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            log::error!("[webwindow] {label} panicked: {reason}");
            fallback
        }
    }
}
