use thiserror::Error;

use crate::registry::WindowHandle;

// ── HRESULT values surfaced through the export boundary ────────

pub const S_OK: i32 = 0;
pub const E_ABORT: i32 = 0x8000_4004_u32 as i32;
pub const E_FAIL: i32 = 0x8000_4005_u32 as i32;
pub const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;
pub const E_UNEXPECTED: i32 = 0x8000_FFFF_u32 as i32;
/// `HRESULT_FROM_WIN32(ERROR_INVALID_STATE)`.
pub const E_NOT_VALID_STATE: i32 = 0x8007_139F_u32 as i32;
pub const RPC_E_WRONG_THREAD: i32 = 0x8001_010E_u32 as i32;

/// Every error the shim can report to its host.
#[derive(Debug, Error)]
pub enum Error {
    #[error("application window handle can't be zero")]
    NullHandle,

    #[error("application window {0} not found")]
    WindowNotFound(WindowHandle),

    #[error("handler for scheme `{0}` has already been added")]
    DuplicateScheme(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("window {0} has no attached browser yet")]
    NotReady(WindowHandle),

    #[error("a browser is already attached to window {0}")]
    AlreadyAttached(WindowHandle),

    #[error("no UI thread has been established yet")]
    NoUiThread,

    #[error("called from a thread that does not own the windows")]
    WrongThread,

    #[error("message loop quit while waiting for {0}")]
    Interrupted(&'static str),

    #[error("{context} failed (HRESULT {code:#010x})")]
    Runtime { context: &'static str, code: i32 },
}

impl Error {
    /// Wrap a status code returned by the OS or the browser runtime.
    pub fn runtime(context: &'static str, code: i32) -> Self {
        Self::Runtime { context, code }
    }

    /// The HRESULT handed back to the host for this error.
    pub fn hresult(&self) -> i32 {
        match self {
            Self::NullHandle
            | Self::WindowNotFound(_)
            | Self::DuplicateScheme(_)
            | Self::InvalidArgument(_) => E_INVALIDARG,
            Self::NotReady(_) | Self::AlreadyAttached(_) | Self::NoUiThread => E_NOT_VALID_STATE,
            Self::WrongThread => RPC_E_WRONG_THREAD,
            Self::Interrupted(_) => E_ABORT,
            // A runtime that reports failure with a success code still failed.
            Self::Runtime { code, .. } if *code >= 0 => E_FAIL,
            Self::Runtime { code, .. } => *code,
        }
    }
}

/// Attach the name of the failing call to a `windows` crate error.
#[cfg(target_os = "windows")]
pub trait Context<T> {
    fn context(self, context: &'static str) -> Result<T>;
}

#[cfg(target_os = "windows")]
impl<T> Context<T> for windows::core::Result<T> {
    fn context(self, context: &'static str) -> Result<T> {
        self.map_err(|e| Error::runtime(context, e.code().0))
    }
}

/// Fold a result into the status code returned across the C boundary.
pub fn to_hresult(result: Result<()>) -> i32 {
    match result {
        Ok(()) => S_OK,
        Err(e) => {
            log::warn!("{e}");
            e.hresult()
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_errors_map_to_invalidarg() {
        assert_eq!(Error::NullHandle.hresult(), E_INVALIDARG);
        assert_eq!(Error::WindowNotFound(WindowHandle::from_raw(42)).hresult(), E_INVALIDARG);
        assert_eq!(Error::DuplicateScheme("app".into()).hresult(), E_INVALIDARG);
    }

    #[test]
    fn state_errors_map_to_not_valid_state() {
        let handle = WindowHandle::from_raw(7);
        assert_eq!(Error::NotReady(handle).hresult(), E_NOT_VALID_STATE);
        assert_eq!(Error::AlreadyAttached(handle).hresult(), E_NOT_VALID_STATE);
        assert_eq!(Error::NoUiThread.hresult(), E_NOT_VALID_STATE);
        assert_eq!(Error::WrongThread.hresult(), RPC_E_WRONG_THREAD);
    }

    #[test]
    fn runtime_codes_pass_through() {
        let code = 0x8007_0002_u32 as i32;
        assert_eq!(Error::runtime("CreateCoreWebView2Controller", code).hresult(), code);
        assert_eq!(Error::runtime("odd runtime", 1).hresult(), E_FAIL);
    }

    #[test]
    fn ok_folds_to_s_ok() {
        assert_eq!(to_hresult(Ok(())), S_OK);
        assert_eq!(to_hresult(Err(Error::Interrupted("attach"))), E_ABORT);
    }

    #[test]
    fn display_names_the_window() {
        let msg = Error::WindowNotFound(WindowHandle::from_raw(0x1a2b)).to_string();
        assert!(msg.contains("0x1a2b"), "{msg}");
    }
}
