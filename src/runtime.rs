//! WebView2 runtime detection.

/// Version reported when no runtime is installed.
const MISSING_VERSION: &str = "0.0.0.0";

/// Normalize a runtime-reported version string. Empty and placeholder
/// versions mean no usable runtime.
pub fn usable_version(raw: &str) -> Option<String> {
    let version = raw.trim();
    if version.is_empty() || version == MISSING_VERSION {
        None
    } else {
        Some(version.to_string())
    }
}

/// Version of the WebView2 runtime that would be used, if one is installed.
/// `browser_folder` selects a fixed-version runtime instead of the installed
/// one.
#[cfg(target_os = "windows")]
pub fn browser_version(browser_folder: Option<&std::path::Path>) -> Option<String> {
    use webview2_com::Microsoft::Web::WebView2::Win32::GetAvailableCoreWebView2BrowserVersionString;
    use windows::core::{PCWSTR, PWSTR};

    let folder = browser_folder.map(|p| crate::wide::to_wide(&p.to_string_lossy()));
    let folder = folder.as_ref().map_or(PCWSTR::null(), |f| PCWSTR(f.as_ptr()));
    unsafe {
        let mut version = PWSTR::null();
        if let Err(e) = GetAvailableCoreWebView2BrowserVersionString(folder, &mut version) {
            log::debug!("[webwindow] no WebView2 runtime: {e}");
            return None;
        }
        if version.is_null() {
            return None;
        }
        let raw = version.to_string().unwrap_or_default();
        windows::Win32::System::Com::CoTaskMemFree(Some(version.0 as *const _));
        usable_version(&raw)
    }
}
