//! NUL-terminated UTF-16 strings as exchanged with the host and Win32.

/// Encode `s` as UTF-16 with a trailing NUL.
pub fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Read a NUL-terminated UTF-16 string. Returns `None` for a null pointer.
/// Unpaired surrogates are replaced rather than rejected.
///
/// # Safety
/// `ptr` must be null or point to a readable, NUL-terminated UTF-16 buffer.
pub unsafe fn from_wide_ptr(ptr: *const u16) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let mut len = 0usize;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    let units = std::slice::from_raw_parts(ptr, len);
    Some(String::from_utf16_lossy(units))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_terminator() {
        assert_eq!(to_wide("ab"), vec![b'a' as u16, b'b' as u16, 0]);
        assert_eq!(to_wide(""), vec![0]);
    }

    #[test]
    fn reads_back_non_ascii() {
        let wide = to_wide("héllo \u{1F600}");
        let back = unsafe { from_wide_ptr(wide.as_ptr()) };
        assert_eq!(back.as_deref(), Some("héllo \u{1F600}"));
    }

    #[test]
    fn null_is_none() {
        assert_eq!(unsafe { from_wide_ptr(std::ptr::null()) }, None);
    }
}
