//! Custom URL scheme handlers and the responses synthesized from them.

use crate::events::WebResourceRequestedCallback;
use crate::wide::{from_wide_ptr, to_wide};

/// Body and content type produced by a scheme handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebResource {
    pub content: Vec<u8>,
    pub content_type: String,
}

/// Synthesizes responses for requests under a custom scheme.
pub trait SchemeHandler {
    /// `None` leaves the request to the runtime's default handling.
    fn resolve(&self, uri: &str) -> Option<WebResource>;
}

/// `SchemeHandler` backed by the host's function pointer. The returned buffer
/// stays owned by the host; its bytes are copied before the call returns.
#[derive(Clone, Copy)]
pub struct HostSchemeHandler(pub WebResourceRequestedCallback);

impl SchemeHandler for HostSchemeHandler {
    fn resolve(&self, uri: &str) -> Option<WebResource> {
        let uri = to_wide(uri);
        let mut num_bytes: i32 = 0;
        let mut content_type: *const u16 = std::ptr::null();
        let body = (self.0)(uri.as_ptr(), &mut num_bytes, &mut content_type);
        if body.is_null() || content_type.is_null() {
            return None;
        }
        let len = usize::try_from(num_bytes).unwrap_or(0);
        // SAFETY: the host promises `body` holds `num_bytes` readable bytes and
        // `content_type` is NUL-terminated; both outlive this call.
        let content = unsafe { std::slice::from_raw_parts(body as *const u8, len) }.to_vec();
        let content_type = unsafe { from_wide_ptr(content_type) }?;
        Some(WebResource { content, content_type })
    }
}

/// The scheme of `uri`: the text before its first colon.
pub fn scheme_of(uri: &str) -> Option<&str> {
    match uri.find(':') {
        Some(0) | None => None,
        Some(end) => Some(&uri[..end]),
    }
}

/// Normalized form used as the registry key for a scheme name.
pub fn normalize_scheme(scheme: &str) -> String {
    scheme.trim().to_ascii_lowercase()
}

/// HTTP-like response handed to the browser runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceResponse {
    pub status: i32,
    pub reason: &'static str,
    pub headers: String,
    pub body: Vec<u8>,
}

impl ResourceResponse {
    /// `200 OK` carrying the handler's content type and body.
    pub fn ok(resource: WebResource) -> Self {
        Self {
            status: 200,
            reason: "OK",
            headers: format!("Content-Type: {}", resource.content_type),
            body: resource.content,
        }
    }
}
