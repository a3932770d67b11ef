use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::events::{MessageSink, WindowEvents};
use crate::options::WindowStyle;
use crate::scheme::{normalize_scheme, SchemeHandler};

/// Native window handle as an opaque integer key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(isize);

impl WindowHandle {
    pub const NULL: Self = Self(0);

    pub fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> isize {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// State kept for one live top-level window. `B` is the attached browser.
pub struct WindowRecord<B> {
    handle: WindowHandle,
    style: WindowStyle,
    pub(crate) events: Rc<dyn WindowEvents>,
    pub(crate) message_sink: Option<Rc<dyn MessageSink>>,
    pub(crate) browser: Option<B>,
    /// Set while an attachment is running so a second one is refused.
    pub(crate) attaching: bool,
    schemes: HashMap<String, Rc<dyn SchemeHandler>>,
}

impl<B> WindowRecord<B> {
    pub fn new(handle: WindowHandle, style: WindowStyle, events: Rc<dyn WindowEvents>) -> Self {
        Self {
            handle,
            style,
            events,
            message_sink: None,
            browser: None,
            attaching: false,
            schemes: HashMap::new(),
        }
    }

    pub fn handle(&self) -> WindowHandle {
        self.handle
    }

    pub fn style(&self) -> WindowStyle {
        self.style
    }

    pub fn browser(&self) -> Option<&B> {
        self.browser.as_ref()
    }

    /// Register `handler` for `scheme`. A scheme can be registered once.
    pub fn add_scheme(&mut self, scheme: &str, handler: Rc<dyn SchemeHandler>) -> Result<()> {
        let key = normalize_scheme(scheme);
        if key.is_empty() {
            return Err(Error::InvalidArgument("scheme name is empty"));
        }
        if self.schemes.contains_key(&key) {
            return Err(Error::DuplicateScheme(key));
        }
        self.schemes.insert(key, handler);
        Ok(())
    }

    pub fn scheme_handler(&self, scheme: &str) -> Option<Rc<dyn SchemeHandler>> {
        self.schemes.get(&normalize_scheme(scheme)).cloned()
    }
}

/// Live windows keyed by handle. Only touched from the UI thread.
pub struct WindowRegistry<B> {
    windows: HashMap<WindowHandle, WindowRecord<B>>,
}

impl<B> Default for WindowRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> WindowRegistry<B> {
    pub fn new() -> Self {
        Self {
            windows: HashMap::new(),
        }
    }

    pub fn insert(&mut self, record: WindowRecord<B>) {
        self.windows.insert(record.handle, record);
    }

    /// Look up a window that must exist.
    pub fn get(&self, handle: WindowHandle) -> Result<&WindowRecord<B>> {
        self.try_get(handle)?.ok_or(Error::WindowNotFound(handle))
    }

    pub fn get_mut(&mut self, handle: WindowHandle) -> Result<&mut WindowRecord<B>> {
        if handle.is_null() {
            return Err(Error::NullHandle);
        }
        self.windows.get_mut(&handle).ok_or(Error::WindowNotFound(handle))
    }

    /// Look up a window that may already be gone.
    pub fn try_get(&self, handle: WindowHandle) -> Result<Option<&WindowRecord<B>>> {
        if handle.is_null() {
            return Err(Error::NullHandle);
        }
        Ok(self.windows.get(&handle))
    }

    pub fn remove(&mut self, handle: WindowHandle) -> Option<WindowRecord<B>> {
        self.windows.remove(&handle)
    }

    pub fn contains(&self, handle: WindowHandle) -> bool {
        self.windows.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
