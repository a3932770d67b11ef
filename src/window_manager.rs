use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, warn};

use crate::bridge::{decode_web_message, MAX_MESSAGE_SIZE};
use crate::error::{Error, Result};
use crate::events::{CloseAction, MessageSink};
use crate::options::WindowStyle;
use crate::registry::{WindowHandle, WindowRecord, WindowRegistry};
use crate::scheme::{scheme_of, ResourceResponse, SchemeHandler};

/// The browser embedded in one window, as seen by the manager.
/// Clones are cheap handles to the same browser.
pub trait BrowserView: Clone {
    /// Fit the viewport to the window's client area.
    fn refit(&self) -> Result<()>;
    fn navigate(&self, url: &str) -> Result<()>;
    fn navigate_to_string(&self, html: &str) -> Result<()>;
    fn post_message_as_json(&self, json: &str) -> Result<()>;
    fn reload(&self) -> Result<()>;
    fn close(&self) -> Result<()>;
}

/// Owns every live window and routes OS and browser events to them.
///
/// Lives on the UI thread. The registry is only borrowed for the duration of
/// a lookup, never while host code runs, so host callbacks may call back into
/// the manager.
pub struct WindowManager<B> {
    registry: RefCell<WindowRegistry<B>>,
}

impl<B: BrowserView> Default for WindowManager<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: BrowserView> WindowManager<B> {
    pub fn new() -> Self {
        Self {
            registry: RefCell::new(WindowRegistry::new()),
        }
    }

    /// Read from a window that must exist.
    fn with_window<R>(&self, handle: WindowHandle, f: impl FnOnce(&WindowRecord<B>) -> R) -> Result<R> {
        let registry = self.registry.borrow();
        registry.get(handle).map(f)
    }

    fn with_window_mut<R>(
        &self,
        handle: WindowHandle,
        f: impl FnOnce(&mut WindowRecord<B>) -> Result<R>,
    ) -> Result<R> {
        let mut registry = self.registry.borrow_mut();
        f(registry.get_mut(handle)?)
    }

    /// Read from a window during OS event handling. Unknown windows and a
    /// registry that is already borrowed both yield `None`.
    fn lookup<R>(&self, handle: WindowHandle, f: impl FnOnce(&WindowRecord<B>) -> R) -> Option<R> {
        match self.registry.try_borrow() {
            Ok(registry) => registry.try_get(handle).ok().flatten().map(f),
            Err(_) => {
                debug!("[webwindow] registry busy, dropping event for {handle}");
                None
            }
        }
    }

    // ── Registry ───────────────────────────────────────────────

    pub fn register(&self, record: WindowRecord<B>) {
        debug!("[webwindow] window {} registered", record.handle());
        self.registry.borrow_mut().insert(record);
    }

    pub fn contains(&self, handle: WindowHandle) -> bool {
        self.registry.borrow().contains(handle)
    }

    pub fn window_count(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Fails with `NullHandle` / `WindowNotFound` unless the window is live.
    pub fn ensure_window(&self, handle: WindowHandle) -> Result<()> {
        self.with_window(handle, |_| ())
    }

    /// The window a close request should go to. Windows this manager does not
    /// own, including ones already destroyed, yield `None`.
    pub fn close_target(&self, handle: WindowHandle) -> Result<Option<WindowHandle>> {
        if handle.is_null() {
            return Err(Error::NullHandle);
        }
        Ok(self.contains(handle).then_some(handle))
    }

    pub fn style(&self, handle: WindowHandle) -> Result<WindowStyle> {
        self.with_window(handle, |w| w.style())
    }

    pub fn add_custom_scheme(
        &self,
        handle: WindowHandle,
        scheme: &str,
        handler: Rc<dyn SchemeHandler>,
    ) -> Result<()> {
        self.with_window_mut(handle, |w| w.add_scheme(scheme, handler))
    }

    // ── Browser attachment ─────────────────────────────────────

    /// First half of an attachment: validate and store the message sink.
    pub fn begin_attach(&self, handle: WindowHandle, sink: Rc<dyn MessageSink>) -> Result<()> {
        self.with_window_mut(handle, |w| {
            if w.browser.is_some() || w.attaching {
                return Err(Error::AlreadyAttached(handle));
            }
            w.attaching = true;
            w.message_sink = Some(sink);
            Ok(())
        })
    }

    /// Second half of an attachment: store the browser and fit it.
    /// If the window went away meanwhile the browser is closed.
    pub fn complete_attach(&self, handle: WindowHandle, browser: B) -> Result<()> {
        let stored = self.with_window_mut(handle, |w| {
            w.attaching = false;
            w.browser = Some(browser.clone());
            Ok(())
        });
        if let Err(e) = stored {
            warn!("[webwindow] window {handle} closed during attachment");
            let _ = browser.close();
            return Err(e);
        }
        if let Err(e) = browser.refit() {
            warn!("[webwindow] initial fit of {handle} failed: {e}");
        }
        debug!("[webwindow] browser attached to {handle}");
        Ok(())
    }

    /// Undo `begin_attach` after a failed attachment.
    pub fn abort_attach(&self, handle: WindowHandle) {
        let _ = self.with_window_mut(handle, |w| {
            w.attaching = false;
            Ok(())
        });
    }

    /// The attached browser, or `NotReady` before attachment completed.
    pub fn browser(&self, handle: WindowHandle) -> Result<B> {
        self.with_window(handle, |w| w.browser.clone())?
            .ok_or(Error::NotReady(handle))
    }

    // ── Browser operations ─────────────────────────────────────

    pub fn navigate(&self, handle: WindowHandle, url: &str) -> Result<()> {
        self.browser(handle)?.navigate(url)
    }

    pub fn navigate_to_string(&self, handle: WindowHandle, html: &str) -> Result<()> {
        self.browser(handle)?.navigate_to_string(html)
    }

    pub fn post_message_as_json(&self, handle: WindowHandle, json: &str) -> Result<()> {
        let browser = self.browser(handle)?;
        if json.trim().is_empty() {
            return Err(Error::InvalidArgument("can't post an empty json message"));
        }
        browser.post_message_as_json(json)
    }

    pub fn reload(&self, handle: WindowHandle) -> Result<()> {
        self.browser(handle)?.reload()
    }

    // ── Window procedure events ────────────────────────────────

    pub fn size_changed(&self, handle: WindowHandle, width: i32, height: i32, maximized: bool) {
        let Some((events, browser)) = self.lookup(handle, |w| (w.events.clone(), w.browser.clone())) else {
            return;
        };
        if let Some(browser) = browser {
            if let Err(e) = browser.refit() {
                warn!("[webwindow] resizing browser of {handle} failed: {e}");
            }
        }
        events.size_changed(width, height, maximized);
    }

    pub fn moved(&self, handle: WindowHandle, x: i32, y: i32) {
        if let Some(events) = self.lookup(handle, |w| w.events.clone()) {
            events.moved(x, y);
        }
    }

    /// `None` when the window is unknown and default processing should apply.
    pub fn close_requested(&self, handle: WindowHandle) -> Option<CloseAction> {
        let events = self.lookup(handle, |w| w.events.clone())?;
        Some(events.closing())
    }

    /// Tear the window down. Returns how many windows remain.
    pub fn destroyed(&self, handle: WindowHandle) -> usize {
        if let Some((events, browser)) = self.lookup(handle, |w| (w.events.clone(), w.browser.clone())) {
            events.closed();
            if let Some(browser) = browser {
                if let Err(e) = browser.close() {
                    warn!("[webwindow] closing browser of {handle} failed: {e}");
                }
            }
            self.registry.borrow_mut().remove(handle);
            debug!("[webwindow] window {handle} destroyed");
        }
        self.window_count()
    }

    /// Returns `false` when the window is unknown.
    pub fn dpi_changed(&self, handle: WindowHandle, dpi: u32) -> bool {
        match self.lookup(handle, |w| w.events.clone()) {
            Some(events) => {
                events.dpi_changed(dpi);
                true
            }
            None => false,
        }
    }

    // ── Browser events ─────────────────────────────────────────

    /// A message posted by page script, in the runtime's JSON form.
    pub fn message_received(&self, handle: WindowHandle, json: &str) {
        if json.len() > MAX_MESSAGE_SIZE {
            warn!("[webwindow] dropping {} byte message from {handle}", json.len());
            return;
        }
        if let Some(Some(sink)) = self.lookup(handle, |w| w.message_sink.clone()) {
            sink.message_received(&decode_web_message(json));
        }
    }

    pub fn navigation_starting(&self, handle: WindowHandle, uri: &str) {
        if let Some(events) = self.lookup(handle, |w| w.events.clone()) {
            events.navigation_starting(uri);
        }
    }

    /// Response for a request under a registered custom scheme. `None` leaves
    /// the request to default handling.
    pub fn resource_requested(&self, handle: WindowHandle, uri: &str) -> Option<ResourceResponse> {
        let scheme = scheme_of(uri)?;
        let handler = self.lookup(handle, |w| w.scheme_handler(scheme)).flatten()?;
        handler.resolve(uri).map(ResourceResponse::ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{HostCallbacks, WindowEvents};
    use crate::scheme::WebResource;
    use std::cell::Cell;

    /// Records what the manager asked of the browser.
    #[derive(Clone, Default)]
    struct FakeBrowser {
        calls: Rc<RefCell<Vec<String>>>,
        fail_refit: bool,
    }

    impl FakeBrowser {
        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn record(&self, call: String) -> Result<()> {
            self.calls.borrow_mut().push(call);
            Ok(())
        }
    }

    impl BrowserView for FakeBrowser {
        fn refit(&self) -> Result<()> {
            self.record("refit".into())?;
            if self.fail_refit {
                return Err(Error::runtime("SetBounds", crate::error::E_UNEXPECTED));
            }
            Ok(())
        }
        fn navigate(&self, url: &str) -> Result<()> {
            self.record(format!("navigate {url}"))
        }
        fn navigate_to_string(&self, html: &str) -> Result<()> {
            self.record(format!("html {html}"))
        }
        fn post_message_as_json(&self, json: &str) -> Result<()> {
            self.record(format!("post {json}"))
        }
        fn reload(&self) -> Result<()> {
            self.record("reload".into())
        }
        fn close(&self) -> Result<()> {
            self.record("close".into())
        }
    }

    /// Lifecycle events captured in order.
    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<String>>,
        allow_close: Cell<bool>,
    }

    impl WindowEvents for Recorder {
        fn moved(&self, x: i32, y: i32) {
            self.seen.borrow_mut().push(format!("moved {x},{y}"));
        }
        fn size_changed(&self, width: i32, height: i32, maximized: bool) {
            self.seen.borrow_mut().push(format!("size {width}x{height} {maximized}"));
        }
        fn closing(&self) -> CloseAction {
            if self.allow_close.get() {
                CloseAction::Destroy
            } else {
                CloseAction::Keep
            }
        }
        fn closed(&self) {
            self.seen.borrow_mut().push("closed".into());
        }
        fn dpi_changed(&self, dpi: u32) {
            self.seen.borrow_mut().push(format!("dpi {dpi}"));
        }
        fn navigation_starting(&self, uri: &str) {
            self.seen.borrow_mut().push(format!("nav {uri}"));
        }
    }

    struct Messages(RefCell<Vec<String>>);

    impl MessageSink for Messages {
        fn message_received(&self, message: &str) {
            self.0.borrow_mut().push(message.to_string());
        }
    }

    struct ServeHi;

    impl SchemeHandler for ServeHi {
        fn resolve(&self, _uri: &str) -> Option<WebResource> {
            Some(WebResource { content: b"hi".to_vec(), content_type: "text/plain".into() })
        }
    }

    fn handle(raw: isize) -> WindowHandle {
        WindowHandle::from_raw(raw)
    }

    fn manager_with(raw: isize, events: Rc<dyn WindowEvents>) -> WindowManager<FakeBrowser> {
        let manager = WindowManager::new();
        manager.register(WindowRecord::new(handle(raw), WindowStyle::Default, events));
        manager
    }

    fn attached(raw: isize, events: Rc<dyn WindowEvents>) -> (WindowManager<FakeBrowser>, FakeBrowser) {
        let manager = manager_with(raw, events);
        let browser = FakeBrowser::default();
        manager.begin_attach(handle(raw), Rc::new(Messages(RefCell::new(Vec::new())))).unwrap();
        manager.complete_attach(handle(raw), browser.clone()).unwrap();
        (manager, browser)
    }

    #[test]
    fn attach_stores_browser_and_fits_it() {
        let (manager, browser) = attached(1, Rc::new(HostCallbacks::default()));
        assert!(manager.browser(handle(1)).is_ok());
        assert_eq!(browser.calls(), vec!["refit"]);
    }

    #[test]
    fn attach_stands_when_viewport_setup_fails() {
        let manager = manager_with(1, Rc::new(HostCallbacks::default()));
        let browser = FakeBrowser { fail_refit: true, ..FakeBrowser::default() };
        manager.begin_attach(handle(1), Rc::new(Messages(RefCell::new(Vec::new())))).unwrap();
        assert!(manager.complete_attach(handle(1), browser.clone()).is_ok());
        manager.navigate(handle(1), "https://example.com").unwrap();
        assert_eq!(browser.calls(), vec!["refit", "navigate https://example.com"]);
    }

    #[test]
    fn second_attach_is_refused() {
        let (manager, _) = attached(1, Rc::new(HostCallbacks::default()));
        let again = manager.begin_attach(handle(1), Rc::new(Messages(RefCell::new(Vec::new()))));
        assert!(matches!(again, Err(Error::AlreadyAttached(_))));
    }

    #[test]
    fn attach_pending_is_refused_then_retryable_after_abort() {
        let manager = manager_with(1, Rc::new(HostCallbacks::default()));
        let sink = || Rc::new(Messages(RefCell::new(Vec::new())));
        manager.begin_attach(handle(1), sink()).unwrap();
        assert!(matches!(manager.begin_attach(handle(1), sink()), Err(Error::AlreadyAttached(_))));
        manager.abort_attach(handle(1));
        manager.begin_attach(handle(1), sink()).unwrap();
    }

    #[test]
    fn attach_to_unknown_window_fails_fast() {
        let manager: WindowManager<FakeBrowser> = WindowManager::new();
        let result = manager.begin_attach(handle(3), Rc::new(Messages(RefCell::new(Vec::new()))));
        assert!(matches!(result, Err(Error::WindowNotFound(_))));
        let result = manager.begin_attach(WindowHandle::NULL, Rc::new(Messages(RefCell::new(Vec::new()))));
        assert!(matches!(result, Err(Error::NullHandle)));
    }

    #[test]
    fn browser_closed_if_window_vanished_during_attach() {
        let manager = manager_with(1, Rc::new(HostCallbacks::default()));
        manager.begin_attach(handle(1), Rc::new(Messages(RefCell::new(Vec::new())))).unwrap();
        manager.destroyed(handle(1));
        let browser = FakeBrowser::default();
        assert!(manager.complete_attach(handle(1), browser.clone()).is_err());
        assert_eq!(browser.calls(), vec!["close"]);
    }

    #[test]
    fn operations_before_attach_are_not_ready() {
        let manager = manager_with(1, Rc::new(HostCallbacks::default()));
        assert!(matches!(manager.navigate(handle(1), "https://x"), Err(Error::NotReady(_))));
        assert!(matches!(manager.reload(handle(1)), Err(Error::NotReady(_))));
        assert!(matches!(manager.post_message_as_json(handle(1), "{}"), Err(Error::NotReady(_))));
    }

    #[test]
    fn operations_after_attach_reach_browser() {
        let (manager, browser) = attached(1, Rc::new(HostCallbacks::default()));
        manager.navigate(handle(1), "https://example.com").unwrap();
        manager.navigate_to_string(handle(1), "<p>hi</p>").unwrap();
        manager.post_message_as_json(handle(1), r#"{"a":1}"#).unwrap();
        manager.reload(handle(1)).unwrap();
        assert_eq!(
            browser.calls(),
            vec!["refit", "navigate https://example.com", "html <p>hi</p>", r#"post {"a":1}"#, "reload"]
        );
    }

    #[test]
    fn empty_json_is_rejected() {
        let (manager, browser) = attached(1, Rc::new(HostCallbacks::default()));
        assert!(matches!(manager.post_message_as_json(handle(1), "  "), Err(Error::InvalidArgument(_))));
        assert_eq!(browser.calls(), vec!["refit"]);
    }

    #[test]
    fn size_change_refits_and_forwards() {
        let events = Rc::new(Recorder::default());
        let (manager, browser) = attached(1, events.clone());
        manager.size_changed(handle(1), 640, 480, true);
        assert_eq!(browser.calls(), vec!["refit", "refit"]);
        assert_eq!(*events.seen.borrow(), vec!["size 640x480 true"]);
    }

    #[test]
    fn events_for_unknown_windows_are_ignored() {
        let manager: WindowManager<FakeBrowser> = WindowManager::new();
        manager.size_changed(handle(9), 1, 1, false);
        manager.moved(handle(9), 1, 1);
        assert_eq!(manager.close_requested(handle(9)), None);
        assert!(!manager.dpi_changed(handle(9), 96));
        assert!(manager.resource_requested(handle(9), "app://x").is_none());
    }

    #[test]
    fn close_follows_closing_callback() {
        let events = Rc::new(Recorder::default());
        let manager = manager_with(1, events.clone());
        assert_eq!(manager.close_requested(handle(1)), Some(CloseAction::Keep));
        events.allow_close.set(true);
        assert_eq!(manager.close_requested(handle(1)), Some(CloseAction::Destroy));
    }

    #[test]
    fn close_only_targets_registered_windows() {
        let manager = manager_with(1, Rc::new(HostCallbacks::default()));
        assert_eq!(manager.close_target(handle(1)).unwrap(), Some(handle(1)));
        assert_eq!(manager.close_target(handle(42)).unwrap(), None);
        assert!(matches!(manager.close_target(WindowHandle::NULL), Err(Error::NullHandle)));

        manager.destroyed(handle(1));
        assert_eq!(manager.close_target(handle(1)).unwrap(), None);
    }

    #[test]
    fn destroy_removes_window_and_reports_remaining() {
        let events = Rc::new(Recorder::default());
        let (manager, browser) = attached(1, events.clone());
        manager.register(WindowRecord::new(handle(2), WindowStyle::Toolbox, Rc::new(HostCallbacks::default())));

        assert_eq!(manager.destroyed(handle(1)), 1);
        assert!(!manager.contains(handle(1)));
        assert_eq!(*events.seen.borrow(), vec!["closed"]);
        assert_eq!(browser.calls(), vec!["refit", "close"]);

        assert_eq!(manager.destroyed(handle(2)), 0);
        assert_eq!(manager.window_count(), 0);
    }

    #[test]
    fn closed_callback_may_reenter_manager() {
        struct Reenter(Rc<WindowManager<FakeBrowser>>);
        impl WindowEvents for Reenter {
            fn closed(&self) {
                assert!(self.0.contains(WindowHandle::from_raw(1)));
                let _ = self.0.style(WindowHandle::from_raw(1));
            }
        }
        let manager = Rc::new(WindowManager::new());
        manager.register(WindowRecord::new(handle(1), WindowStyle::Default, Rc::new(Reenter(manager.clone()))));
        assert_eq!(manager.destroyed(handle(1)), 0);
    }

    #[test]
    fn dpi_and_move_are_forwarded() {
        let events = Rc::new(Recorder::default());
        let manager = manager_with(1, events.clone());
        manager.moved(handle(1), -10, 20);
        assert!(manager.dpi_changed(handle(1), 144));
        manager.navigation_starting(handle(1), "https://example.com/");
        assert_eq!(
            *events.seen.borrow(),
            vec!["moved -10,20", "dpi 144", "nav https://example.com/"]
        );
    }

    #[test]
    fn web_messages_are_decoded_for_sink() {
        let manager = manager_with(1, Rc::new(HostCallbacks::default()));
        let sink = Rc::new(Messages(RefCell::new(Vec::new())));
        manager.begin_attach(handle(1), sink.clone()).unwrap();
        manager.message_received(handle(1), r#""ping""#);
        manager.message_received(handle(1), r#"{"EventName":"x"}"#);
        assert_eq!(*sink.0.borrow(), vec!["ping", r#"{"EventName":"x"}"#]);
    }

    fn quoted_payload(total_len: usize) -> String {
        format!("\"{}\"", "a".repeat(total_len - 2))
    }

    #[test]
    fn oversized_web_message_is_dropped() {
        let manager = manager_with(1, Rc::new(HostCallbacks::default()));
        let sink = Rc::new(Messages(RefCell::new(Vec::new())));
        manager.begin_attach(handle(1), sink.clone()).unwrap();
        manager.message_received(handle(1), &quoted_payload(MAX_MESSAGE_SIZE + 1));
        assert!(sink.0.borrow().is_empty());
    }

    #[test]
    fn web_message_at_size_limit_is_delivered() {
        let manager = manager_with(1, Rc::new(HostCallbacks::default()));
        let sink = Rc::new(Messages(RefCell::new(Vec::new())));
        manager.begin_attach(handle(1), sink.clone()).unwrap();
        manager.message_received(handle(1), &quoted_payload(MAX_MESSAGE_SIZE));
        let seen = sink.0.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].len(), MAX_MESSAGE_SIZE - 2);
    }

    #[test]
    fn custom_scheme_request_gets_response() {
        let manager = manager_with(1, Rc::new(HostCallbacks::default()));
        manager.add_custom_scheme(handle(1), "app", Rc::new(ServeHi)).unwrap();

        let response = manager.resource_requested(handle(1), "app://host/path").unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.headers, "Content-Type: text/plain");
        assert_eq!(response.body, b"hi");

        assert!(manager.resource_requested(handle(1), "unknownscheme://x").is_none());
    }

    #[test]
    fn scheme_registration_is_per_window() {
        let manager = manager_with(1, Rc::new(HostCallbacks::default()));
        manager.register(WindowRecord::new(handle(2), WindowStyle::Default, Rc::new(HostCallbacks::default())));
        manager.add_custom_scheme(handle(1), "app", Rc::new(ServeHi)).unwrap();
        manager.add_custom_scheme(handle(2), "app", Rc::new(ServeHi)).unwrap();
        let again = manager.add_custom_scheme(handle(1), "app", Rc::new(ServeHi));
        assert!(matches!(again, Err(Error::DuplicateScheme(_))));
        assert_eq!(again.unwrap_err().hresult(), crate::error::E_INVALIDARG);
    }
}
