//! Run work on the UI thread from any thread and wait for it to finish.

use std::sync::Arc;

use crate::boundary::guard;
use crate::completion::Completion;
use crate::error::Result;

/// A callback in transit to the UI thread.
pub struct InvokeRequest {
    action: Box<dyn FnOnce() + Send>,
    done: Arc<Completion<()>>,
}

impl InvokeRequest {
    pub fn new(action: impl FnOnce() + Send + 'static) -> (Box<Self>, Arc<Completion<()>>) {
        let done = Arc::new(Completion::new());
        let request = Box::new(Self {
            action: Box::new(action),
            done: Arc::clone(&done),
        });
        (request, done)
    }

    /// Execute on the UI thread and release the waiting caller. A panicking
    /// action is logged and still releases the caller.
    pub fn run(self) {
        let Self { action, done } = self;
        guard("invoked callback", (), action);
        done.complete(());
    }
}

/// The thread that owns the windows and its message queue.
pub trait UiThread {
    /// Whether the calling thread is the UI thread.
    fn is_current(&self) -> bool;

    /// Queue `request` for the UI thread. On error the request is dropped.
    fn post(&self, request: Box<InvokeRequest>) -> Result<()>;
}

/// Run `action` on the UI thread, returning after it has completed. On the UI
/// thread itself the action runs inline.
pub fn invoke<U: UiThread>(ui: &U, action: impl FnOnce() + Send + 'static) -> Result<()> {
    if ui.is_current() {
        guard("invoked callback", (), action);
        return Ok(());
    }
    let (request, done) = InvokeRequest::new(action);
    ui.post(request)?;
    done.wait();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::thread::{self, ThreadId};
    use std::time::Duration;

    /// A UI thread draining a channel, standing in for the Win32 queue.
    struct FakeUi {
        id: ThreadId,
        queue: mpsc::Sender<Box<InvokeRequest>>,
    }

    impl UiThread for FakeUi {
        fn is_current(&self) -> bool {
            thread::current().id() == self.id
        }

        fn post(&self, request: Box<InvokeRequest>) -> Result<()> {
            self.queue.send(request).map_err(|_| Error::NoUiThread)
        }
    }

    fn spawn_ui() -> (FakeUi, thread::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel::<Box<InvokeRequest>>();
        let worker = thread::spawn(move || {
            for request in rx {
                request.run();
            }
        });
        let ui = FakeUi { id: worker.thread().id(), queue: tx };
        (ui, worker)
    }

    #[test]
    fn caller_waits_for_callback() {
        let (ui, worker) = spawn_ui();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let ui_id = ui.id;
        invoke(&ui, move || {
            thread::sleep(Duration::from_millis(30));
            assert_eq!(thread::current().id(), ui_id);
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();
        assert!(ran.load(Ordering::SeqCst));
        drop(ui);
        worker.join().unwrap();
    }

    #[test]
    fn requests_run_in_posting_order() {
        let (ui, worker) = spawn_ui();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for i in 0..5 {
            let log = Arc::clone(&log);
            invoke(&ui, move || log.lock().push(i)).unwrap();
        }
        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
        drop(ui);
        worker.join().unwrap();
    }

    #[test]
    fn runs_inline_on_ui_thread() {
        let (tx, _rx) = mpsc::channel();
        let ui = FakeUi { id: thread::current().id(), queue: tx };
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        invoke(&ui, move || flag.store(true, Ordering::SeqCst)).unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn panicking_callback_still_releases_caller() {
        let (ui, worker) = spawn_ui();
        invoke(&ui, || panic!("host callback failed")).unwrap();
        drop(ui);
        worker.join().unwrap();
    }

    #[test]
    fn post_failure_is_reported() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let ui = FakeUi { id: thread::spawn(|| {}).thread().id(), queue: tx };
        assert!(matches!(invoke(&ui, || {}), Err(Error::NoUiThread)));
    }
}
