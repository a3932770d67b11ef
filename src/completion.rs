//! One-shot completion slot: an asynchronous callback fills it, a blocking
//! caller waits for it, either parked on a condvar or while pumping the event
//! loop the callback depends on.

use std::cell::RefCell;
use std::rc::Rc;

use once_cell::unsync::OnceCell;
use parking_lot::{Condvar, Mutex};

enum State<T> {
    Pending,
    Ready(T),
    Taken,
}

/// Result of pumping one round of the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pump {
    Continue,
    /// The loop was asked to quit; the value will not arrive.
    Quit,
}

pub struct Completion<T> {
    state: Mutex<State<T>>,
    signal: Condvar,
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Completion<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Pending),
            signal: Condvar::new(),
        }
    }

    /// Fill the slot. Returns `false` if it was already completed.
    pub fn complete(&self, value: T) -> bool {
        let mut state = self.state.lock();
        if !matches!(*state, State::Pending) {
            return false;
        }
        *state = State::Ready(value);
        drop(state);
        self.signal.notify_all();
        true
    }

    pub fn is_complete(&self) -> bool {
        !matches!(*self.state.lock(), State::Pending)
    }

    /// A copy of the value if it has arrived, leaving it in place.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        match &*self.state.lock() {
            State::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Take the value if it has arrived.
    pub fn try_take(&self) -> Option<T> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, State::Taken) {
            State::Ready(value) => Some(value),
            other => {
                *state = other;
                None
            }
        }
    }

    /// Park the calling thread until the value arrives. Must not be called on
    /// the thread that is expected to complete the slot.
    pub fn wait(&self) -> T {
        let mut state = self.state.lock();
        loop {
            if let State::Ready(_) = *state {
                if let State::Ready(value) = std::mem::replace(&mut *state, State::Taken) {
                    return value;
                }
            }
            self.signal.wait(&mut state);
        }
    }

    /// Run `pump` until the value arrives. `pump` is expected to block for and
    /// dispatch one event; the value is re-checked after every round.
    pub fn wait_pumping(&self, mut pump: impl FnMut() -> Pump) -> Option<T> {
        loop {
            if let Some(value) = self.try_take() {
                return Some(value);
            }
            if pump() == Pump::Quit {
                return self.try_take();
            }
        }
    }

    /// Like `wait_pumping`, but leaves the value in place so nested waiters
    /// on the same slot all see it.
    pub fn wait_pumping_shared(&self, mut pump: impl FnMut() -> Pump) -> Option<T>
    where
        T: Clone,
    {
        loop {
            if let Some(value) = self.peek() {
                return Some(value);
            }
            if pump() == Pump::Quit {
                return self.peek();
            }
        }
    }
}

/// A value produced once by an asynchronous operation on the UI thread and
/// shared afterwards. Callers arriving while the operation is in flight,
/// including ones re-entered from the pumped wait, join it instead of
/// starting another. Failures are not kept; the next caller starts over.
pub struct SharedInit<T, R> {
    value: OnceCell<T>,
    pending: RefCell<Option<Rc<Completion<R>>>>,
}

impl<T: Clone, R> Default for SharedInit<T, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, R> SharedInit<T, R> {
    pub fn new() -> Self {
        Self {
            value: OnceCell::new(),
            pending: RefCell::new(None),
        }
    }

    pub fn get(&self) -> Option<T> {
        self.value.get().cloned()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    /// The shared value. `start` kicks the operation off when none is in
    /// flight; `wait` turns its completion into the value and must not take
    /// the result out of the slot.
    pub fn get_or_create<E>(
        &self,
        start: impl FnOnce() -> Result<Rc<Completion<R>>, E>,
        wait: impl FnOnce(&Completion<R>) -> Result<T, E>,
    ) -> Result<T, E> {
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }
        let in_flight = self.pending.borrow().clone();
        let slot = match in_flight {
            Some(slot) => slot,
            None => {
                let slot = start()?;
                *self.pending.borrow_mut() = Some(Rc::clone(&slot));
                slot
            }
        };
        let outcome = wait(&slot);
        {
            let mut pending = self.pending.borrow_mut();
            if pending.as_ref().is_some_and(|p| Rc::ptr_eq(p, &slot)) {
                *pending = None;
            }
        }
        let value = outcome?;
        Ok(self.value.get_or_init(|| value).clone())
    }
}
