//! Callback registry
//!
//! A registration is a stored task factory plus its trigger filter and a
//! re-entrancy flag. The flag is shared with the spawned task: it is set
//! when the registration fires and cleared by the scheduler when the task
//! returns. While it is set, further triggers for the same registration
//! are dropped outright - never queued, never retried.
//!
//! Synchronous closures are adapted into the same task-spawn mechanism by
//! the `*_sync` constructors, so every callback is scheduled the same way
//! whether or not its body ever suspends.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use crate::schedule::TaskFuture;

/// A registered callback with no trigger argument (per-frame, click,
/// click-release, per-sprite click, program start).
pub struct Registration {
    factory: Box<dyn FnMut() -> TaskFuture>,
    running: Rc<Cell<bool>>,
}

impl Registration {
    pub fn new<F, Fut>(mut callback: F) -> Self
    where
        F: FnMut() -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        Self {
            factory: Box::new(move || Box::pin(callback())),
            running: Rc::new(Cell::new(false)),
        }
    }

    /// Adapter for callbacks that never suspend. The body still runs
    /// inside the spawned task, not at trigger time, so sync and async
    /// callbacks are scheduled identically.
    pub fn new_sync<F>(callback: F) -> Self
    where
        F: FnMut() + 'static,
    {
        let callback = Rc::new(RefCell::new(callback));
        Self::new(move || {
            let callback = callback.clone();
            async move {
                (callback.borrow_mut())();
            }
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Fire the registration: construct the task and mark it running.
    /// Returns `None` - the trigger is dropped - while the previous
    /// invocation is still alive.
    pub fn trigger(&mut self) -> Option<(TaskFuture, Rc<Cell<bool>>)> {
        if self.running.get() {
            return None;
        }
        self.running.set(true);
        Some(((self.factory)(), self.running.clone()))
    }
}

/// A registered key callback: same as [`Registration`] plus the key filter
/// and the key name passed to the callback.
pub struct KeyRegistration {
    factory: Box<dyn FnMut(String) -> TaskFuture>,
    /// `None` means "any key".
    keys: Option<Vec<String>>,
    running: Rc<Cell<bool>>,
}

impl KeyRegistration {
    pub fn new<F, Fut>(keys: Option<Vec<String>>, mut callback: F) -> Self
    where
        F: FnMut(String) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        Self {
            factory: Box::new(move |key| Box::pin(callback(key))),
            keys,
            running: Rc::new(Cell::new(false)),
        }
    }

    pub fn new_sync<F>(keys: Option<Vec<String>>, callback: F) -> Self
    where
        F: FnMut(String) + 'static,
    {
        let callback = Rc::new(RefCell::new(callback));
        Self::new(keys, move |key| {
            let callback = callback.clone();
            async move {
                (callback.borrow_mut())(key);
            }
        })
    }

    pub fn matches(&self, key: &str) -> bool {
        match &self.keys {
            None => true,
            Some(keys) => keys.iter().any(|k| k == key),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn trigger(&mut self, key: &str) -> Option<(TaskFuture, Rc<Cell<bool>>)> {
        if self.running.get() {
            return None;
        }
        self.running.set(true);
        Some(((self.factory)(key.to_string()), self.running.clone()))
    }
}
