use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

type Callback = Rc<dyn Fn()>;

/// Ordered list of zero-argument subscribers, keyed by name.
///
/// A key can be registered once; later registrations under the same key are
/// ignored. Dispatch iterates over a snapshot, so subscribers may subscribe or
/// unsubscribe (themselves or others) from inside their own callback. Changes
/// made during a dispatch take effect on the next one.
pub struct Signal {
    name: &'static str,
    subscribers: RefCell<Vec<(String, Callback)>>,
}

impl Signal {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            subscribers: RefCell::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Adds `callback` under `key`. Returns `false` if `key` is already present.
    pub fn subscribe<F>(&self, key: impl Into<String>, callback: F) -> bool
    where
        F: Fn() + 'static,
    {
        let key = key.into();
        let mut subscribers = self.subscribers.borrow_mut();
        if subscribers.iter().any(|(existing, _)| *existing == key) {
            debug!("{}: '{}' already subscribed", self.name, key);
            return false;
        }
        debug!("{}: '{}' subscribed", self.name, key);
        subscribers.push((key, Rc::new(callback)));
        true
    }

    pub fn unsubscribe(&self, key: &str) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| existing != key);
        let removed = subscribers.len() != before;
        if removed {
            debug!("{}: '{}' unsubscribed", self.name, key);
        }
        removed
    }

    pub fn is_subscribed(&self, key: &str) -> bool {
        self.subscribers
            .borrow()
            .iter()
            .any(|(existing, _)| existing == key)
    }

    pub fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.borrow().is_empty()
    }

    /// Calls every subscriber registered when the dispatch starts, in order.
    pub fn fire(&self) {
        let snapshot: Vec<Callback> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        debug!("{}: firing to {} subscriber(s)", self.name, snapshot.len());
        for callback in snapshot {
            callback();
        }
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(key, _)| key.clone())
            .collect();
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("subscribers", &keys)
            .finish()
    }
}
