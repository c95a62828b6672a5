// src/event.rs
//! Synchronous change-notification channels.
//!
//! Resources own an [`Event`] per notification kind; observers attach a
//! callback and receive a [`Subscription`] token. Dropping the token
//! detaches the callback, which lets the resource cache tie a
//! subscription's lifetime to the cache entry that owns it: the entry is
//! evicted, the token drops, the callback is gone before the GPU handle is
//! deleted.

use std::cell::RefCell;
use std::rc::Rc;

type Listeners<T> = Rc<RefCell<Vec<(u64, Box<dyn FnMut(&T)>)>>>;

pub struct Event<T> {
    listeners: Listeners<T>,
    next_id: std::cell::Cell<u64>,
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self {
            listeners: Rc::new(RefCell::new(Vec::new())),
            next_id: std::cell::Cell::new(0),
        }
    }
}

impl<T: 'static> Event<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a callback. It stays registered until the returned token is
    /// dropped. Callbacks must not attach or detach listeners on the same
    /// event while it is notifying.
    pub fn attach(&self, callback: impl FnMut(&T) + 'static) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, Box::new(callback)));

        let listeners = Rc::downgrade(&self.listeners);
        Subscription {
            detach: Some(Box::new(move || {
                if let Some(listeners) = listeners.upgrade() {
                    listeners.borrow_mut().retain(|(lid, _)| *lid != id);
                }
            })),
        }
    }

    pub fn notify(&self, arg: &T) {
        for (_, callback) in self.listeners.borrow_mut().iter_mut() {
            callback(arg);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl<T: 'static> std::fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// RAII handle for an attached callback. Detaches on drop; detaching after
/// the event itself is gone is a no-op.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Detach immediately instead of waiting for drop.
    pub fn cancel(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Subscription")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn notify_reaches_attached_listener() {
        let event: Event<u32> = Event::new();
        let seen = Rc::new(Cell::new(0u32));
        let seen2 = seen.clone();
        let _sub = event.attach(move |v| seen2.set(*v));
        event.notify(&7);
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn dropping_subscription_detaches() {
        let event: Event<u32> = Event::new();
        let seen = Rc::new(Cell::new(0u32));
        let seen2 = seen.clone();
        let sub = event.attach(move |v| seen2.set(*v));
        drop(sub);
        event.notify(&7);
        assert_eq!(seen.get(), 0);
        assert_eq!(event.listener_count(), 0);
    }

    #[test]
    fn detach_after_event_dropped_is_noop() {
        let event: Event<u32> = Event::new();
        let sub = event.attach(|_| {});
        drop(event);
        sub.cancel();
    }
}
