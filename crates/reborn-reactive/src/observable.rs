#![forbid(unsafe_code)]

//! Shared, version-tracked values with change notification.
//!
//! # Design
//!
//! [`Observable<T>`] wraps a value in `Rc<RefCell<..>>`. Cloning an
//! observable yields another handle to the same value, which is what lets
//! several components read and write one model field.
//!
//! Subscribers are stored as weak references to a callback slot. The strong
//! reference is held by the returned [`Subscription`]; dropping it or calling
//! [`Subscription::stop`] detaches the callback. Dead slots are pruned lazily
//! on the next notification.
//!
//! # Failure Modes
//!
//! - **Callback mutates the same observable**: allowed. The borrow is released
//!   before callbacks run, so the nested `set` notifies with the newer value
//!   and the outer loop continues with the snapshot it already took.
//! - **Callback panics**: remaining subscribers for that mutation are skipped;
//!   the value and version are already updated.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::scope;

/// Something an [`EffectScope`](crate::EffectScope) can stop on disposal.
pub(crate) trait Stop {
    fn stop(&self);
    fn is_stopped(&self) -> bool;
}

struct Slot<T> {
    callback: RefCell<Option<Rc<dyn Fn(&T)>>>,
}

impl<T> Slot<T> {
    fn callback(&self) -> Option<Rc<dyn Fn(&T)>> {
        self.callback.borrow().clone()
    }
}

impl<T> Stop for Slot<T> {
    fn stop(&self) {
        self.callback.borrow_mut().take();
    }

    fn is_stopped(&self) -> bool {
        self.callback.borrow().is_none()
    }
}

struct ObservableInner<T> {
    value: T,
    version: u64,
    subscribers: Vec<Weak<Slot<T>>>,
}

/// A shared value that notifies subscribers when it changes.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 for each `set` that changes the value.
/// 2. Subscribers run in registration order.
/// 3. A `set` with an equal value neither bumps the version nor notifies.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create a new observable holding `value` at version 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Access the current value by reference.
    ///
    /// # Panics
    ///
    /// Panics if `f` calls `set` on the same observable.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Replace the value, notifying subscribers if it changed.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify();
    }

    /// Mutate a copy of the value and store it back through [`set`](Self::set).
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut next = self.get();
        f(&mut next);
        self.set(next);
    }

    /// Number of changing mutations applied so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Register `callback` to run after every change.
    ///
    /// If an [`EffectScope`](crate::EffectScope) is running, the subscription
    /// is also recorded there and will be stopped when the scope is disposed.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let slot = Rc::new(Slot {
            callback: RefCell::new(Some(Rc::new(callback) as Rc<dyn Fn(&T)>)),
        });
        self.inner
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&slot));

        let slot: Rc<dyn Stop> = slot;
        scope::track_effect(Rc::downgrade(&slot));
        Subscription { slot }
    }

    /// Number of live, unstopped subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|slot| !slot.is_stopped())
            .count()
    }

    /// Whether both handles point at the same underlying value.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify(&self) {
        let (value, slots) = {
            let mut inner = self.inner.borrow_mut();
            inner
                .subscribers
                .retain(|weak| weak.upgrade().is_some_and(|slot| !slot.is_stopped()));
            let slots: Vec<Rc<Slot<T>>> =
                inner.subscribers.iter().filter_map(Weak::upgrade).collect();
            (inner.value.clone(), slots)
        };

        for slot in slots {
            // Re-read the callback: an earlier subscriber may have stopped it.
            if let Some(callback) = slot.callback() {
                callback(&value);
            }
        }
    }
}

/// RAII guard for an [`Observable`] subscription.
///
/// Dropping the guard detaches the callback. A subscription can also be
/// stopped early, either explicitly or by the disposal of the scope it was
/// created in.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    slot: Rc<dyn Stop>,
}

impl Subscription {
    /// Detach the callback without dropping the guard.
    pub fn stop(&self) {
        self.slot.stop();
    }

    /// Whether the callback is still attached.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.slot.is_stopped()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn get_and_set() {
        let obs = Observable::new(1);
        assert_eq!(obs.get(), 1);
        assert_eq!(obs.version(), 0);

        obs.set(2);
        assert_eq!(obs.get(), 2);
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn equal_set_is_noop() {
        let obs = Observable::new(7);
        let hits = Rc::new(Cell::new(0u32));
        let hits_clone = Rc::clone(&hits);
        let _sub = obs.subscribe(move |_| hits_clone.set(hits_clone.get() + 1));

        obs.set(7);
        assert_eq!(obs.version(), 0);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn subscribers_run_in_order() {
        let obs = Observable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let l1 = Rc::clone(&log);
        let _s1 = obs.subscribe(move |v| l1.borrow_mut().push(("first", *v)));
        let l2 = Rc::clone(&log);
        let _s2 = obs.subscribe(move |v| l2.borrow_mut().push(("second", *v)));

        obs.set(5);
        assert_eq!(*log.borrow(), vec![("first", 5), ("second", 5)]);
    }

    #[test]
    fn dropping_subscription_detaches() {
        let obs = Observable::new(0);
        let hits = Rc::new(Cell::new(0u32));
        let hits_clone = Rc::clone(&hits);
        let sub = obs.subscribe(move |_| hits_clone.set(hits_clone.get() + 1));
        assert_eq!(obs.subscriber_count(), 1);

        drop(sub);
        obs.set(1);
        assert_eq!(hits.get(), 0);
        assert_eq!(obs.subscriber_count(), 0);
    }

    #[test]
    fn stopped_subscription_is_not_invoked() {
        let obs = Observable::new(0);
        let hits = Rc::new(Cell::new(0u32));
        let hits_clone = Rc::clone(&hits);
        let sub = obs.subscribe(move |_| hits_clone.set(hits_clone.get() + 1));

        sub.stop();
        assert!(!sub.is_active());
        obs.set(1);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn update_mutates_copy() {
        let obs = Observable::new(vec![1, 2]);
        obs.update(|v| v.push(3));
        assert_eq!(obs.get(), vec![1, 2, 3]);
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn clones_share_value() {
        let a = Observable::new(String::from("x"));
        let b = a.clone();
        b.set(String::from("y"));
        assert_eq!(a.get(), "y");
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Observable::new(String::from("y"))));
    }

    #[test]
    fn callback_may_set_same_observable() {
        let obs = Observable::new(0);
        let obs_clone = obs.clone();
        let _sub = obs.subscribe(move |v| {
            if *v < 3 {
                obs_clone.set(v + 1);
            }
        });

        obs.set(1);
        assert_eq!(obs.get(), 3);
    }

    #[test]
    fn with_borrows_value() {
        let obs = Observable::new(vec![1, 2, 3]);
        assert_eq!(obs.with(|v| v.len()), 3);
    }
}
