#![forbid(unsafe_code)]

//! Lazy derived values that follow their [`Observable`] sources.
//!
//! # Design
//!
//! [`Computed<T>`] keeps a compute function and its cached result in shared
//! storage. Each source subscription only flips a dirty flag; the compute
//! function runs on the next read. Model factories use this for fields such
//! as `doubled = count * 2`, so every consumer of a shared model reads the
//! same memoized value.
//!
//! # Invariants
//!
//! 1. While its subscriptions are live, a read never returns a value computed
//!    from an older source state.
//! 2. The compute function runs at most once per change cycle.
//! 3. `version` increments by exactly 1 per recomputation.
//!
//! # Failure Modes
//!
//! - **Compute function panics**: the previous cached value is kept and the
//!   dirty flag stays set, so the next read retries.
//! - **Owning scope disposed**: the source subscriptions are stopped. The
//!   value freezes at its last computed result.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::observable::{Observable, Subscription};

struct ComputedInner<T> {
    compute: Box<dyn Fn() -> T>,
    cached: Option<T>,
    version: u64,
    /// Held only to keep the source callbacks attached.
    _subscriptions: Vec<Subscription>,
}

impl<T> ComputedInner<T> {
    /// Recompute if needed and borrow the cached value.
    ///
    /// The dirty flag is cleared before computing so that a source changing
    /// mid-computation leaves the result marked stale.
    fn fresh(&mut self, dirty: &Cell<bool>) -> &T {
        let value = match self.cached.take() {
            Some(value) if !dirty.get() => value,
            previous => {
                self.cached = previous;
                dirty.set(false);
                let _restore = RestoreDirtyOnPanic(dirty);
                let value = (self.compute)();
                self.version += 1;
                value
            }
        };
        self.cached.insert(value)
    }
}

struct RestoreDirtyOnPanic<'a>(&'a Cell<bool>);

impl Drop for RestoreDirtyOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.set(true);
        }
    }
}

/// A memoized value derived from one or more [`Observable`]s.
///
/// Cloning a `Computed` creates a new handle to the **same** cache.
pub struct Computed<T> {
    inner: Rc<RefCell<ComputedInner<T>>>,
    dirty: Rc<Cell<bool>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            dirty: Rc::clone(&self.dirty),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Computed")
            .field("cached", &inner.cached)
            .field("dirty", &self.dirty.get())
            .field("version", &inner.version)
            .finish()
    }
}

impl<T: Clone + 'static> Computed<T> {
    fn with_compute(compute: Box<dyn Fn() -> T>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ComputedInner {
                compute,
                cached: None,
                version: 0,
                _subscriptions: Vec::new(),
            })),
            dirty: Rc::new(Cell::new(true)),
        }
    }

    /// Subscribe to `source` so that any change marks this value dirty.
    fn follow<S: Clone + PartialEq + 'static>(&self, source: &Observable<S>) {
        let dirty: Weak<Cell<bool>> = Rc::downgrade(&self.dirty);
        let sub = source.subscribe(move |_| {
            if let Some(dirty) = dirty.upgrade() {
                dirty.set(true);
            }
        });
        self.inner.borrow_mut()._subscriptions.push(sub);
    }

    /// Derive a value from a single observable.
    pub fn from_observable<S: Clone + PartialEq + 'static>(
        source: &Observable<S>,
        map: impl Fn(&S) -> T + 'static,
    ) -> Self {
        let src = source.clone();
        let computed = Self::with_compute(Box::new(move || src.with(|v| map(v))));
        computed.follow(source);
        computed
    }

    /// Derive a value from two observables.
    pub fn from2<S1, S2>(
        s1: &Observable<S1>,
        s2: &Observable<S2>,
        map: impl Fn(&S1, &S2) -> T + 'static,
    ) -> Self
    where
        S1: Clone + PartialEq + 'static,
        S2: Clone + PartialEq + 'static,
    {
        let (a, b) = (s1.clone(), s2.clone());
        let computed = Self::with_compute(Box::new(move || a.with(|x| b.with(|y| map(x, y)))));
        computed.follow(s1);
        computed.follow(s2);
        computed
    }

    /// Derive a value from three observables.
    pub fn from3<S1, S2, S3>(
        s1: &Observable<S1>,
        s2: &Observable<S2>,
        s3: &Observable<S3>,
        map: impl Fn(&S1, &S2, &S3) -> T + 'static,
    ) -> Self
    where
        S1: Clone + PartialEq + 'static,
        S2: Clone + PartialEq + 'static,
        S3: Clone + PartialEq + 'static,
    {
        let (a, b, c) = (s1.clone(), s2.clone(), s3.clone());
        let computed = Self::with_compute(Box::new(move || {
            a.with(|x| b.with(|y| c.with(|z| map(x, y, z))))
        }));
        computed.follow(s1);
        computed.follow(s2);
        computed.follow(s3);
        computed
    }

    /// Build from a bare compute function and caller-managed subscriptions.
    ///
    /// The subscriptions are only kept alive; they do not mark this value
    /// dirty. Callers pair this with [`invalidate`](Self::invalidate).
    pub fn from_fn(compute: impl Fn() -> T + 'static, subscriptions: Vec<Subscription>) -> Self {
        let computed = Self::with_compute(Box::new(compute));
        computed.inner.borrow_mut()._subscriptions = subscriptions;
        computed
    }

    /// Current value, recomputing first if a dependency changed.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow_mut().fresh(&self.dirty).clone()
    }

    /// Borrow the current value without cloning.
    ///
    /// # Panics
    ///
    /// Panics if `f` reads this same `Computed` again.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(self.inner.borrow_mut().fresh(&self.dirty))
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Mark the cache stale; the next read recomputes.
    pub fn invalidate(&self) {
        self.dirty.set(true);
    }

    /// Number of recomputations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let count = Rc::new(Cell::new(0u32));
        (Rc::clone(&count), count)
    }

    #[test]
    fn doubles_source() {
        let count = Observable::new(1);
        let doubled = Computed::from_observable(&count, |v| v * 2);

        assert_eq!(doubled.get(), 2);
        count.set(2);
        assert!(doubled.is_dirty());
        assert_eq!(doubled.get(), 4);
        assert_eq!(doubled.version(), 2);
    }

    #[test]
    fn two_sources() {
        let width = Observable::new(3);
        let height = Observable::new(4);
        let area = Computed::from2(&width, &height, |w, h| w * h);

        assert_eq!(area.get(), 12);
        height.set(10);
        assert_eq!(area.get(), 30);
    }

    #[test]
    fn three_sources() {
        let a = Observable::new(1);
        let b = Observable::new(2);
        let c = Observable::new(3);
        let sum = Computed::from3(&a, &b, &c, |x, y, z| x + y + z);

        assert_eq!(sum.get(), 6);
        c.set(30);
        assert_eq!(sum.get(), 33);
    }

    #[test]
    fn not_computed_until_read() {
        let (calls, calls_in) = counter();
        let source = Observable::new(5);
        let computed = Computed::from_observable(&source, move |v| {
            calls_in.set(calls_in.get() + 1);
            *v
        });

        assert_eq!(calls.get(), 0);
        assert!(computed.is_dirty());
        assert_eq!(computed.get(), 5);
        assert_eq!(computed.get(), 5);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn equal_set_keeps_cache() {
        let (calls, calls_in) = counter();
        let source = Observable::new(9);
        let computed = Computed::from_observable(&source, move |v| {
            calls_in.set(calls_in.get() + 1);
            *v
        });

        let _ = computed.get();
        source.set(9);
        assert!(!computed.is_dirty());
        let _ = computed.get();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn invalidate_forces_recompute() {
        let source = Observable::new(5);
        let computed = Computed::from_observable(&source, |v| *v);
        let _ = computed.get();

        computed.invalidate();
        assert!(computed.is_dirty());
        let _ = computed.get();
        assert_eq!(computed.version(), 2);
    }

    #[test]
    fn with_reads_by_reference() {
        let source = Observable::new(vec![1, 2, 3]);
        let total = Computed::from_observable(&source, |v| v.iter().sum::<i32>());
        assert_eq!(total.with(|sum| *sum), 6);

        source.update(|v| v.push(4));
        assert_eq!(total.with(|sum| *sum), 10);
    }

    #[test]
    fn clones_share_cache() {
        let source = Observable::new(1);
        let a = Computed::from_observable(&source, |v| v + 1);
        let b = a.clone();

        assert_eq!(a.get(), 2);
        assert_eq!(b.version(), 1);
        source.set(10);
        assert_eq!(b.get(), 11);
        assert_eq!(a.version(), 2);
    }

    #[test]
    fn chained_computed() {
        let base = Observable::new(2);
        let doubled = Computed::from_observable(&base, |v| v * 2);
        let doubled_in = doubled.clone();
        let plus_one = Computed::from_observable(&base, move |_| doubled_in.get() + 1);

        assert_eq!(plus_one.get(), 5);
        base.set(10);
        assert_eq!(plus_one.get(), 21);
        assert_eq!(doubled.get(), 20);
    }

    #[test]
    fn from_fn_keeps_subscriptions_alive() {
        let source = Observable::new(5);
        let src = source.clone();
        let sub = source.subscribe(|_| {});
        let tripled = Computed::from_fn(move || src.get() * 3, vec![sub]);

        assert_eq!(tripled.get(), 15);
        assert_eq!(source.subscriber_count(), 1);

        source.set(10);
        assert_eq!(tripled.get(), 15);
        tripled.invalidate();
        assert_eq!(tripled.get(), 30);
    }

    #[test]
    fn panicking_compute_keeps_previous_value() {
        let source = Observable::new(1);
        let computed = Computed::from_observable(&source, |v| {
            assert!(*v < 100, "too large");
            *v
        });
        assert_eq!(computed.get(), 1);

        source.set(100);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| computed.get()));
        assert!(result.is_err());
        assert!(computed.is_dirty());

        source.set(2);
        assert_eq!(computed.get(), 2);
    }

    #[test]
    fn survives_source_drop() {
        let computed;
        {
            let source = Observable::new(42);
            computed = Computed::from_observable(&source, |v| *v);
        }
        assert_eq!(computed.get(), 42);
        assert!(!computed.is_dirty());
    }

    #[test]
    fn debug_shows_cache() {
        let source = Observable::new(7);
        let computed = Computed::from_observable(&source, |v| *v);
        let _ = computed.get();
        let dbg = format!("{computed:?}");
        assert!(dbg.contains("Computed"));
        assert!(dbg.contains('7'));
    }
}
