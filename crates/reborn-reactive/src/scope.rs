#![forbid(unsafe_code)]

//! Effect scopes: bulk ownership of subscriptions and cleanups.
//!
//! An [`EffectScope`] is entered with [`run`](EffectScope::run). While it is
//! the innermost running scope, every [`Observable::subscribe`] call records a
//! stop handle in it, including the subscriptions a [`Computed`] makes to its
//! sources. [`dispose`](EffectScope::dispose) stops all of them, disposes
//! child scopes, and runs the cleanups registered through
//! [`on_scope_dispose`] or [`EffectScope::on_dispose`].
//!
//! Scopes created with [`EffectScope::new`] are detached: running one inside
//! another does not make it a child, so it outlives the outer scope. Use
//! [`EffectScope::child`] for nesting.
//!
//! # Invariants
//!
//! 1. `dispose` is idempotent; only the first call has any effect.
//! 2. Children are disposed before the parent's own effects and cleanups.
//! 3. Cleanups run exactly once, in registration order.
//! 4. The running-scope stack is restored even if the closure passed to
//!    `run` panics.
//!
//! [`Observable::subscribe`]: crate::Observable::subscribe
//! [`Computed`]: crate::Computed

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ReactiveError, Result};
use crate::observable::Stop;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Prune dead effect handles once a scope tracks this many.
const EFFECT_PRUNE_THRESHOLD: usize = 64;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<EffectScope>> = const { RefCell::new(Vec::new()) };
}

/// Process-unique identifier of an [`EffectScope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

struct ScopeInner {
    id: ScopeId,
    active: Cell<bool>,
    effects: RefCell<Vec<Weak<dyn Stop>>>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    children: RefCell<Vec<EffectScope>>,
}

/// A disposable group of reactive effects.
///
/// Cloning yields another handle to the same scope.
#[derive(Clone)]
pub struct EffectScope {
    inner: Rc<ScopeInner>,
}

impl fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectScope")
            .field("id", &self.inner.id)
            .field("active", &self.inner.active.get())
            .field("effects", &self.inner.effects.borrow().len())
            .field("cleanups", &self.inner.cleanups.borrow().len())
            .finish()
    }
}

impl Default for EffectScope {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectScope {
    /// Create a detached, active scope.
    #[must_use]
    pub fn new() -> Self {
        Self::with_active(true)
    }

    fn with_active(active: bool) -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                id: ScopeId(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed)),
                active: Cell::new(active),
                effects: RefCell::new(Vec::new()),
                cleanups: RefCell::new(Vec::new()),
                children: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Create a scope that is disposed together with `self`.
    ///
    /// A child of an already disposed scope starts out disposed.
    #[must_use]
    pub fn child(&self) -> Self {
        if !self.is_active() {
            return Self::with_active(false);
        }
        let child = Self::new();
        let mut children = self.inner.children.borrow_mut();
        children.retain(EffectScope::is_active);
        children.push(child.clone());
        child
    }

    /// Number of live child scopes.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner
            .children
            .borrow()
            .iter()
            .filter(|child| child.is_active())
            .count()
    }

    /// The innermost scope currently running on this thread.
    #[must_use]
    pub fn current() -> Option<Self> {
        SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
    }

    #[must_use]
    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Number of tracked subscriptions that are still attached.
    #[must_use]
    pub fn effect_count(&self) -> usize {
        self.inner
            .effects
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|effect| !effect.is_stopped())
            .count()
    }

    /// Run `f` with this scope as the innermost running scope.
    ///
    /// # Errors
    ///
    /// Returns [`ReactiveError::ScopeDisposed`] without calling `f` if the
    /// scope has been disposed.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        if !self.is_active() {
            return Err(ReactiveError::ScopeDisposed { scope: self.id() });
        }
        let _guard = RunningScope::enter(self.clone());
        tracing::trace!(scope = %self.id(), "running effect scope");
        Ok(f())
    }

    /// Register a cleanup to run when this scope is disposed.
    ///
    /// If the scope is already disposed the cleanup runs immediately.
    pub fn on_dispose(&self, cleanup: impl FnOnce() + 'static) {
        if self.is_active() {
            self.inner.cleanups.borrow_mut().push(Box::new(cleanup));
        } else {
            cleanup();
        }
    }

    /// Stop every tracked subscription, dispose children, run cleanups.
    pub fn dispose(&self) {
        if !self.inner.active.replace(false) {
            return;
        }

        let children = std::mem::take(&mut *self.inner.children.borrow_mut());
        for child in &children {
            child.dispose();
        }

        let effects = std::mem::take(&mut *self.inner.effects.borrow_mut());
        let mut stopped = 0usize;
        for effect in effects.iter().filter_map(Weak::upgrade) {
            if !effect.is_stopped() {
                effect.stop();
                stopped += 1;
            }
        }

        let cleanups = std::mem::take(&mut *self.inner.cleanups.borrow_mut());
        let cleanup_count = cleanups.len();
        for cleanup in cleanups {
            cleanup();
        }

        tracing::debug!(
            scope = %self.id(),
            children = children.len(),
            effects = stopped,
            cleanups = cleanup_count,
            "effect scope disposed"
        );
    }

    fn track(&self, effect: Weak<dyn Stop>) {
        let mut effects = self.inner.effects.borrow_mut();
        if effects.len() >= EFFECT_PRUNE_THRESHOLD {
            effects.retain(|weak| weak.upgrade().is_some_and(|e| !e.is_stopped()));
        }
        effects.push(effect);
    }
}

/// Pops the running-scope stack on drop, so panics inside `run` unwind cleanly.
struct RunningScope;

impl RunningScope {
    fn enter(scope: EffectScope) -> Self {
        SCOPE_STACK.with(|stack| stack.borrow_mut().push(scope));
        Self
    }
}

impl Drop for RunningScope {
    fn drop(&mut self) {
        SCOPE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Record a subscription in the innermost running scope, if any.
pub(crate) fn track_effect(effect: Weak<dyn Stop>) {
    SCOPE_STACK.with(|stack| {
        if let Some(scope) = stack.borrow().last() {
            scope.track(effect);
        }
    });
}

/// Register a cleanup on the innermost running scope.
///
/// Returns `false` (and drops `cleanup` without running it) when no scope is
/// running.
pub fn on_scope_dispose(cleanup: impl FnOnce() + 'static) -> bool {
    match EffectScope::current() {
        Some(scope) => {
            scope.on_dispose(cleanup);
            true
        }
        None => {
            tracing::warn!("on_scope_dispose called with no running effect scope");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Computed, Observable};

    #[test]
    fn run_returns_closure_value() {
        let scope = EffectScope::new();
        assert_eq!(scope.run(|| 41 + 1), Ok(42));
    }

    #[test]
    fn run_on_disposed_scope_errors() {
        let scope = EffectScope::new();
        scope.dispose();
        assert_eq!(
            scope.run(|| ()),
            Err(ReactiveError::ScopeDisposed { scope: scope.id() })
        );
    }

    #[test]
    fn current_tracks_nesting() {
        assert!(EffectScope::current().is_none());
        let outer = EffectScope::new();
        let inner = EffectScope::new();
        outer
            .run(|| {
                assert_eq!(EffectScope::current().map(|s| s.id()), Some(outer.id()));
                inner
                    .run(|| {
                        assert_eq!(EffectScope::current().map(|s| s.id()), Some(inner.id()));
                    })
                    .unwrap();
                assert_eq!(EffectScope::current().map(|s| s.id()), Some(outer.id()));
            })
            .unwrap();
        assert!(EffectScope::current().is_none());
    }

    #[test]
    fn dispose_stops_subscriptions_created_inside() {
        let source = Observable::new(1);
        let scope = EffectScope::new();
        let sub = scope.run(|| source.subscribe(|_| {})).unwrap();
        assert_eq!(scope.effect_count(), 1);
        assert_eq!(source.subscriber_count(), 1);

        scope.dispose();
        assert!(!sub.is_active());
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn dispose_stops_computed_dependencies() {
        let source = Observable::new(2);
        let scope = EffectScope::new();
        let doubled = scope
            .run(|| Computed::from_observable(&source, |v| v * 2))
            .unwrap();
        assert_eq!(doubled.get(), 4);
        assert_eq!(source.subscriber_count(), 1);

        scope.dispose();
        assert_eq!(source.subscriber_count(), 0);
        source.set(10);
        assert!(!doubled.is_dirty());
    }

    #[test]
    fn subscriptions_outside_scope_survive() {
        let source = Observable::new(0);
        let scope = EffectScope::new();
        let _outside = source.subscribe(|_| {});
        scope.dispose();
        assert_eq!(source.subscriber_count(), 1);
    }

    #[test]
    fn cleanups_run_once_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let scope = EffectScope::new();
        let l1 = Rc::clone(&log);
        let l2 = Rc::clone(&log);
        scope
            .run(|| {
                assert!(on_scope_dispose(move || l1.borrow_mut().push(1)));
                assert!(on_scope_dispose(move || l2.borrow_mut().push(2)));
            })
            .unwrap();

        scope.dispose();
        scope.dispose();
        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn on_scope_dispose_without_scope_returns_false() {
        assert!(!on_scope_dispose(|| {}));
    }

    #[test]
    fn on_dispose_after_disposal_runs_immediately() {
        let scope = EffectScope::new();
        scope.dispose();
        let ran = Rc::new(Cell::new(false));
        let ran_clone = Rc::clone(&ran);
        scope.on_dispose(move || ran_clone.set(true));
        assert!(ran.get());
    }

    #[test]
    fn children_dispose_with_parent() {
        let parent = EffectScope::new();
        let child = parent.child();
        let source = Observable::new(0);
        let _sub = child.run(|| source.subscribe(|_| {})).unwrap();

        parent.dispose();
        assert!(!child.is_active());
        assert_eq!(source.subscriber_count(), 0);
        assert!(!parent.child().is_active());
    }

    #[test]
    fn disposed_children_are_pruned() {
        let parent = EffectScope::new();
        for _ in 0..10 {
            parent.child().dispose();
        }
        let live = parent.child();
        assert_eq!(parent.inner.children.borrow().len(), 1);
        assert_eq!(parent.child_count(), 1);

        live.dispose();
        assert_eq!(parent.child_count(), 0);
        assert!(parent.is_active());
    }

    #[test]
    fn detached_scope_outlives_outer_run() {
        let outer = EffectScope::new();
        let detached = EffectScope::new();
        outer.run(|| detached.run(|| ()).unwrap()).unwrap();
        outer.dispose();
        assert!(detached.is_active());
    }

    #[test]
    fn panic_inside_run_restores_stack() {
        let scope = EffectScope::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            scope.run(|| panic!("boom")).ok();
        }));
        assert!(result.is_err());
        assert!(EffectScope::current().is_none());
    }

    #[test]
    fn scope_ids_are_unique() {
        let a = EffectScope::new();
        let b = EffectScope::new();
        assert_ne!(a.id(), b.id());
        assert!(a.id().to_string().starts_with("scope#"));
    }
}
