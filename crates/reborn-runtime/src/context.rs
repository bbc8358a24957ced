//! Context chain for dependency injection down the component tree.
//!
//! Every [`App`](crate::App) owns a root [`Context`]; every mounted component
//! gets a child of its parent's context. Values are provided by type at any
//! level and injected by walking from the current context up to the root, so
//! a descendant finds the nearest provider without anything being passed
//! explicitly through intermediate components.
//!
//! # Design
//!
//! `Context` is cheaply cloneable (`Rc` inside). Lookups are live: a value
//! provided (or replaced) on an ancestor after a child was created is seen by
//! the child's next `inject`.
//!
//! # Example
//!
//! ```
//! use reborn_runtime::Context;
//!
//! let root = Context::root();
//! root.provide(String::from("theme: dark"));
//!
//! let child = root.child().child();
//! assert_eq!(child.inject::<String>().as_deref(), Some("theme: dark"));
//! assert_eq!(child.depth(), 2);
//! ```

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;

// ─── Context ID generation ───────────────────────────────────────────────────

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_context_id() -> ContextId {
    ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Process-unique identifier of a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

// ─── Inner shared state ──────────────────────────────────────────────────────

struct ContextInner {
    id: ContextId,
    depth: usize,
    values: RefCell<AHashMap<TypeId, Rc<dyn Any>>>,
    parent: Option<Context>,
}

// ─── Context ─────────────────────────────────────────────────────────────────

/// A node in the context chain.
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("depth", &self.inner.depth)
            .field("values", &self.inner.values.borrow().len())
            .field("parent", &self.inner.parent.as_ref().map(Context::id))
            .finish()
    }
}

impl Context {
    /// Create a root context with no parent.
    #[must_use]
    pub fn root() -> Self {
        Self::new_inner(None)
    }

    /// Derive a child context.
    #[must_use]
    pub fn child(&self) -> Self {
        Self::new_inner(Some(self.clone()))
    }

    fn new_inner(parent: Option<Context>) -> Self {
        let depth = parent.as_ref().map_or(0, |p| p.inner.depth + 1);
        Self {
            inner: Rc::new(ContextInner {
                id: next_context_id(),
                depth,
                values: RefCell::new(AHashMap::new()),
                parent,
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    /// Number of ancestors; 0 for a root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Context> {
        self.inner.parent.as_ref()
    }

    /// Provide `value` on this context, replacing any value of the same type.
    ///
    /// Returns the replaced value.
    pub fn provide<T: Clone + 'static>(&self, value: T) -> Option<T> {
        self.inner
            .values
            .borrow_mut()
            .insert(TypeId::of::<T>(), Rc::new(value))
            .and_then(|previous| previous.downcast_ref::<T>().cloned())
    }

    /// Remove a value provided on this context (ancestors are untouched).
    pub fn withdraw<T: Clone + 'static>(&self) -> Option<T> {
        self.inner
            .values
            .borrow_mut()
            .remove(&TypeId::of::<T>())
            .and_then(|previous| previous.downcast_ref::<T>().cloned())
    }

    /// Find the nearest value of type `T`, starting here and walking up.
    #[must_use]
    pub fn inject<T: Clone + 'static>(&self) -> Option<T> {
        self.ancestors().find_map(|cx| {
            cx.inner
                .values
                .borrow()
                .get(&TypeId::of::<T>())
                .and_then(|value| value.downcast_ref::<T>().cloned())
        })
    }

    /// Whether any context on the chain provides a `T`.
    #[must_use]
    pub fn has<T: Clone + 'static>(&self) -> bool {
        let key = TypeId::of::<T>();
        self.ancestors()
            .any(|cx| cx.inner.values.borrow().contains_key(&key))
    }

    /// Iterate from this context up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = &Context> {
        std::iter::successors(Some(self), |cx| cx.parent())
    }
}
