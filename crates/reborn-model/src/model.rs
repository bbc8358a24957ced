#![forbid(unsafe_code)]

//! Model definitions.
//!
//! A [`Model<T>`] pairs a factory with an opaque [`ModelId`]. The id is
//! minted when the definition is created and is the only thing a
//! [`Store`](crate::Store) keys on: two definitions with identical factories
//! are still two different models, and clones of one definition are the same
//! model.
//!
//! Definitions are `Send + Sync` so they can live in statics; the instances
//! they produce are single-threaded.
//!
//! # Example
//!
//! ```
//! use std::sync::LazyLock;
//! use reborn_model::{Model, create_model};
//! use reborn_reactive::{Computed, Observable};
//!
//! struct Counter {
//!     count: Observable<i64>,
//!     doubled: Computed<i64>,
//! }
//!
//! static COUNTER: LazyLock<Model<Counter>> = LazyLock::new(|| {
//!     create_model(|| {
//!         let count = Observable::new(1);
//!         let doubled = Computed::from_observable(&count, |v| v * 2);
//!         Counter { count, doubled }
//!     })
//!     .named("counter")
//! });
//!
//! assert_eq!(COUNTER.name(), Some("counter"));
//! assert_eq!(COUNTER.id(), COUNTER.clone().id());
//! ```

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use reborn_runtime::BoxError;

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a model definition.
///
/// There is no public constructor: ids only come from [`Model::id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(u64);

impl ModelId {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model#{}", self.0)
    }
}

type Factory<T> = dyn Fn() -> Result<T, BoxError> + Send + Sync;

struct ModelInner<T> {
    id: ModelId,
    name: OnceLock<Cow<'static, str>>,
    factory: Box<Factory<T>>,
}

/// A model definition: a factory plus an identity token.
pub struct Model<T> {
    inner: Arc<ModelInner<T>>,
}

impl<T> Clone for Model<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Model<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl<T> Eq for Model<T> {}

impl<T> Hash for Model<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl<T> fmt::Debug for Model<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.inner.id)
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

impl<T> Model<T> {
    /// Define a model from an infallible factory.
    pub fn new(factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::try_new(move || Ok(factory()))
    }

    /// Define a model whose factory can fail.
    pub fn try_new(factory: impl Fn() -> Result<T, BoxError> + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(ModelInner {
                id: ModelId(NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed)),
                name: OnceLock::new(),
                factory: Box::new(factory),
            }),
        }
    }

    /// Attach a diagnostic name. Only the first name given sticks.
    #[must_use]
    pub fn named(self, name: impl Into<Cow<'static, str>>) -> Self {
        let _ = self.inner.name.set(name.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> ModelId {
        self.inner.id
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.inner.name.get().map(|name| name.as_ref())
    }

    /// Name if set, otherwise the id; used in logs and errors.
    #[must_use]
    pub fn label(&self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => self.inner.id.to_string(),
        }
    }

    pub(crate) fn build(&self) -> Result<T, BoxError> {
        (self.inner.factory)()
    }
}

/// Define a model from an infallible factory.
pub fn create_model<T>(factory: impl Fn() -> T + Send + Sync + 'static) -> Model<T> {
    Model::new(factory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn each_definition_is_distinct() {
        let a = create_model(|| 1u8);
        let b = create_model(|| 1u8);
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
    }

    #[test]
    fn clones_share_identity() {
        let a = create_model(|| ());
        let b = a.clone();
        assert_eq!(a, b);
        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn factory_runs_only_on_build() {
        let model = Model::new(|| vec![1, 2, 3]);
        assert_eq!(model.build().unwrap(), vec![1, 2, 3]);
        assert_eq!(model.build().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn fallible_factory_reports_error() {
        let model: Model<u32> = Model::try_new(|| Err("no backend".into()));
        let err = model.build().unwrap_err();
        assert_eq!(err.to_string(), "no backend");
    }

    #[test]
    fn label_falls_back_to_id() {
        let anonymous = create_model(|| 0);
        assert_eq!(anonymous.label(), anonymous.id().to_string());

        let named = create_model(|| 0).named("counter").named("ignored");
        assert_eq!(named.name(), Some("counter"));
        assert_eq!(named.label(), "counter");
    }

    #[test]
    fn definitions_are_send_and_sync() {
        fn assert_send_sync<S: Send + Sync>() {}
        assert_send_sync::<Model<std::rc::Rc<u8>>>();
    }
}
