//! RAII reference to a store entry.

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use reborn_reactive::ScopeId;

use crate::model::ModelId;
use crate::store::{ReleaseOutcome, Store};

/// One counted reference to a model instance.
///
/// Dropping the handle releases the reference; the instance is disposed when
/// the last handle for it goes away. A handle only ever releases the entry it
/// acquired, identified by that entry's scope.
#[must_use = "dropping a ModelHandle releases the model immediately"]
pub struct ModelHandle<T> {
    store: Store,
    model: ModelId,
    generation: ScopeId,
    instance: Rc<T>,
    released: bool,
}

impl<T> ModelHandle<T> {
    pub(crate) fn new(store: Store, model: ModelId, generation: ScopeId, instance: Rc<T>) -> Self {
        Self {
            store,
            model,
            generation,
            instance,
            released: false,
        }
    }

    /// The shared instance. Holding this `Rc` does not hold a reference count.
    #[must_use]
    pub fn instance(&self) -> &Rc<T> {
        &self.instance
    }

    #[must_use]
    pub fn model(&self) -> ModelId {
        self.model
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Release now and report what happened.
    pub fn release(mut self) -> ReleaseOutcome {
        self.released = true;
        self.store.release_generation(self.model, self.generation)
    }
}

impl<T> Deref for ModelHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.instance
    }
}

impl<T> Drop for ModelHandle<T> {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            self.store.release_generation(self.model, self.generation);
        }
    }
}

impl<T> fmt::Debug for ModelHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model", &self.model)
            .field("generation", &self.generation)
            .field("store", &self.store.label())
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}
