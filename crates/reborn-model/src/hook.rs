//! The component-facing hook.
//!
//! [`use_model`] resolves the nearest [`Store`] through the component's
//! context chain, acquires the model, and parks the resulting
//! [`ModelHandle`] in the component's local state. The handle is dropped
//! when the component instance is destroyed, which releases the reference
//! exactly once whether the component unmounted normally, its setup returned
//! an error, or its setup panicked.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use reborn_runtime::SetupContext;

use crate::error::{ModelError, Result};
use crate::handle::ModelHandle;
use crate::model::{Model, ModelId};
use crate::store::Store;

/// Handles held by one component instance, keyed by model.
#[derive(Default)]
struct HeldModels {
    handles: RefCell<AHashMap<ModelId, Box<dyn Any>>>,
}

impl HeldModels {
    fn get<T: 'static>(&self, model: ModelId) -> Option<Rc<T>> {
        let handles = self.handles.borrow();
        let handle = handles.get(&model)?.downcast_ref::<ModelHandle<T>>()?;
        Some(Rc::clone(handle.instance()))
    }
}

/// Use the shared instance of `model` from within a component's setup.
///
/// The first call in a component acquires one reference; later calls for the
/// same model in the same component return the same instance without taking
/// another.
///
/// # Errors
///
/// [`ModelError::NoStore`] if no store was installed above this component,
/// otherwise whatever [`Store::acquire`] reports.
pub fn use_model<T: 'static>(cx: &SetupContext<'_>, model: &Model<T>) -> Result<Rc<T>> {
    let held = cx.state::<HeldModels>();
    if let Some(instance) = held.get::<T>(model.id()) {
        return Ok(instance);
    }

    let store: Store = cx.inject().ok_or_else(|| ModelError::NoStore {
        model: model.label(),
        component: cx.name().to_string(),
    })?;
    let handle = store.acquire_handle(model)?;
    let instance = Rc::clone(handle.instance());
    held.handles
        .borrow_mut()
        .insert(model.id(), Box::new(handle) as Box<dyn Any>);
    tracing::trace!(component = cx.name(), id = %cx.id(), model = %model.label(), "model in use");
    Ok(instance)
}

/// Method-call form of [`use_model`].
pub trait ModelContextExt {
    /// See [`use_model`].
    ///
    /// # Errors
    ///
    /// Same as [`use_model`].
    fn use_model<T: 'static>(&self, model: &Model<T>) -> Result<Rc<T>>;
}

impl ModelContextExt for SetupContext<'_> {
    fn use_model<T: 'static>(&self, model: &Model<T>) -> Result<Rc<T>> {
        use_model(self, model)
    }
}
