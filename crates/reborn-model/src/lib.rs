#![forbid(unsafe_code)]

//! Shared reactive models for Reborn component trees.
//!
//! A [`Model<T>`] is a definition: a factory that builds some reactive state
//! (observables, computed values, cleanups) plus an identity token. A
//! [`Store`] installed on an [`App`](reborn_runtime::App) keeps at most one
//! live instance per model. Components obtain it with [`use_model`]; the
//! first user creates the instance inside its own
//! [`EffectScope`](reborn_reactive::EffectScope), later users share it, and
//! the last one to unmount disposes it.
//!
//! # Example
//!
//! ```
//! use reborn_model::{ModelContextExt, create_model, create_store, store_of};
//! use reborn_reactive::{Computed, Observable};
//! use reborn_runtime::{App, Component, View};
//!
//! struct Counter {
//!     a: Observable<i64>,
//!     b: Computed<i64>,
//! }
//!
//! let counter = create_model(|| {
//!     let a = Observable::new(1);
//!     let b = Computed::from_observable(&a, |v| v * 2);
//!     Counter { a, b }
//! });
//!
//! let app = App::new();
//! create_store().install(&app);
//!
//! let model = counter.clone();
//! app.mount(&Component::new("Counter", move |cx| {
//!     let c = cx.use_model(&model)?;
//!     Ok(View::text(move || format!("a: {} b: {}", c.a.get(), c.b.get())))
//! }))
//! .unwrap();
//! assert_eq!(app.html(), "a: 1 b: 2");
//!
//! let store = store_of(&app).unwrap();
//! store.lookup(&counter).unwrap().a.set(3);
//! app.tick().unwrap();
//! assert_eq!(app.html(), "a: 3 b: 6");
//!
//! app.unmount().unwrap();
//! assert!(store.lookup(&counter).is_none());
//! ```

pub mod error;
pub mod handle;
pub mod hook;
pub mod install;
pub mod model;
pub mod store;

pub use error::{ModelError, Result};
pub use handle::ModelHandle;
pub use hook::{ModelContextExt, use_model};
pub use install::{AppStoreExt, create_store, store_of};
pub use model::{Model, ModelId, create_model};
pub use store::{EntrySnapshot, ReleaseOutcome, Store, StoreConfig, StoreStats};
