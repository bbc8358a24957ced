#![forbid(unsafe_code)]

//! Reborn public facade crate.
//!
//! Reactive primitives, a small component runtime, and shared models that
//! live exactly as long as some mounted component uses them.
//!
//! ```
//! use reborn::prelude::*;
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
//! let model = counter.clone();
//! app.mount(&Component::new("Counter", move |cx| {
//!     let c = use_model(cx, &model)?;
//!     Ok(View::text(move || format!("{} {}", c.a.get(), c.b.get())))
//! }))
//! .unwrap();
//! assert_eq!(app.html(), "1 2");
//! ```

pub use reborn_reactive as reactive;
pub use reborn_runtime as runtime;

#[cfg(feature = "model")]
pub use reborn_model as model;

pub use reborn_reactive::{
    Computed, EffectScope, Observable, ReactiveError, Scheduler, SchedulerConfig, Subscription,
    on_scope_dispose,
};
pub use reborn_runtime::{
    App, AppConfig, BoxError, Component, Context, RuntimeError, SetupContext, View,
};

#[cfg(feature = "model")]
pub use reborn_model::{
    AppStoreExt, Model, ModelContextExt, ModelError, ModelHandle, ModelId, ReleaseOutcome, Store,
    StoreConfig, create_model, create_store, store_of, use_model,
};

pub mod prelude {
    pub use reborn_reactive::{Computed, EffectScope, Observable, on_scope_dispose};
    pub use reborn_runtime::{App, BoxError, Component, SetupContext, View};

    #[cfg(feature = "model")]
    pub use reborn_model::{
        AppStoreExt, Model, ModelContextExt, Store, create_model, create_store, store_of,
        use_model,
    };
}
