#![forbid(unsafe_code)]

//! Reactive primitives for Reborn.
//!
//! - [`Observable`]: a shared, version-tracked value with change
//!   notification via subscriber callbacks.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`Computed`]: a lazily-evaluated, memoized value derived from one or
//!   more `Observable` dependencies.
//! - [`EffectScope`]: groups every subscription and cleanup created while it
//!   runs so they can be torn down together.
//! - [`Scheduler`]: the deferred job queue that backs "next tick".
//!
//! # Architecture
//!
//! Everything here is single-threaded: shared state lives in
//! `Rc<RefCell<..>>`. Observables hold their subscribers weakly; the strong
//! reference lives in the [`Subscription`] returned to the caller. An active
//! [`EffectScope`] additionally records a weak stop handle for every
//! subscription created inside it, so disposing the scope severs those
//! subscriptions even while their guards are still alive (for example inside
//! a `Computed` stored on a model instance).
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Subscribers are notified in registration order.
//! 3. Setting a value equal to the current value is a no-op.
//! 4. A stopped subscription is never invoked again.
//! 5. `Computed::get()` never returns a stale value while its subscriptions
//!    are live.

pub mod computed;
pub mod error;
pub mod observable;
pub mod scheduler;
pub mod scope;

pub use computed::Computed;
pub use error::{ReactiveError, Result};
pub use observable::{Observable, Subscription};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use scope::{EffectScope, ScopeId, on_scope_dispose};
