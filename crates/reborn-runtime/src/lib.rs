#![forbid(unsafe_code)]

//! Runtime: application root, component lifecycle, context chain, and the
//! update tick for Reborn.
//!
//! This is a deliberately small host. It mounts a tree of [`Component`]s,
//! gives each one a child [`Context`] and its own
//! [`EffectScope`](reborn_reactive::EffectScope), runs lifecycle hooks, and
//! commits rendered output once per [`App::tick`].

pub mod app;
pub mod component;
pub mod config;
pub mod context;
pub mod error;
pub mod view;

pub use app::App;
pub use component::{Component, ComponentId, ComponentInstance, Lifecycle, SetupContext};
pub use config::AppConfig;
pub use context::{Context, ContextId};
pub use error::{BoxError, Result, RuntimeError};
pub use view::View;
