use reborn_reactive::ReactiveError;
use thiserror::Error;

/// Error type returned by component setup functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("setup of component `{component}` failed: {source}")]
    Setup {
        component: String,
        #[source]
        source: BoxError,
    },

    #[error("application `{label}` is already mounted")]
    AlreadyMounted { label: String },

    #[error("application `{label}` is not mounted")]
    NotMounted { label: String },

    #[error(transparent)]
    Reactive(#[from] ReactiveError),
}

impl RuntimeError {
    /// The setup error of a failed component, if this is one, downcast to `E`.
    #[must_use]
    pub fn setup_source<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Setup { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}
