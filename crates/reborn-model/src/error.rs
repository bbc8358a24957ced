use reborn_reactive::ReactiveError;
use reborn_runtime::BoxError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no store is installed above component `{component}` to provide model `{model}`")]
    NoStore { model: String, component: String },

    #[error("factory for model `{model}` failed: {source}")]
    Factory {
        model: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Reactive(#[from] ReactiveError),
}
