use thiserror::Error;

use crate::scope::ScopeId;

pub type Result<T> = std::result::Result<T, ReactiveError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReactiveError {
    #[error("effect scope {scope} has already been disposed")]
    ScopeDisposed { scope: ScopeId },

    #[error("scheduler flush exceeded {rounds} rounds with {pending} jobs still pending")]
    FlushOverflow { rounds: usize, pending: usize },
}
