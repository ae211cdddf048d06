//! Error types for the resource pool

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by the caller-supplied callbacks
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Shared form of a callback error, so `PoolError` stays `Clone`
pub type SharedError = Arc<dyn StdError + Send + Sync>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("Factory failed to create a resource: {0}")]
    Factory(#[source] SharedError),

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Pool is closed - resource was closed instead of pooled")]
    ClosedDiscarded,

    #[error("Open resources ({open}) exceed the maximum ({max})")]
    OverCapacity { open: usize, max: usize },

    #[error("No validator configured")]
    ValidatorUnset,

    #[error("Resource validation failed: {0}")]
    Validation(#[source] SharedError),

    #[error("Failed to close {} resource(s)", .0.len())]
    Close(Vec<SharedError>),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl PoolError {
    pub(crate) fn factory(err: BoxError) -> Self {
        PoolError::Factory(Arc::from(err))
    }

    pub(crate) fn validation(err: BoxError) -> Self {
        PoolError::Validation(Arc::from(err))
    }

    /// Collapse a list of closer failures into a result
    pub(crate) fn from_close_errors(errors: Vec<BoxError>) -> PoolResult<()> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PoolError::Close(errors.into_iter().map(Arc::from).collect()))
        }
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
