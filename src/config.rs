//! Pool configuration options

use crate::errors::{BoxError, PoolError, PoolResult};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Creates a new resource
pub type Factory<R> = Arc<dyn Fn() -> Result<R, BoxError> + Send + Sync>;

/// Releases the system handle behind a resource
pub type Closer<R> = Arc<dyn Fn(R) -> Result<(), BoxError> + Send + Sync>;

/// Checks whether an existing resource is still usable
pub type Validator<R> = Arc<dyn Fn(&R) -> Result<(), BoxError> + Send + Sync>;

/// How `get` treats resources sitting in the idle set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReuseStrategy {
    /// Hand out an idle resource when one exists, create otherwise
    #[default]
    CachedOrNew,

    /// Always create a fresh resource, ignoring the idle set
    AlwaysNew,
}

/// Configuration for resource pool behavior
///
/// # Examples
///
/// ```
/// use esox_resourcepool::PoolConfig;
/// use std::time::Duration;
///
/// let config = PoolConfig::<u32>::new()
///     .with_initial_size(1)
///     .with_max_open(4)
///     .with_max_idle(2)
///     .with_idle_timeout(Duration::from_secs(30))
///     .with_factory(|| Ok::<_, std::io::Error>(7))
///     .with_closer(|_| Ok::<_, std::io::Error>(()));
///
/// assert_eq!(config.max_open, 4);
/// assert_eq!(config.max_idle, Some(2));
/// assert!(config.validate().is_ok());
/// ```
pub struct PoolConfig<R> {
    /// Number of resources created up front by `Pool::new`
    pub initial_size: usize,

    /// Maximum number of open resources, 0 means unbounded
    pub max_open: usize,

    /// Maximum number of idle resources kept for reuse
    pub max_idle: Option<usize>,

    /// Idle resources older than this are closed instead of handed out
    pub idle_timeout: Option<Duration>,

    /// Whether idle resources are reused at all
    pub reuse_strategy: ReuseStrategy,

    pub factory: Option<Factory<R>>,

    pub closer: Option<Closer<R>>,

    pub validator: Option<Validator<R>>,
}

impl<R> Default for PoolConfig<R> {
    fn default() -> Self {
        Self {
            initial_size: 0,
            max_open: 0,
            max_idle: None,
            idle_timeout: None,
            reuse_strategy: ReuseStrategy::CachedOrNew,
            factory: None,
            closer: None,
            validator: None,
        }
    }
}

impl<R> Clone for PoolConfig<R> {
    fn clone(&self) -> Self {
        Self {
            initial_size: self.initial_size,
            max_open: self.max_open,
            max_idle: self.max_idle,
            idle_timeout: self.idle_timeout,
            reuse_strategy: self.reuse_strategy,
            factory: self.factory.clone(),
            closer: self.closer.clone(),
            validator: self.validator.clone(),
        }
    }
}

impl<R> fmt::Debug for PoolConfig<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("initial_size", &self.initial_size)
            .field("max_open", &self.max_open)
            .field("max_idle", &self.max_idle)
            .field("idle_timeout", &self.idle_timeout)
            .field("reuse_strategy", &self.reuse_strategy)
            .field("factory", &self.factory.is_some())
            .field("closer", &self.closer.is_some())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl<R> PoolConfig<R> {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of resources created when the pool is built
    pub fn with_initial_size(mut self, size: usize) -> Self {
        self.initial_size = size;
        self
    }

    /// Set the maximum number of open resources (0 = unbounded)
    pub fn with_max_open(mut self, max: usize) -> Self {
        self.max_open = max;
        self
    }

    /// Set the maximum number of idle resources
    pub fn with_max_idle(mut self, max: usize) -> Self {
        self.max_idle = Some(max);
        self
    }

    /// Set the idle timeout. A zero duration disables eviction.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn with_reuse_strategy(mut self, strategy: ReuseStrategy) -> Self {
        self.reuse_strategy = strategy;
        self
    }

    /// Set the function that creates resources
    pub fn with_factory<F, E>(mut self, factory: F) -> Self
    where
        R: 'static,
        F: Fn() -> Result<R, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.factory = Some(Arc::new(move || -> Result<R, BoxError> {
            factory().map_err(Into::into)
        }));
        self
    }

    /// Set the function that closes resources
    pub fn with_closer<F, E>(mut self, closer: F) -> Self
    where
        R: 'static,
        F: Fn(R) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.closer = Some(Arc::new(move |resource: R| -> Result<(), BoxError> {
            closer(resource).map_err(Into::into)
        }));
        self
    }

    /// Set the liveness check used by `Pool::validate`
    pub fn with_validator<F, E>(mut self, validator: F) -> Self
    where
        R: 'static,
        F: Fn(&R) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.validator = Some(Arc::new(move |resource: &R| -> Result<(), BoxError> {
            validator(resource).map_err(Into::into)
        }));
        self
    }

    /// Upper bound on the idle set once `max_open` is taken into account
    pub fn effective_max_idle(&self) -> usize {
        match (self.max_idle, self.max_open) {
            (Some(idle), _) => idle,
            (None, 0) => usize::MAX,
            (None, open) => open,
        }
    }

    /// Check capacities and mandatory callbacks
    pub fn validate(&self) -> PoolResult<()> {
        if self.factory.is_none() {
            return Err(PoolError::InvalidConfig("factory is required"));
        }
        if self.closer.is_none() {
            return Err(PoolError::InvalidConfig("closer is required"));
        }
        if self.max_open > 0 {
            if self.initial_size > self.max_open {
                return Err(PoolError::InvalidConfig("initial_size exceeds max_open"));
            }
            if let Some(idle) = self.max_idle
                && idle > self.max_open
            {
                return Err(PoolError::InvalidConfig("max_idle exceeds max_open"));
            }
        }
        if self.initial_size > self.effective_max_idle() {
            return Err(PoolError::InvalidConfig("initial_size exceeds max_idle"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callbacks() -> PoolConfig<u8> {
        PoolConfig::new()
            .with_factory(|| Ok::<_, BoxError>(1))
            .with_closer(|_| Ok::<_, BoxError>(()))
    }

    #[test]
    fn test_missing_callbacks_rejected() {
        let config = PoolConfig::<u8>::new().with_closer(|_| Ok::<_, BoxError>(()));
        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfig("factory is required"))
        ));

        let config = PoolConfig::<u8>::new().with_factory(|| Ok::<_, BoxError>(1));
        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfig("closer is required"))
        ));
    }

    #[test]
    fn test_capacity_rules() {
        assert!(callbacks().with_initial_size(3).with_max_open(2).validate().is_err());
        assert!(callbacks().with_max_open(2).with_max_idle(3).validate().is_err());
        assert!(callbacks().with_initial_size(2).with_max_idle(1).validate().is_err());
        assert!(callbacks().with_initial_size(2).with_max_open(2).validate().is_ok());
        // unbounded pools accept any warm-up size
        assert!(callbacks().with_initial_size(10).validate().is_ok());
    }

    #[test]
    fn test_effective_max_idle() {
        assert_eq!(callbacks().effective_max_idle(), usize::MAX);
        assert_eq!(callbacks().with_max_open(5).effective_max_idle(), 5);
        assert_eq!(callbacks().with_max_open(5).with_max_idle(1).effective_max_idle(), 1);
    }

    #[test]
    fn test_zero_idle_timeout_disables_eviction() {
        let config = callbacks().with_idle_timeout(Duration::ZERO);
        assert_eq!(config.idle_timeout, None);
    }
}
