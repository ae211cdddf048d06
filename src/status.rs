//! Point-in-time view of pool bookkeeping

/// Snapshot of the pool's counters, taken under the pool lock
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{Pool, PoolConfig};
///
/// let pool = Pool::new(
///     PoolConfig::new()
///         .with_initial_size(2)
///         .with_max_open(4)
///         .with_factory(|| Ok::<_, std::io::Error>(0u8))
///         .with_closer(|_| Ok::<_, std::io::Error>(())),
/// )
/// .unwrap();
///
/// let status = pool.status();
/// assert_eq!(status.num_open, 2);
/// assert_eq!(status.idle, 2);
/// assert!(!status.is_saturated());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PoolStatus {
    /// Resources that exist or are being created
    pub num_open: usize,

    /// Resources sitting in the idle set
    pub idle: usize,

    /// Callers blocked in `get`
    pub waiting: usize,

    /// Configured maximum, 0 when unbounded
    pub max_open: usize,

    /// Effective idle-set bound
    pub max_idle: usize,

    /// Whether `shutdown` has been called
    pub closed: bool,
}

impl PoolStatus {
    /// Resources currently checked out or being created
    pub fn in_use(&self) -> usize {
        self.num_open.saturating_sub(self.idle)
    }

    /// Fraction of `max_open` in use (0.0 to 1.0), 0.0 when unbounded
    pub fn utilization(&self) -> f64 {
        if self.max_open > 0 {
            self.in_use() as f64 / self.max_open as f64
        } else {
            0.0
        }
    }

    /// A bounded pool with nothing idle and no room to create more
    pub fn is_saturated(&self) -> bool {
        self.max_open > 0 && self.idle == 0 && self.num_open >= self.max_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(num_open: usize, idle: usize, max_open: usize) -> PoolStatus {
        PoolStatus {
            num_open,
            idle,
            waiting: 0,
            max_open,
            max_idle: max_open,
            closed: false,
        }
    }

    #[test]
    fn test_utilization() {
        assert_eq!(status(4, 1, 4).in_use(), 3);
        assert!((status(4, 1, 4).utilization() - 0.75).abs() < f64::EPSILON);
        assert_eq!(status(10, 0, 0).utilization(), 0.0);
    }

    #[test]
    fn test_saturation() {
        assert!(status(2, 0, 2).is_saturated());
        assert!(!status(2, 1, 2).is_saturated());
        assert!(!status(50, 0, 0).is_saturated());
    }
}
