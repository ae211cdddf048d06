//! Idle-set entries and idle-timeout eviction

use std::time::{Duration, Instant};

/// A resource parked in the idle set.
///
/// Being in the idle set *is* the idle state: once a resource is checked out
/// the caller owns it and the pool holds no entry for it.
#[derive(Debug)]
pub(crate) struct IdleResource<R> {
    resource: R,
    returned_at: Instant,
}

impl<R> IdleResource<R> {
    /// Park a resource, stamping the time it was returned
    pub fn new(resource: R) -> Self {
        Self {
            resource,
            returned_at: Instant::now(),
        }
    }

    pub fn idle_for(&self) -> Duration {
        self.returned_at.elapsed()
    }

    /// Whether the resource has been idle for longer than `timeout`
    pub fn is_expired(&self, timeout: Option<Duration>) -> bool {
        match timeout {
            Some(timeout) => self.idle_for() > timeout,
            None => false,
        }
    }

    pub fn into_inner(self) -> R {
        self.resource
    }

    #[cfg(test)]
    pub fn backdate(&mut self, by: Duration) {
        if let Some(earlier) = self.returned_at.checked_sub(by) {
            self.returned_at = earlier;
        }
    }
}
