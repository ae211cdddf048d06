//! Core resource pool implementation

use crate::config::{Closer, Factory, PoolConfig, ReuseStrategy, Validator};
use crate::errors::{BoxError, PoolError, PoolResult};
use crate::eviction::IdleResource;
use crate::status::PoolStatus;
use crate::wait::{async_slot, blocking_slot, Delivery, WaitSlot};

use crossbeam::channel::RecvTimeoutError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, trace, warn};

/// Bookkeeping guarded by the pool lock
struct State<R> {
    /// Oldest first
    idle: VecDeque<IdleResource<R>>,
    /// Oldest first
    waiters: VecDeque<WaitSlot<R>>,
    /// Resources that exist or are being created
    num_open: usize,
    closed: bool,
    next_waiter_id: u64,
}

impl<R> State<R> {
    /// Offer a delivery to the longest-waiting caller. Returns it again if
    /// nobody is queued.
    fn offer(&mut self, mut delivery: Delivery<R>) -> Option<Delivery<R>> {
        while let Some(slot) = self.waiters.pop_front() {
            let waiter = slot.id();
            match slot.fulfill(delivery) {
                Ok(()) => {
                    trace!(waiter, "delivered to waiter");
                    return None;
                }
                Err(back) => delivery = back,
            }
        }
        Some(delivery)
    }

    /// Hand a returned resource to a waiter or park it in the idle set.
    /// Returns the resource if the idle set is full; the caller closes it
    /// outside the lock.
    fn restore(&mut self, resource: R, max_idle: usize) -> Option<R> {
        match self.offer(Delivery::Resource(resource)) {
            Some(Delivery::Resource(resource)) if self.idle.len() < max_idle => {
                self.idle.push_back(IdleResource::new(resource));
                None
            }
            Some(Delivery::Resource(resource)) => {
                self.forget_one();
                Some(resource)
            }
            Some(Delivery::Permit) | None => None,
        }
    }

    /// Give up one slot of `num_open`, passing it to a waiter if there is one
    fn release_slot(&mut self) {
        if self.offer(Delivery::Permit).is_some() {
            self.forget_one();
        }
    }

    fn forget_one(&mut self) {
        self.num_open = self.num_open.saturating_sub(1);
    }

    /// Remove a waiter's slot if it has not been fulfilled yet
    fn withdraw(&mut self, id: u64) -> bool {
        match self.waiters.iter().position(|slot| slot.id() == id) {
            Some(pos) => {
                self.waiters.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// Outcome of the locked part of an acquire
enum Acquire<R> {
    Ready(R),
    /// A slot in `num_open` is reserved; call the factory
    Create,
    Full,
}

enum Step<R, W> {
    Ready(R),
    Create,
    Wait(u64, W),
}

struct Shared<R> {
    state: Mutex<State<R>>,
    factory: Factory<R>,
    closer: Closer<R>,
    validator: Option<Validator<R>>,
    max_open: usize,
    max_idle: usize,
    idle_timeout: Option<Duration>,
    reuse_strategy: ReuseStrategy,
}

/// Bounded pool of expensive, reusable resources
///
/// Cloning a `Pool` is cheap and yields another handle to the same pool.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{Pool, PoolConfig};
///
/// let pool = Pool::new(
///     PoolConfig::new()
///         .with_initial_size(1)
///         .with_max_open(2)
///         .with_factory(|| Ok::<_, std::io::Error>(String::from("conn")))
///         .with_closer(|_| Ok::<_, std::io::Error>(())),
/// )
/// .unwrap();
///
/// let conn = pool.get().unwrap();
/// assert_eq!(conn, "conn");
/// pool.put(conn).unwrap();
///
/// pool.shutdown().unwrap();
/// assert!(pool.get().is_err());
/// ```
pub struct Pool<R> {
    shared: Arc<Shared<R>>,
}

impl<R> Clone for Pool<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R> fmt::Debug for Pool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Pool")
            .field("num_open", &state.num_open)
            .field("idle", &state.idle.len())
            .field("waiting", &state.waiters.len())
            .field("closed", &state.closed)
            .field("max_open", &self.shared.max_open)
            .field("max_idle", &self.shared.max_idle)
            .finish()
    }
}

impl<R: Send + 'static> Pool<R> {
    /// Create a pool, pre-warming `initial_size` resources.
    ///
    /// Construction is all-or-nothing: if the factory fails, every resource
    /// created so far is closed and the factory error is returned.
    pub fn new(config: PoolConfig<R>) -> PoolResult<Self> {
        config.validate()?;
        let max_idle = config.effective_max_idle();
        let PoolConfig {
            initial_size,
            max_open,
            idle_timeout,
            reuse_strategy,
            factory,
            closer,
            validator,
            ..
        } = config;
        // a zero timeout disables eviction, however it was set
        let idle_timeout = idle_timeout.filter(|timeout| !timeout.is_zero());
        let factory = factory.ok_or(PoolError::InvalidConfig("factory is required"))?;
        let closer = closer.ok_or(PoolError::InvalidConfig("closer is required"))?;

        let mut idle = VecDeque::with_capacity(initial_size);
        for _ in 0..initial_size {
            match factory() {
                Ok(resource) => idle.push_back(IdleResource::new(resource)),
                Err(err) => {
                    warn!(created = idle.len(), error = %err, "pool warm-up failed");
                    for entry in idle {
                        if let Err(close_err) = closer(entry.into_inner()) {
                            warn!(error = %close_err, "failed to close warm-up resource");
                        }
                    }
                    return Err(PoolError::factory(err));
                }
            }
        }
        debug!(initial_size, max_open, max_idle, "pool created");

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    idle,
                    waiters: VecDeque::new(),
                    num_open: initial_size,
                    closed: false,
                    next_waiter_id: 0,
                }),
                factory,
                closer,
                validator,
                max_open,
                max_idle,
                idle_timeout,
                reuse_strategy,
            }),
        })
    }

    /// Get a resource, blocking the calling thread while the pool is at capacity.
    ///
    /// Blocked callers are served in arrival order. Fails with
    /// [`PoolError::PoolClosed`] once shutdown has begun.
    ///
    /// Idle resources past the idle timeout are closed on the way. A closer
    /// failure there is logged at `warn` level and is not returned; the
    /// caller still gets its resource.
    pub fn get(&self) -> PoolResult<R> {
        match self.begin(blocking_slot)? {
            Step::Ready(resource) => Ok(resource),
            Step::Create => self.create(),
            Step::Wait(_, rx) => match rx.recv() {
                Ok(delivery) => self.accept(delivery),
                Err(_) => Err(PoolError::PoolClosed),
            },
        }
    }

    /// Like [`Pool::get`], but gives up after `timeout`
    pub fn get_timeout(&self, timeout: Duration) -> PoolResult<R> {
        match self.begin(blocking_slot)? {
            Step::Ready(resource) => Ok(resource),
            Step::Create => self.create(),
            Step::Wait(id, rx) => match rx.recv_timeout(timeout) {
                Ok(delivery) => self.accept(delivery),
                Err(RecvTimeoutError::Disconnected) => Err(PoolError::PoolClosed),
                Err(RecvTimeoutError::Timeout) => {
                    if self.shared.state.lock().withdraw(id) {
                        return Err(PoolError::Timeout(timeout));
                    }
                    // fulfilled between the deadline and the withdrawal
                    match rx.try_recv() {
                        Ok(delivery) => self.accept(delivery),
                        Err(_) => Err(PoolError::PoolClosed),
                    }
                }
            },
        }
    }

    /// Get a resource without blocking.
    ///
    /// Returns `Ok(None)` when nothing is idle and the pool is at capacity.
    /// Expired idle resources are closed as in [`Pool::get`].
    pub fn try_get(&self) -> PoolResult<Option<R>> {
        let mut evicted = Vec::new();
        let acquired = {
            let mut state = self.shared.state.lock();
            self.try_acquire(&mut state, &mut evicted)
        };
        self.close_evicted(evicted);

        match acquired? {
            Acquire::Ready(resource) => Ok(Some(resource)),
            Acquire::Create => self.create().map(Some),
            Acquire::Full => Ok(None),
        }
    }

    /// Get a resource, waiting asynchronously while the pool is at capacity.
    ///
    /// The factory still runs on the calling task. Dropping the returned
    /// future gives up the place in the queue; a resource that was already
    /// handed over is returned to the pool. Expired idle resources are
    /// closed as in [`Pool::get`].
    pub async fn get_async(&self) -> PoolResult<R> {
        match self.begin(async_slot)? {
            Step::Ready(resource) => Ok(resource),
            Step::Create => self.create(),
            Step::Wait(id, rx) => {
                let mut waiter = PendingWait {
                    pool: self,
                    id,
                    rx: Some(rx),
                };
                let delivery = waiter.recv().await?;
                self.accept(delivery)
            }
        }
    }

    /// Like [`Pool::get_async`], but gives up after `timeout`
    pub async fn get_async_timeout(&self, timeout: Duration) -> PoolResult<R> {
        tokio::time::timeout(timeout, self.get_async())
            .await
            .map_err(|_| PoolError::Timeout(timeout))?
    }

    /// Return a resource to the pool.
    ///
    /// The resource goes straight to the longest-waiting caller if there is
    /// one, otherwise into the idle set. If the idle set is full it is closed.
    /// After shutdown the resource is closed and
    /// [`PoolError::ClosedDiscarded`] is returned.
    ///
    /// Closer failures on these paths are logged at `warn` level and are not
    /// part of the result. Use [`Pool::discard`] when the close outcome
    /// matters.
    pub fn put(&self, resource: R) -> PoolResult<()> {
        let mut state = self.shared.state.lock();
        if state.closed {
            state.forget_one();
            drop(state);
            self.close_quietly(resource, "put after shutdown");
            return Err(PoolError::ClosedDiscarded);
        }

        let max_open = self.shared.max_open;
        if max_open > 0 && state.num_open > max_open {
            let open = state.num_open;
            // the resource is closed below, so it no longer counts as open
            state.forget_one();
            drop(state);
            error!(open, max_open, "open resource count exceeds maximum");
            self.close_quietly(resource, "put over capacity");
            return Err(PoolError::OverCapacity {
                open,
                max: max_open,
            });
        }

        let overflow = state.restore(resource, self.shared.max_idle);
        drop(state);

        if let Some(resource) = overflow {
            debug!("idle set full, closing returned resource");
            self.close_quietly(resource, "idle set full");
        }
        Ok(())
    }

    /// Run the configured validator against a resource.
    ///
    /// Does not touch the pool; call [`Pool::discard`] if the check fails.
    pub fn validate(&self, resource: &R) -> PoolResult<()> {
        let validator = self
            .shared
            .validator
            .as_ref()
            .ok_or(PoolError::ValidatorUnset)?;
        validator(resource).map_err(PoolError::validation)
    }

    /// Close a checked-out resource instead of returning it.
    ///
    /// The freed slot goes to the longest-waiting caller, who creates a
    /// fresh resource. After shutdown the resource is still closed and
    /// [`PoolError::ClosedDiscarded`] is returned.
    pub fn discard(&self, resource: R) -> PoolResult<()> {
        let result = (self.shared.closer)(resource);

        let closed = {
            let mut state = self.shared.state.lock();
            state.release_slot();
            state.closed
        };

        match result {
            Ok(()) if closed => Err(PoolError::ClosedDiscarded),
            Ok(()) => Ok(()),
            Err(err) if closed => {
                warn!(error = %err, "failed to close resource discarded after shutdown");
                Err(PoolError::ClosedDiscarded)
            }
            Err(err) => PoolError::from_close_errors(vec![err]),
        }
    }

    /// Close the pool.
    ///
    /// Idle resources are closed and blocked callers are woken with
    /// [`PoolError::PoolClosed`]. Checked-out resources stay with their
    /// holders, who must `put` or `discard` them. A second call is a no-op.
    pub fn shutdown(&self) -> PoolResult<()> {
        let (idle, waiters) = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            let idle: Vec<_> = state.idle.drain(..).collect();
            state.num_open = state.num_open.saturating_sub(idle.len());
            (idle, std::mem::take(&mut state.waiters))
        };

        debug!(idle = idle.len(), waiting = waiters.len(), "shutting down pool");
        // dropping the slots wakes every waiter with the closed signal
        drop(waiters);

        let errors: Vec<BoxError> = idle
            .into_iter()
            .filter_map(|entry| (self.shared.closer)(entry.into_inner()).err())
            .collect();
        if !errors.is_empty() {
            warn!(failures = errors.len(), "failed to close idle resources");
        }
        PoolError::from_close_errors(errors)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Resources that exist or are being created
    pub fn num_open(&self) -> usize {
        self.shared.state.lock().num_open
    }

    pub fn idle_count(&self) -> usize {
        self.shared.state.lock().idle.len()
    }

    /// Snapshot of the pool's counters
    pub fn status(&self) -> PoolStatus {
        let state = self.shared.state.lock();
        PoolStatus {
            num_open: state.num_open,
            idle: state.idle.len(),
            waiting: state.waiters.len(),
            max_open: self.shared.max_open,
            max_idle: self.shared.max_idle,
            closed: state.closed,
        }
    }

    /// Locked part of an acquire. Expired idle resources are moved to
    /// `evicted` so they can be closed after the lock is released.
    fn try_acquire(&self, state: &mut State<R>, evicted: &mut Vec<R>) -> PoolResult<Acquire<R>> {
        if state.closed {
            return Err(PoolError::PoolClosed);
        }

        let max_open = self.shared.max_open;
        match self.shared.reuse_strategy {
            ReuseStrategy::CachedOrNew => {
                while let Some(entry) = state.idle.pop_front() {
                    if entry.is_expired(self.shared.idle_timeout) {
                        debug!(idle_for = ?entry.idle_for(), "evicting expired idle resource");
                        evicted.push(entry.into_inner());
                        state.release_slot();
                        continue;
                    }
                    return Ok(Acquire::Ready(entry.into_inner()));
                }
            }
            ReuseStrategy::AlwaysNew => {
                // make room for a fresh resource by retiring the oldest idle one
                if max_open > 0
                    && state.num_open >= max_open
                    && let Some(entry) = state.idle.pop_front()
                {
                    evicted.push(entry.into_inner());
                    state.forget_one();
                }
            }
        }

        if max_open > 0 && state.num_open >= max_open {
            return Ok(Acquire::Full);
        }
        state.num_open += 1;
        Ok(Acquire::Create)
    }

    /// Acquire, queueing a wait slot built by `slot` if the pool is full
    fn begin<W>(&self, slot: fn(u64) -> (WaitSlot<R>, W)) -> PoolResult<Step<R, W>> {
        let mut evicted = Vec::new();
        let step = {
            let mut state = self.shared.state.lock();
            match self.try_acquire(&mut state, &mut evicted) {
                Ok(Acquire::Ready(resource)) => Ok(Step::Ready(resource)),
                Ok(Acquire::Create) => Ok(Step::Create),
                Ok(Acquire::Full) => {
                    let id = state.next_waiter_id;
                    state.next_waiter_id += 1;
                    let (wait_slot, rx) = slot(id);
                    state.waiters.push_back(wait_slot);
                    trace!(waiter = id, waiting = state.waiters.len(), "pool full, queued");
                    Ok(Step::Wait(id, rx))
                }
                Err(err) => Err(err),
            }
        };
        self.close_evicted(evicted);
        step
    }

    /// Run the factory for a slot already reserved in `num_open`
    fn create(&self) -> PoolResult<R> {
        match (self.shared.factory)() {
            Ok(resource) => {
                trace!("created resource");
                Ok(resource)
            }
            Err(err) => {
                self.shared.state.lock().release_slot();
                debug!(error = %err, "factory failed");
                Err(PoolError::factory(err))
            }
        }
    }

    fn accept(&self, delivery: Delivery<R>) -> PoolResult<R> {
        match delivery {
            Delivery::Resource(resource) => Ok(resource),
            Delivery::Permit => self.create(),
        }
    }

    /// Give back a delivery that reached a waiter who is no longer there
    fn reclaim(&self, delivery: Delivery<R>) {
        match delivery {
            Delivery::Resource(resource) => {
                if let Err(err) = self.put(resource) {
                    debug!(error = %err, "reclaimed resource was not pooled");
                }
            }
            Delivery::Permit => self.shared.state.lock().release_slot(),
        }
    }

    fn close_evicted(&self, evicted: Vec<R>) {
        for resource in evicted {
            self.close_quietly(resource, "idle timeout");
        }
    }

    fn close_quietly(&self, resource: R, reason: &'static str) {
        if let Err(err) = (self.shared.closer)(resource) {
            warn!(reason, error = %err, "failed to close resource");
        }
    }
}

/// A queued async acquire. Withdraws or reclaims its slot when dropped early.
struct PendingWait<'a, R: Send + 'static> {
    pool: &'a Pool<R>,
    id: u64,
    rx: Option<oneshot::Receiver<Delivery<R>>>,
}

impl<R: Send + 'static> PendingWait<'_, R> {
    async fn recv(&mut self) -> PoolResult<Delivery<R>> {
        let Some(rx) = self.rx.as_mut() else {
            return Err(PoolError::PoolClosed);
        };
        let received = rx.await;
        self.rx = None;
        received.map_err(|_| PoolError::PoolClosed)
    }
}

impl<R: Send + 'static> Drop for PendingWait<'_, R> {
    fn drop(&mut self) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };
        if self.pool.shared.state.lock().withdraw(self.id) {
            return;
        }
        if let Ok(delivery) = rx.try_recv() {
            self.pool.reclaim(delivery);
        }
    }
}
