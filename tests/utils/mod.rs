use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use esox_resourcepool::{BoxError, Pool, PoolConfig};

#[derive(Debug, PartialEq, Eq)]
pub struct Conn {
    pub id: usize,
}

#[derive(Default)]
pub struct Tracker {
    pub created: AtomicUsize,
    pub closed: AtomicUsize,
    pub failing: AtomicBool,
}

#[allow(unused)]
impl Tracker {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

/// Pool of numbered connections whose factory can be switched to failing
pub fn tracked_pool(config: PoolConfig<Conn>) -> (Pool<Conn>, Arc<Tracker>) {
    let tracker = Arc::new(Tracker::default());
    let factory = Arc::clone(&tracker);
    let closer = Arc::clone(&tracker);
    let pool = Pool::new(
        config
            .with_factory(move || {
                if factory.failing.load(Ordering::SeqCst) {
                    return Err(BoxError::from("connection refused"));
                }
                let id = factory.created.fetch_add(1, Ordering::SeqCst);
                Ok(Conn { id })
            })
            .with_closer(move |_conn: Conn| {
                closer.closed.fetch_add(1, Ordering::SeqCst);
                Ok::<_, BoxError>(())
            }),
    )
    .unwrap();
    (pool, tracker)
}

/// Spin until `waiting` callers are queued on the pool
#[allow(unused)]
pub fn wait_for_waiters(pool: &Pool<Conn>, waiting: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while pool.status().waiting != waiting {
        assert!(Instant::now() < deadline, "waiters never reached {waiting}");
        thread::sleep(Duration::from_millis(1));
    }
}
