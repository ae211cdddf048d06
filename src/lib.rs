//! # EsoxSolutions.ResourcePool
//!
//! Bounded, thread-safe pool for expensive resources such as network
//! connections. The pool never knows what a resource is: the caller supplies
//! the callbacks that create, close and (optionally) validate them.
//!
//! ## Features
//!
//! - Capacity limit on open resources, with a separate bound on idle ones
//! - Blocking `get` with strict first-come-first-served hand-off
//! - Non-blocking `try_get`, deadline-bound `get_timeout`, and async `get_async`
//! - Lazy idle-timeout eviction on the acquire path
//! - All-or-nothing pool warm-up
//! - Shutdown that wakes every blocked caller
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_resourcepool::{Pool, PoolConfig};
//! use std::net::{TcpListener, TcpStream};
//!
//! let listener = TcpListener::bind("127.0.0.1:0").unwrap();
//! let addr = listener.local_addr().unwrap();
//!
//! let pool = Pool::new(
//!     PoolConfig::new()
//!         .with_initial_size(1)
//!         .with_max_open(2)
//!         .with_factory(move || TcpStream::connect(addr))
//!         .with_closer(|conn: TcpStream| conn.shutdown(std::net::Shutdown::Both)),
//! )
//! .unwrap();
//!
//! let conn = pool.get().unwrap();
//! // ... talk to the server ...
//! pool.put(conn).unwrap();
//! # pool.shutdown().ok();
//! ```

mod pool;
mod config;
mod status;
mod eviction;
mod wait;
mod errors;

pub use pool::Pool;
pub use config::{Closer, Factory, PoolConfig, ReuseStrategy, Validator};
pub use status::PoolStatus;
pub use errors::{BoxError, PoolError, PoolResult, SharedError};
