//! A minimal reactor: a single-threaded event loop multiplexing descriptor
//! readiness (level-triggered `poll(2)`) with deadline-ordered timer
//! callbacks, plus a fixed worker-thread pool for offloading blocking work.

mod action;
mod error;
pub mod net;
mod pool;
mod reactor;
mod time;
mod timer;

pub use action::{Action, ActionId, ActionRegistry};
pub use error::Error;
pub use pool::{Runnable, WorkerPool};
pub use reactor::Reactor;
pub use time::{Interval, Time};
pub use timer::{NowFn, Timer, TimerQueue};
