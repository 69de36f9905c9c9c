//! Bot pool and per-bot countdown timers.
//!
//! # Components
//!
//! - [`WorkerPool`]: ordered set of bots with idle/busy state. Grows and
//!   shrinks at the back only; removing a busy bot is a two-step protocol
//!   ([`WorkerPool::last_removal`] then [`WorkerPool::confirm_removal`]) so the
//!   caller can roll back the orphaned job in between.
//! - [`CountdownScheduler`]: one cancellable countdown per bot, advanced one
//!   tick at a time.
//!
//! Neither component starts work on its own. The
//! [`OrderDispatcher`](crate::scheduler::OrderDispatcher) drives both.

pub mod countdown;
pub mod pool;

pub use countdown::{CountdownScheduler, Expired, TimerId};
pub use pool::{PendingRemoval, Worker, WorkerId, WorkerPool, WorkerStatus};
