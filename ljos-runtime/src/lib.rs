//! Runtime support for compiled Ljos programs.
//!
//! Generated code leans on a small set of concurrency and resource
//! primitives: channels with `select`, deferred actions, a FIFO lock and
//! a wait group. This crate is their reference implementation on native
//! threads. Suspension is always explicit: a blocked party parks on a
//! [`signal::Signal`] and whoever completes the operation wakes it.
//!
//! There are no timeouts and no cancellation.

mod signal;

pub mod channel;
pub mod defer;
pub mod error;
pub mod lock;
pub mod select;
pub mod wait_group;

pub use channel::{Channel, TryReceive};
pub use defer::{DeferFailure, DeferReport, DeferStack};
pub use error::{ChannelError, LockError, WaitGroupError};
pub use lock::Lock;
pub use select::{Selected, select};
pub use wait_group::WaitGroup;
