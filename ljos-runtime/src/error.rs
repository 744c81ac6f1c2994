use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel is closed")]
    Closed,
    #[error("select needs at least one channel")]
    NoChannels,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LockError {
    #[error("unlock of a lock that is not held")]
    NotLocked,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WaitGroupError {
    /// The counter would have become the carried value.
    #[error("wait group counter cannot go negative (would be {0})")]
    NegativeCounter(i64),
}
