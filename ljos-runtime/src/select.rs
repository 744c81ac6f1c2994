//! Waiting on several channels at once.

use std::sync::Arc;

use crate::channel::{Channel, Delivery, TryReceive};
use crate::error::ChannelError;
use crate::signal::Signal;

/// The value `select` received and the position of its channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selected<T> {
    pub index: usize,
    pub value: T,
}

/// Receive from whichever channel delivers first.
///
/// Channels are polled in order first, so a ready channel earlier in the
/// slice wins over a later one. Otherwise one shared signal is parked on
/// every open channel and the first completion wins, a close included.
/// The registrations that lose stay behind and are skipped by later
/// senders. Fails with `Closed` when every channel is closed and drained.
pub fn select<T>(channels: &[&Channel<T>]) -> Result<Selected<T>, ChannelError> {
    if channels.is_empty() {
        return Err(ChannelError::NoChannels);
    }

    for (index, channel) in channels.iter().enumerate() {
        if let TryReceive::Value(value) = channel.try_receive() {
            return Ok(Selected { index, value });
        }
    }

    let signal = Arc::new(Signal::new());
    let mut registered = false;
    for (index, channel) in channels.iter().enumerate() {
        if signal.is_complete() {
            break;
        }
        registered |= channel.register(&signal, index);
    }
    if !registered && !signal.is_complete() {
        return Err(ChannelError::Closed);
    }

    match signal.wait() {
        Delivery::Value(index, value) => Ok(Selected { index, value }),
        Delivery::Closed => Err(ChannelError::Closed),
    }
}
