//! Bounded channels.
//!
//! A channel is a tri-state queue: buffered values, parked receivers and
//! parked senders. At most one of "values or senders" and "receivers" is
//! non-empty at a time, except for stale receivers left behind by a
//! `select` that completed elsewhere. Those are skipped on delivery.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::ChannelError;
use crate::signal::Signal;

/// What a parked receiver is woken with. `usize` is the index the
/// receiver registered under, so `select` can tell which channel won.
#[derive(Debug)]
pub(crate) enum Delivery<T> {
    Value(usize, T),
    Closed,
}

pub(crate) type ReceiveSignal<T> = Arc<Signal<Delivery<T>>>;

#[derive(Debug)]
struct PendingReceive<T> {
    signal: ReceiveSignal<T>,
    index: usize,
}

#[derive(Debug)]
struct PendingSend<T> {
    value: T,
    signal: Arc<Signal<Result<(), ChannelError>>>,
}

#[derive(Debug)]
struct State<T> {
    buffer: VecDeque<T>,
    receivers: VecDeque<PendingReceive<T>>,
    senders: VecDeque<PendingSend<T>>,
    closed: bool,
}

#[derive(Debug)]
struct Shared<T> {
    capacity: usize,
    state: Mutex<State<T>>,
}

/// Result of a receive that must not block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TryReceive<T> {
    Value(T),
    /// Nothing to take right now, but the channel is open.
    Empty,
    /// Closed and fully drained.
    Closed,
}

/// A handle to a channel. Clones share the same channel.
///
/// Capacity 0 makes the channel unbuffered: every send waits for a
/// receiver to take its value.
#[derive(Debug)]
pub struct Channel<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Channel {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Channel<T> {
    pub fn new(capacity: usize) -> Self {
        Channel {
            shared: Arc::new(Shared {
                capacity,
                state: Mutex::new(State {
                    buffer: VecDeque::with_capacity(capacity),
                    receivers: VecDeque::new(),
                    senders: VecDeque::new(),
                    closed: false,
                }),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of buffered values.
    pub fn len(&self) -> usize {
        self.state().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Parked receivers (stale select registrations included) and parked
    /// senders.
    pub fn waiting(&self) -> (usize, usize) {
        let state = self.state();
        (state.receivers.len(), state.senders.len())
    }

    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Send a value, suspending while the buffer is full.
    ///
    /// Fails if the channel is closed before the value is accepted; the
    /// value is dropped in that case.
    pub fn send(&self, value: T) -> Result<(), ChannelError> {
        let signal = {
            let mut state = self.state();
            if state.closed {
                return Err(ChannelError::Closed);
            }

            let mut value = value;
            while let Some(receiver) = state.receivers.pop_front() {
                match receiver
                    .signal
                    .complete(Delivery::Value(receiver.index, value))
                {
                    Ok(()) => return Ok(()),
                    // stale select registration
                    Err(Delivery::Value(_, returned)) => value = returned,
                    Err(Delivery::Closed) => return Ok(()),
                }
            }

            if state.buffer.len() < self.shared.capacity {
                state.buffer.push_back(value);
                return Ok(());
            }

            let signal = Arc::new(Signal::new());
            state.senders.push_back(PendingSend {
                value,
                signal: Arc::clone(&signal),
            });
            signal
        };
        signal.wait()
    }

    /// Receive a value, suspending while nothing is available.
    ///
    /// Buffered values stay receivable after `close`; once they are gone
    /// every receive fails.
    pub fn receive(&self) -> Result<T, ChannelError> {
        let signal = {
            let mut state = self.state();
            match Self::take(&mut state) {
                TryReceive::Value(value) => return Ok(value),
                TryReceive::Closed => return Err(ChannelError::Closed),
                TryReceive::Empty => {}
            }
            let signal = Arc::new(Signal::new());
            state.receivers.push_back(PendingReceive {
                signal: Arc::clone(&signal),
                index: 0,
            });
            signal
        };
        match signal.wait() {
            Delivery::Value(_, value) => Ok(value),
            Delivery::Closed => Err(ChannelError::Closed),
        }
    }

    pub fn try_receive(&self) -> TryReceive<T> {
        let mut state = self.state();
        Self::take(&mut state)
    }

    /// Take from the buffer, promoting the oldest parked sender into the
    /// freed slot, or directly from a parked sender when unbuffered.
    fn take(state: &mut State<T>) -> TryReceive<T> {
        if let Some(value) = state.buffer.pop_front() {
            if let Some(sender) = state.senders.pop_front() {
                state.buffer.push_back(sender.value);
                let _ = sender.signal.complete(Ok(()));
            }
            return TryReceive::Value(value);
        }
        if let Some(sender) = state.senders.pop_front() {
            let _ = sender.signal.complete(Ok(()));
            return TryReceive::Value(sender.value);
        }
        if state.closed {
            TryReceive::Closed
        } else {
            TryReceive::Empty
        }
    }

    /// Deliver straight into `signal` if something is available, else park
    /// it as a receiver. Returns false when the channel is closed and
    /// drained, in which case nothing was registered.
    ///
    /// Everything happens under the channel lock, so a value that loses
    /// the race for `signal` goes back where it came from.
    pub(crate) fn register(&self, signal: &ReceiveSignal<T>, index: usize) -> bool {
        let mut state = self.state();
        if let Some(value) = state.buffer.pop_front() {
            match signal.complete(Delivery::Value(index, value)) {
                Ok(()) => {
                    if let Some(sender) = state.senders.pop_front() {
                        state.buffer.push_back(sender.value);
                        let _ = sender.signal.complete(Ok(()));
                    }
                }
                Err(Delivery::Value(_, value)) => state.buffer.push_front(value),
                Err(Delivery::Closed) => {}
            }
            return true;
        }
        if let Some(PendingSend {
            value,
            signal: sender,
        }) = state.senders.pop_front()
        {
            match signal.complete(Delivery::Value(index, value)) {
                Ok(()) => {
                    let _ = sender.complete(Ok(()));
                }
                Err(Delivery::Value(_, value)) => state.senders.push_front(PendingSend {
                    value,
                    signal: sender,
                }),
                Err(Delivery::Closed) => {}
            }
            return true;
        }
        if state.closed {
            return false;
        }
        state.receivers.push_back(PendingReceive {
            signal: Arc::clone(signal),
            index,
        });
        true
    }

    /// Close the channel. Parked senders and receivers fail; buffered
    /// values stay receivable. Closing twice is a no-op.
    pub fn close(&self) {
        let mut state = self.state();
        if state.closed {
            return;
        }
        state.closed = true;
        for receiver in state.receivers.drain(..) {
            // losing select registrations are already complete
            let _ = receiver.signal.complete(Delivery::Closed);
        }
        for sender in state.senders.drain(..) {
            let _ = sender.signal.complete(Err(ChannelError::Closed));
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    /// Spin until `channel` has `receivers` parked receivers and `senders`
    /// parked senders.
    pub(crate) fn wait_for_parked<T>(channel: &Channel<T>, receivers: usize, senders: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while channel.waiting() != (receivers, senders) {
            assert!(Instant::now() < deadline, "parties never parked");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn capacity_two_keeps_send_order() {
        let channel = Channel::new(2);
        let sender = channel.clone();
        let handle = thread::spawn(move || {
            for value in 1..=3 {
                sender.send(value).expect("send");
            }
        });
        // the third send parks until the first receive frees a slot
        wait_for_parked(&channel, 0, 1);
        assert_eq!(channel.len(), 2);
        let received: Vec<i32> = (0..3).map(|_| channel.receive().expect("receive")).collect();
        handle.join().expect("sender thread");
        assert_eq!(received, vec![1, 2, 3]);
    }

    #[test]
    fn close_then_drain() {
        let channel = Channel::new(2);
        channel.send("a").expect("send a");
        channel.send("b").expect("send b");
        channel.close();

        assert_eq!(channel.send("c"), Err(ChannelError::Closed));
        assert_eq!(channel.receive(), Ok("a"));
        assert_eq!(channel.try_receive(), TryReceive::Value("b"));
        assert_eq!(channel.receive(), Err(ChannelError::Closed));
        assert_eq!(channel.try_receive(), TryReceive::Closed);
    }

    #[test]
    fn try_receive_reports_empty_without_blocking() {
        let channel: Channel<u8> = Channel::new(1);
        assert_eq!(channel.try_receive(), TryReceive::Empty);
        assert!(channel.is_empty());
    }

    #[test]
    fn unbuffered_send_waits_for_a_receiver() {
        let channel = Channel::new(0);
        let sender = channel.clone();
        let handle = thread::spawn(move || sender.send(42));
        wait_for_parked(&channel, 0, 1);
        assert_eq!(channel.receive(), Ok(42));
        assert_eq!(handle.join().expect("sender thread"), Ok(()));
    }

    #[test]
    fn parked_sender_is_promoted_into_the_buffer() {
        let channel = Channel::new(1);
        channel.send(1).expect("send 1");
        let sender = channel.clone();
        let handle = thread::spawn(move || sender.send(2));
        wait_for_parked(&channel, 0, 1);
        assert_eq!(channel.receive(), Ok(1));
        assert_eq!(handle.join().expect("sender thread"), Ok(()));
        assert_eq!(channel.waiting(), (0, 0));
        assert_eq!(channel.receive(), Ok(2));
    }

    #[test]
    fn parked_receiver_takes_the_value_directly() {
        let channel = Channel::new(1);
        let receiver = channel.clone();
        let handle = thread::spawn(move || receiver.receive());
        wait_for_parked(&channel, 1, 0);
        channel.send(9).expect("send");
        assert_eq!(handle.join().expect("receiver thread"), Ok(9));
        assert!(channel.is_empty());
    }

    #[test]
    fn close_fails_parked_receivers() {
        let channel: Channel<i32> = Channel::new(0);
        let receiver = channel.clone();
        let handle = thread::spawn(move || receiver.receive());
        wait_for_parked(&channel, 1, 0);
        channel.close();
        assert_eq!(handle.join().expect("receiver thread"), Err(ChannelError::Closed));
    }

    #[test]
    fn close_fails_parked_senders() {
        let channel = Channel::new(0);
        let sender = channel.clone();
        let handle = thread::spawn(move || sender.send(7));
        wait_for_parked(&channel, 0, 1);
        channel.close();
        assert_eq!(handle.join().expect("sender thread"), Err(ChannelError::Closed));
        assert_eq!(channel.waiting(), (0, 0));
        assert_eq!(channel.try_receive(), TryReceive::Closed);
    }
}
