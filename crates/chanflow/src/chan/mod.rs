//! Typed multi-producer multi-consumer channel with rendezvous and bounded modes.
//!
//! Every stage in the crate hands items downstream through this channel. It
//! behaves like a Go channel with Rust ownership rules layered on top:
//!
//! ```text
//!   Sender ─┐                                        ┌─▶ Receiver
//!   Sender ─┼──▶ [VecDeque<T>, capacity N, closed?] ──┼─▶ Receiver
//!   Sender ─┘    ├── capacity 0: send completes only   └─▶ Receiver
//!                │   while a receiver is parked
//!                ├── capacity N: up to N items buffered
//!                ├── close() or last Sender dropped → EOF after drain
//!                └── last Receiver dropped → senders get SendError
//! ```
//!
//! State lives behind a `std::sync::Mutex`; critical sections are a few
//! `VecDeque` operations and never span an `.await`. Wakeups go through two
//! `tokio::sync::Notify` handles. Every waiter creates its `Notified` future
//! before inspecting state, so a change that lands between the check and the
//! `.await` still wakes it.
//!
//! Sending is split in two: [`Sender::reserve`] waits for room and yields a
//! [`Permit`], and [`Permit::send`] places the item synchronously. Reserving
//! is cancel-safe, which lets a task race sends to several channels inside
//! `tokio::select!` without ever delivering an item twice.

mod error;

pub use error::{SendError, TryRecvError, TrySendError};

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::Stream;
use tokio::sync::Notify;

struct State<T> {
    queue: VecDeque<T>,
    capacity: usize,
    /// Permits handed out but not yet used.
    reserved: usize,
    /// Receivers parked in `recv`. Each one opens a rendezvous slot.
    waiting: usize,
    senders: usize,
    receivers: usize,
    closed: bool,
}

impl<T> State<T> {
    fn has_room(&self) -> bool {
        // `usize::MAX` is a valid capacity, so the bound saturates.
        self.queue.len() + self.reserved < self.capacity.saturating_add(self.waiting)
    }

    fn disconnected(&self) -> bool {
        self.closed || self.receivers == 0
    }
}

struct Shared<T> {
    state: Mutex<State<T>>,
    /// Signalled when an item is queued or the channel closes.
    items: Notify,
    /// Signalled when room opens up, or when receivers or the channel go away.
    room: Notify,
}

impl<T> Shared<T> {
    fn new(state: State<T>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            items: Notify::new(),
            room: Notify::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn close(&self) -> bool {
        {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
        }
        self.items.notify_waiters();
        self.room.notify_waiters();
        true
    }
}

/// Create a channel holding up to `capacity` undelivered items.
///
/// A capacity of 0 gives a rendezvous channel: each send waits until a
/// receiver is ready to take the item.
pub fn channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let shared = Shared::new(State {
        queue: VecDeque::with_capacity(capacity.min(1024)),
        capacity,
        reserved: 0,
        waiting: 0,
        senders: 1,
        receivers: 1,
        closed: false,
    });

    (
        Sender { shared: shared.clone() },
        Receiver { shared },
    )
}

/// Build a closed channel already holding every item, in order.
///
/// No task is spawned; the receiver drains the items and then sees EOF.
pub fn from_iter<T, I>(items: I) -> Receiver<T>
where
    I: IntoIterator<Item = T>,
{
    let queue: VecDeque<T> = items.into_iter().collect();
    let shared = Shared::new(State {
        capacity: queue.len(),
        queue,
        reserved: 0,
        waiting: 0,
        senders: 0,
        receivers: 1,
        closed: true,
    });
    Receiver { shared }
}

/// Sending half of a channel. Cloning adds another producer.
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Sender<T> {
    /// Send an item, waiting for room.
    ///
    /// Fails if the channel is closed or has no receivers left. Dropping the
    /// returned future before it completes drops the item without sending it.
    pub async fn send(&self, item: T) -> Result<(), SendError<T>> {
        match self.reserve().await {
            Ok(permit) => {
                permit.send(item);
                Ok(())
            }
            Err(_) => Err(SendError(item)),
        }
    }

    /// Wait for room and claim it.
    ///
    /// Cancel-safe: dropping the future before it resolves claims nothing.
    pub async fn reserve(&self) -> Result<Permit<'_, T>, SendError<()>> {
        loop {
            let room = self.shared.room.notified();
            {
                let mut state = self.shared.lock();
                if state.disconnected() {
                    return Err(SendError(()));
                }
                if state.has_room() {
                    state.reserved += 1;
                    return Ok(Permit { shared: &self.shared });
                }
            }
            room.await;
        }
    }

    /// Send without waiting.
    pub fn try_send(&self, item: T) -> Result<(), TrySendError<T>> {
        {
            let mut state = self.shared.lock();
            if state.disconnected() {
                return Err(TrySendError::Closed(item));
            }
            if !state.has_room() {
                return Err(TrySendError::Full(item));
            }
            state.queue.push_back(item);
        }
        self.shared.items.notify_waiters();
        Ok(())
    }

    /// Close the channel. Items already queued can still be received.
    ///
    /// Returns `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        self.shared.close()
    }

    /// Whether sends will fail from now on.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().disconnected()
    }

    pub fn capacity(&self) -> usize {
        self.shared.lock().capacity
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.shared.lock().senders += 1;
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let last = {
            let mut state = self.shared.lock();
            state.senders -= 1;
            state.senders == 0
        };
        if last {
            self.shared.close();
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Sender")
            .field("capacity", &state.capacity)
            .field("closed", &state.closed)
            .finish()
    }
}

/// Claimed room in a channel, obtained from [`Sender::reserve`].
///
/// Dropping an unused permit gives the room back.
pub struct Permit<'a, T> {
    shared: &'a Shared<T>,
}

impl<T> Permit<'_, T> {
    /// Place the item in the channel. Never blocks.
    ///
    /// If the channel was closed after the permit was granted, the item is
    /// dropped.
    pub fn send(self, item: T) {
        let shared = self.shared;
        std::mem::forget(self);

        let queued = {
            let mut state = shared.lock();
            state.reserved -= 1;
            if state.closed {
                false
            } else {
                state.queue.push_back(item);
                true
            }
        };
        if queued {
            shared.items.notify_waiters();
        }
    }
}

impl<T> Drop for Permit<'_, T> {
    fn drop(&mut self) {
        self.shared.lock().reserved -= 1;
        self.shared.room.notify_waiters();
    }
}

impl<T> fmt::Debug for Permit<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit").finish()
    }
}

/// Receiving half of a channel. Cloning adds another consumer; each item is
/// delivered to exactly one of them.
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

/// Marks a receiver as parked so rendezvous senders can hand it an item.
/// Unregisters on drop, which covers a `recv` future dropped mid-wait.
struct Parked<'a, T> {
    shared: &'a Shared<T>,
    registered: bool,
}

impl<T> Parked<'_, T> {
    fn register(&mut self, state: &mut State<T>) -> bool {
        if self.registered {
            return false;
        }
        state.waiting += 1;
        self.registered = true;
        true
    }

    fn release(&mut self, state: &mut State<T>) {
        if self.registered {
            state.waiting -= 1;
            self.registered = false;
        }
    }
}

impl<T> Drop for Parked<'_, T> {
    fn drop(&mut self) {
        if self.registered {
            self.shared.lock().waiting -= 1;
        }
    }
}

impl<T> Receiver<T> {
    /// Receive the next item, waiting until one arrives.
    ///
    /// Returns `None` once the channel is closed and drained. Cancel-safe: an
    /// item is only taken in the poll that returns it.
    pub async fn recv(&self) -> Option<T> {
        let mut parked = Parked {
            shared: &self.shared,
            registered: false,
        };

        loop {
            let items = self.shared.items.notified();
            let opened_slot = {
                let mut state = self.shared.lock();
                if let Some(item) = state.queue.pop_front() {
                    parked.release(&mut state);
                    drop(state);
                    self.shared.room.notify_waiters();
                    return Some(item);
                }
                if state.closed {
                    parked.release(&mut state);
                    return None;
                }
                parked.register(&mut state)
            };
            if opened_slot {
                self.shared.room.notify_waiters();
            }
            items.await;
        }
    }

    /// Receive without waiting.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let item = {
            let mut state = self.shared.lock();
            match state.queue.pop_front() {
                Some(item) => item,
                None if state.closed => return Err(TryRecvError::Closed),
                None => return Err(TryRecvError::Empty),
            }
        };
        self.shared.room.notify_waiters();
        Ok(item)
    }

    /// Whether the channel is closed. Buffered items may still be pending.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.lock().capacity
    }

    /// Adapt into a [`Stream`] that ends when the channel closes.
    pub fn into_stream(self) -> impl Stream<Item = T> {
        futures::stream::unfold(self, |rx| async move {
            let item = rx.recv().await?;
            Some((item, rx))
        })
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        self.shared.lock().receivers += 1;
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        let last = {
            let mut state = self.shared.lock();
            state.receivers -= 1;
            state.receivers == 0
        };
        if last {
            // Wake blocked senders so they observe the disconnect.
            self.shared.room.notify_waiters();
        }
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Receiver")
            .field("capacity", &state.capacity)
            .field("buffered", &state.queue.len())
            .field("closed", &state.closed)
            .finish()
    }
}
