//! Fan-out event channel
//!
//! [`EventHub`] delivers every published event to each live subscriber over
//! its own unbounded async-channel. Publishers that need to mutate shared
//! state and publish as one step take the hub lock with [`EventHub::lock`];
//! a subscriber registered through the same lock therefore sees either the
//! state before the step or the event it produced, never neither.

use async_channel::{Receiver, Sender, TryRecvError, unbounded};
use parking_lot::{Mutex, MutexGuard};

struct HubState<T> {
    senders: Vec<Sender<T>>,
    closed: bool,
}

/// Multi-subscriber event hub
pub struct EventHub<T> {
    state: Mutex<HubState<T>>,
}

impl<T: Clone> EventHub<T> {
    /// Create an open hub with no subscribers
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HubState {
                senders: Vec::new(),
                closed: false,
            }),
        }
    }

    /// Take the hub lock
    ///
    /// Subscribe and publish calls are serialised while the guard lives.
    pub fn lock(&self) -> HubGuard<'_, T> {
        HubGuard {
            state: self.state.lock(),
        }
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> Subscription<T> {
        self.lock().subscribe_with(Vec::new())
    }

    /// Register a new subscriber that first receives `backlog`
    pub fn subscribe_with(&self, backlog: Vec<T>) -> Subscription<T> {
        self.lock().subscribe_with(backlog)
    }

    /// Deliver `event` to every live subscriber
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, event: T) -> usize {
        self.lock().publish(event)
    }

    /// Close the hub
    ///
    /// Subscribers drain what is already queued and then observe the end of
    /// the stream. Later publishes are dropped.
    pub fn close(&self) {
        self.lock().close();
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of subscribers still attached
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock();
        state.senders.retain(|tx| !tx.is_closed());
        state.senders.len()
    }
}

impl<T: Clone> Default for EventHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to an [`EventHub`]
pub struct HubGuard<'a, T> {
    state: MutexGuard<'a, HubState<T>>,
}

impl<T: Clone> HubGuard<'_, T> {
    /// Deliver `event` to every live subscriber, pruning dropped ones
    pub fn publish(&mut self, event: T) -> usize {
        if self.state.closed {
            return 0;
        }

        self.state
            .senders
            .retain(|tx| tx.try_send(event.clone()).is_ok());
        self.state.senders.len()
    }

    /// Register a subscriber whose queue starts with `backlog`
    ///
    /// On a closed hub the subscription yields the backlog and then ends.
    pub fn subscribe_with(&mut self, backlog: Vec<T>) -> Subscription<T> {
        let (tx, rx) = unbounded();
        for event in backlog {
            // Unbounded and the receiver is alive, so this cannot fail
            let _ = tx.try_send(event);
        }

        if !self.state.closed {
            self.state.senders.push(tx);
        }

        Subscription { rx }
    }

    /// Close the hub and release every sender
    pub fn close(&mut self) {
        self.state.closed = true;
        self.state.senders.clear();
    }

    /// Whether the hub has been closed
    pub fn is_closed(&self) -> bool {
        self.state.closed
    }
}

/// Receiving side of one hub subscription
#[derive(Debug)]
pub struct Subscription<T> {
    rx: Receiver<T>,
}

impl<T> Subscription<T> {
    /// Wait for the next event
    ///
    /// Fails once the hub is closed and the queue is drained.
    pub async fn recv(&self) -> crate::Result<T> {
        self.rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Take the next queued event without waiting
    pub fn try_recv(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }

    /// Whether the hub side has gone away
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether no events are queued
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let hub = EventHub::new();
        let a = hub.subscribe();
        let b = hub.subscribe();

        assert_eq!(hub.publish(7u32), 2);
        assert_eq!(a.recv().await.unwrap(), 7);
        assert_eq!(b.recv().await.unwrap(), 7);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let hub = EventHub::new();
        let keep = hub.subscribe();
        drop(hub.subscribe());

        assert_eq!(hub.publish(1u8), 1);
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(keep.try_recv(), Some(1));
    }

    #[test]
    fn test_backlog_is_delivered_first() {
        let hub = EventHub::new();
        let sub = hub.subscribe_with(vec![1u8, 2]);
        hub.publish(3);

        assert_eq!(sub.len(), 3);
        assert_eq!(sub.try_recv(), Some(1));
        assert_eq!(sub.try_recv(), Some(2));
        assert_eq!(sub.try_recv(), Some(3));
        assert!(sub.is_empty());
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let hub = EventHub::new();
        let sub = hub.subscribe();
        hub.publish("queued");
        hub.close();

        assert!(hub.is_closed());
        assert_eq!(hub.publish("late"), 0);
        assert_eq!(sub.recv().await.unwrap(), "queued");
        assert!(sub.recv().await.is_err());
        assert!(sub.is_closed());
    }

    #[test]
    fn test_subscribe_after_close_yields_backlog_only() {
        let hub = EventHub::new();
        hub.close();
        let sub = hub.subscribe_with(vec![5u8]);

        assert_eq!(sub.try_recv(), Some(5));
        assert_eq!(sub.try_recv(), None);
        assert!(sub.is_closed());
    }
}
