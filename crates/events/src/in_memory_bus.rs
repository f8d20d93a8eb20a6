//! Process-local bus for tests and single-process deployments.

use std::sync::{Mutex, mpsc};

use thiserror::Error;

use crate::bus::{EventBus, Subscription};

#[derive(Debug, Error)]
pub enum InMemoryBusError {
    #[error("event bus lock poisoned")]
    Poisoned,
}

/// Fans every message out to all live subscriptions over `mpsc` channels.
///
/// Subscriptions that were dropped are forgotten on the next publish.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    senders: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscriptions still registered (dropped ones linger until the next publish).
    pub fn subscriber_count(&self) -> usize {
        self.senders.lock().map_or(0, |senders| senders.len())
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut senders = self.senders.lock().map_err(|_| InMemoryBusError::Poisoned)?;
        senders.retain(|tx| tx.send(message.clone()).is_ok());
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut senders) = self.senders.lock() {
            senders.push(tx);
        }
        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn every_subscriber_receives_published_messages() {
        let bus: InMemoryEventBus<u32> = InMemoryEventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(7).unwrap();
        bus.publish(8).unwrap();

        assert_eq!(a.drain(), vec![7, 8]);
        assert_eq!(b.drain(), vec![7, 8]);
    }

    #[test]
    fn dropped_subscribers_are_pruned_on_publish() {
        let bus: InMemoryEventBus<u32> = InMemoryEventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(1).unwrap();

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.try_recv().unwrap(), 1);
    }

    #[test]
    fn messages_cross_threads() {
        let bus: Arc<InMemoryEventBus<&'static str>> = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();

        let publisher = {
            let bus = bus.clone();
            thread::spawn(move || bus.publish("run produced").unwrap())
        };

        assert_eq!(sub.recv_timeout(Duration::from_secs(1)).unwrap(), "run produced");
        publisher.join().unwrap();
    }
}
