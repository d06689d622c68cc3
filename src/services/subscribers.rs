//! Push subscribers for transition events
//!
//! Every subscriber owns a bounded queue. Delivery uses `try_send`, so a slow
//! subscriber loses batches instead of stalling the scheduler.

use crate::constants::SUBSCRIBER_QUEUE_CAPACITY;
use crate::error::Result;
use crate::models::TransitionEvent;
use crate::services::sinks::ChangeSink;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, warn};

pub type SubscriberId = u64;

/// One batch worth of transitions, shared between subscribers
pub type TransitionBatch = Arc<Vec<TransitionEvent>>;

#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    subscribers: TokioMutex<HashMap<SubscriberId, Sender<TransitionBatch>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber with a queue of `capacity` batches
    pub async fn subscribe(&self, capacity: usize) -> (SubscriberId, Receiver<TransitionBatch>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().await.insert(id, tx);
        debug!(subscriber = id, capacity, "Subscriber registered");
        (id, rx)
    }

    pub async fn subscribe_default(&self) -> (SubscriberId, Receiver<TransitionBatch>) {
        self.subscribe(SUBSCRIBER_QUEUE_CAPACITY).await
    }

    /// Returns false when the id was not registered
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Hand a batch to every subscriber without waiting.
    ///
    /// Returns how many subscribers received it. Closed subscribers are
    /// removed.
    pub async fn broadcast(&self, events: &[TransitionEvent]) -> usize {
        let mut subscribers = self.subscribers.lock().await;
        if subscribers.is_empty() {
            return 0;
        }

        let batch: TransitionBatch = Arc::new(events.to_vec());
        let mut delivered = 0;
        let mut closed = Vec::new();

        for (id, sender) in subscribers.iter() {
            match sender.try_send(Arc::clone(&batch)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = *id, events = events.len(), "Subscriber queue full, dropping batch");
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in closed {
            subscribers.remove(&id);
            debug!(subscriber = id, "Subscriber closed, removed");
        }

        delivered
    }
}

#[async_trait]
impl ChangeSink for SubscriberRegistry {
    async fn accept(&self, events: &[TransitionEvent]) -> Result<()> {
        if !events.is_empty() {
            self.broadcast(events).await;
        }
        Ok(())
    }
}
