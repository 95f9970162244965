use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::types::SavedArticle;
use crate::Error;

/// One delivery from a saved-article change feed.
#[derive(Debug)]
pub enum FeedEvent {
    /// Full current contents of the collection, newest first.
    Snapshot(Vec<SavedArticle>),
    /// The feed failed and will not deliver anything else.
    Failed(Error),
}

type TaskSlot = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Handle to a live change feed.
///
/// Dropping the handle cancels the feed and releases the listener it holds on
/// the store.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<FeedEvent>,
    task: TaskSlot,
}

impl Subscription {
    pub fn new(events: mpsc::Receiver<FeedEvent>, task: JoinHandle<()>) -> Self {
        Self {
            events,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// An inert subscription that reports `err` once and then ends.
    pub fn failed(err: Error) -> Self {
        let (tx, events) = mpsc::channel(1);
        let _ = tx.try_send(FeedEvent::Failed(err));
        Self {
            events,
            task: Arc::new(Mutex::new(None)),
        }
    }

    /// Waits for the next event. `None` once the feed is cancelled or has
    /// failed and drained.
    pub async fn next(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }

    pub fn is_active(&self) -> bool {
        slot_is_active(&self.task)
    }

    pub fn cancel(&mut self) {
        cancel_slot(&self.task);
        self.events.close();
    }

    /// A detached handle that can cancel this feed from elsewhere.
    pub fn canceller(&self) -> Canceller {
        Canceller {
            task: self.task.clone(),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        cancel_slot(&self.task);
    }
}

#[derive(Debug, Clone)]
pub struct Canceller {
    task: TaskSlot,
}

impl Canceller {
    pub fn cancel(&self) {
        cancel_slot(&self.task);
    }

    /// False once the feed was cancelled or its task ended.
    pub fn is_active(&self) -> bool {
        slot_is_active(&self.task)
    }
}

fn slot_is_active(slot: &TaskSlot) -> bool {
    let slot = slot.lock().unwrap_or_else(|e| e.into_inner());
    slot.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
}

fn cancel_slot(slot: &TaskSlot) {
    let task = slot.lock().unwrap_or_else(|e| e.into_inner()).take();
    if let Some(task) = task {
        task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_subscription_is_inert() {
        let mut sub = Subscription::failed(Error::Unauthenticated);
        assert!(!sub.is_active());
        assert!(matches!(sub.next().await, Some(FeedEvent::Failed(Error::Unauthenticated))));
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_stops_delivery() {
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(async move {
            loop {
                if tx.send(FeedEvent::Snapshot(vec![])).await.is_err() {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        });
        let mut sub = Subscription::new(rx, task);
        assert!(matches!(sub.next().await, Some(FeedEvent::Snapshot(_))));
        assert!(sub.is_active());

        let canceller = sub.canceller();
        assert!(canceller.is_active());
        canceller.cancel();
        assert!(!canceller.is_active());
        sub.cancel();
        assert!(!sub.is_active());
        while sub.next().await.is_some() {}
    }
}
