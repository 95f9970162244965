use sn_core::{Error, FeedEvent, Result, SavedArticle, Subscription, UserId};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

const FEED_BUFFER: usize = 16;

/// Broadcast after every acknowledged write to a user's collection.
#[derive(Debug, Clone)]
pub struct ChangeNotice {
    pub user: UserId,
}

/// Counts a live listener for as long as it is held.
#[derive(Debug)]
pub struct ListenerGuard {
    count: Arc<AtomicUsize>,
}

impl ListenerGuard {
    pub fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self { count }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs a change feed for `user`: one snapshot on attach, then a fresh
/// snapshot whenever a notice for that user arrives. Notices that pile up
/// while a snapshot is being read collapse into a single re-read.
pub(crate) fn spawn_feed<F, Fut>(
    user: UserId,
    mut changes: broadcast::Receiver<ChangeNotice>,
    guard: ListenerGuard,
    snapshot: F,
) -> Subscription
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<SavedArticle>>> + Send,
{
    let (tx, rx) = mpsc::channel(FEED_BUFFER);
    let task = tokio::spawn(async move {
        let _guard = guard;
        loop {
            match snapshot().await {
                Ok(records) => {
                    debug!("Feed update for {}: {} articles", user, records.len());
                    if tx.send(FeedEvent::Snapshot(records)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    let _ = tx.send(FeedEvent::Failed(e)).await;
                    return;
                }
            }

            loop {
                match changes.recv().await {
                    Ok(notice) if notice.user == user => break,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Feed for {} lagged by {} notices", user, skipped);
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        let _ = tx
                            .send(FeedEvent::Failed(Error::Transport(
                                "store connection closed".to_string(),
                            )))
                            .await;
                        return;
                    }
                }
            }
            // Coalesce: the next snapshot already covers anything queued.
            while changes.try_recv().is_ok() {}
        }
    });
    Subscription::new(rx, task)
}
