use sn_core::{ArticleId, Canceller, Error, FeedEvent, Result, SavedArticle, SavedArticleStore, Subscription};
use std::sync::Arc;
use tracing::{debug, warn};

/// Locally rendered copy of the saved collection, kept in step with the
/// store's change feed.
pub struct SavedList {
    store: Arc<dyn SavedArticleStore>,
    items: Vec<SavedArticle>,
    subscription: Option<Subscription>,
    loaded: bool,
}

impl SavedList {
    pub fn new(store: Arc<dyn SavedArticleStore>) -> Self {
        Self {
            store,
            items: Vec::new(),
            subscription: None,
            loaded: false,
        }
    }

    /// Opens the change feed, replacing any previous one. The returned
    /// canceller stops the feed from outside this list.
    pub fn attach(&mut self) -> Canceller {
        let subscription = self.store.subscribe();
        let canceller = subscription.canceller();
        self.subscription = Some(subscription);
        canceller
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Cancels the change feed. The items stay as last seen.
    pub fn detach(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }

    pub fn items(&self) -> &[SavedArticle] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether at least one snapshot has arrived.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Applies one feed event. A snapshot replaces the whole list; a failure
    /// detaches the feed and is returned.
    pub fn apply(&mut self, event: FeedEvent) -> Result<usize> {
        match event {
            FeedEvent::Snapshot(records) => {
                debug!("Real-time update: {} articles", records.len());
                self.items = records;
                self.loaded = true;
                Ok(self.items.len())
            }
            FeedEvent::Failed(e) => {
                warn!("Listen failed: {}", e);
                self.detach();
                Err(e)
            }
        }
    }

    /// Waits for the next feed event and applies it. `None` when detached or
    /// the feed has ended.
    pub async fn next_update(&mut self) -> Option<Result<usize>> {
        let event = match self.subscription.as_mut() {
            Some(subscription) => subscription.next().await,
            None => return None,
        };
        match event {
            Some(event) => Some(self.apply(event)),
            None => {
                self.subscription = None;
                None
            }
        }
    }

    /// Deletes the saved article with `id`.
    ///
    /// On success the item is removed locally straight away; the next
    /// snapshot will agree. On failure the item stays and the error is
    /// returned.
    pub async fn delete(&mut self, id: &ArticleId) -> Result<()> {
        let url = {
            let item = self
                .items
                .iter()
                .find(|r| &r.article_id == id)
                .ok_or_else(|| Error::NotFound(format!("No saved article {}", id)))?;
            item.url()
                .ok_or_else(|| Error::InvalidInput("Cannot delete article without URL".to_string()))?
                .to_string()
        };

        self.store.delete(&url).await?;
        // Identity, not position: a snapshot may have reordered the list
        // while the delete was in flight.
        self.items.retain(|r| &r.article_id != id);
        Ok(())
    }
}

impl Drop for SavedList {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sn_core::Article;

    fn record(id: &str, url: Option<&str>) -> SavedArticle {
        SavedArticle {
            article_id: ArticleId::new(id),
            article: Article {
                title: id.to_string(),
                canonical_url: url.map(str::to_string),
                ..Default::default()
            },
            saved_at: 1,
        }
    }

    struct NullStore;

    #[async_trait::async_trait]
    impl SavedArticleStore for NullStore {
        async fn save(&self, _article: &Article) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn exists(&self, _url: &str) -> bool {
            false
        }

        async fn list_once(&self) -> Result<Vec<SavedArticle>> {
            Ok(vec![])
        }

        fn subscribe(&self) -> Subscription {
            Subscription::failed(Error::Unauthenticated)
        }
    }

    #[test]
    fn test_snapshot_replaces_list() {
        let mut list = SavedList::new(Arc::new(NullStore));
        assert!(!list.is_loaded());

        list.apply(FeedEvent::Snapshot(vec![record("a", None), record("b", None)])).unwrap();
        assert_eq!(list.len(), 2);
        list.apply(FeedEvent::Snapshot(vec![record("c", None)])).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.items()[0].article_id.as_str(), "c");
        assert!(list.is_loaded());
    }

    #[tokio::test]
    async fn test_feed_failure_detaches() {
        let mut list = SavedList::new(Arc::new(NullStore));
        list.attach();
        assert!(matches!(list.next_update().await, Some(Err(Error::Unauthenticated))));
        assert!(!list.is_attached());
        assert!(list.next_update().await.is_none());
    }

    #[tokio::test]
    async fn test_delete_requires_known_item_with_url() {
        let mut list = SavedList::new(Arc::new(NullStore));
        list.apply(FeedEvent::Snapshot(vec![record("no_url", None), record("ok", Some("https://example.com"))]))
            .unwrap();

        assert!(matches!(list.delete(&ArticleId::new("missing")).await, Err(Error::NotFound(_))));
        assert!(matches!(list.delete(&ArticleId::new("no_url")).await, Err(Error::InvalidInput(_))));
        list.delete(&ArticleId::new("ok")).await.unwrap();
        assert_eq!(list.len(), 1);
    }
}
