use async_trait::async_trait;
use serde_json::Value;
use sn_core::{
    identify, Article, ArticleId, Error, IdentityProvider, Result, SavedArticle,
    SavedArticleStore, Subscription, UserId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use crate::clock::MonotonicClock;
use crate::document::{sort_newest_first, SavedArticleDocument};
use crate::feed::{spawn_feed, ChangeNotice, ListenerGuard};
use crate::{require_url, require_user, BackendConfig, StorageBackend};

const CHANGE_BUFFER: usize = 64;

/// In-process document store standing in for the remote backend.
///
/// One backend can serve several [`MemoryStorage`] clients, each with its own
/// identity, which is how multiple devices of one user are modelled.
#[derive(Debug)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<UserId, HashMap<ArticleId, Value>>>,
    changes: broadcast::Sender<ChangeNotice>,
    clock: MonotonicClock,
    offline: AtomicBool,
    requests: AtomicUsize,
    listeners: Arc<AtomicUsize>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Arc::new(Self {
            collections: RwLock::new(HashMap::new()),
            changes,
            clock: MonotonicClock::new(),
            offline: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
            listeners: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// While offline every request fails with `Transport`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Requests that reached the backend, successful or not.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Open change feeds.
    pub fn active_listeners(&self) -> usize {
        self.listeners.load(Ordering::SeqCst)
    }

    fn begin_request(&self) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Transport("backend unreachable".to_string()));
        }
        Ok(())
    }

    fn notify(&self, user: &UserId) {
        // No receivers just means nobody is listening.
        let _ = self.changes.send(ChangeNotice { user: user.clone() });
    }

    async fn put(&self, user: &UserId, article: &Article, url: &str) -> Result<ArticleId> {
        self.begin_request()?;
        let id = identify(url);
        let document = SavedArticleDocument::from_article(article, self.clock.now_millis());
        let value = serde_json::to_value(&document)?;
        self.collections
            .write()
            .await
            .entry(user.clone())
            .or_default()
            .insert(id.clone(), value);
        self.notify(user);
        Ok(id)
    }

    async fn remove(&self, user: &UserId, id: &ArticleId) -> Result<()> {
        self.begin_request()?;
        let removed = self
            .collections
            .write()
            .await
            .get_mut(user)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            self.notify(user);
        }
        Ok(())
    }

    async fn contains(&self, user: &UserId, id: &ArticleId) -> Result<bool> {
        self.begin_request()?;
        Ok(self
            .collections
            .read()
            .await
            .get(user)
            .map(|docs| docs.contains_key(id))
            .unwrap_or(false))
    }

    async fn snapshot(&self, user: &UserId) -> Result<Vec<SavedArticle>> {
        self.begin_request()?;
        let collections = self.collections.read().await;
        let mut records = match collections.get(user) {
            Some(docs) => docs
                .iter()
                .map(|(id, value)| {
                    let document: SavedArticleDocument = serde_json::from_value(value.clone())?;
                    Ok(document.into_saved(id.clone()))
                })
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        sort_newest_first(&mut records);
        Ok(records)
    }

    #[cfg(test)]
    async fn raw_document(&self, user: &UserId, id: &ArticleId) -> Option<Value> {
        self.collections.read().await.get(user)?.get(id).cloned()
    }
}

/// A client of a [`MemoryBackend`], scoped to whoever its identity provider
/// reports as signed in.
pub struct MemoryStorage {
    backend: Arc<MemoryBackend>,
    identity: Arc<dyn IdentityProvider>,
    config: BackendConfig,
}

impl MemoryStorage {
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self::attach(MemoryBackend::new(), identity)
    }

    /// Another client of an existing backend.
    pub fn attach(backend: Arc<MemoryBackend>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            backend,
            identity,
            config: BackendConfig::new("memory://"),
        }
    }

    pub fn backend(&self) -> &Arc<MemoryBackend> {
        &self.backend
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn connect(config: BackendConfig, identity: Arc<dyn IdentityProvider>) -> Result<Self> {
        let mut storage = Self::new(identity);
        storage.config = config;
        Ok(storage)
    }

    fn get_config(&self) -> &BackendConfig {
        &self.config
    }
}

#[async_trait]
impl SavedArticleStore for MemoryStorage {
    async fn save(&self, article: &Article) -> Result<()> {
        let user = require_user(self.identity.as_ref())?;
        let url = require_url(article.url())?;
        match self.backend.put(&user, article, url).await {
            Ok(id) => {
                debug!("Saved {} to {}", id, self.config.collection_path(&user));
                Ok(())
            }
            Err(e) => {
                warn!("Failed to save article {}: {}", url, e);
                Err(e)
            }
        }
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let user = require_user(self.identity.as_ref())?;
        let url = require_url(Some(url))?;
        let id = identify(url);
        self.backend.remove(&user, &id).await?;
        debug!("Deleted {} from {}", id, self.config.collection_path(&user));
        Ok(())
    }

    async fn exists(&self, url: &str) -> bool {
        let Some(user) = self.identity.current_user() else {
            return false;
        };
        if url.is_empty() {
            return false;
        }
        match self.backend.contains(&user, &identify(url)).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Error checking saved status: {}", e);
                false
            }
        }
    }

    async fn list_once(&self) -> Result<Vec<SavedArticle>> {
        let user = require_user(self.identity.as_ref())?;
        let records = self.backend.snapshot(&user).await?;
        debug!("Retrieved {} saved articles", records.len());
        Ok(records)
    }

    fn subscribe(&self) -> Subscription {
        let user = match require_user(self.identity.as_ref()) {
            Ok(user) => user,
            Err(e) => return Subscription::failed(e),
        };
        let changes = self.backend.changes.subscribe();
        let guard = ListenerGuard::new(self.backend.listeners.clone());
        let backend = self.backend.clone();
        let feed_user = user.clone();
        spawn_feed(user, changes, guard, move || {
            let backend = backend.clone();
            let user = feed_user.clone();
            async move { backend.snapshot(&user).await }
        })
    }
}
