use async_trait::async_trait;
use sn_core::{Error, IdentityProvider, Result, SavedArticleStore, UserId};
use std::fmt;
use std::sync::Arc;
use tracing::info;

pub mod backends;
pub mod clock;
pub mod document;
pub mod feed;

pub use backends::*;
pub use document::SavedArticleDocument;

#[async_trait]
pub trait StorageBackend: SavedArticleStore {
    async fn connect(config: BackendConfig, identity: Arc<dyn IdentityProvider>) -> Result<Self>
    where
        Self: Sized;

    fn get_config(&self) -> &BackendConfig;
}

/// Where a backend lives and how its collections are named.
#[derive(Clone)]
pub struct BackendConfig {
    pub url: String,
    pub users_collection: String,
    pub saved_collection: String,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            users_collection: "users".to_string(),
            saved_collection: "saved_articles".to_string(),
        }
    }

    /// Path of a user's collection, e.g. `users/uid_1/saved_articles`.
    pub fn collection_path(&self, user: &UserId) -> String {
        format!("{}/{}/{}", self.users_collection, user, self.saved_collection)
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url)
            .field("collection", &format!("{}/*/{}", self.users_collection, self.saved_collection))
            .finish()
    }
}

pub(crate) fn require_user(identity: &dyn IdentityProvider) -> Result<UserId> {
    identity.current_user().ok_or(Error::Unauthenticated)
}

pub(crate) fn require_url(url: Option<&str>) -> Result<&str> {
    url.filter(|u| !u.is_empty())
        .ok_or_else(|| Error::InvalidInput("Article has no URL".to_string()))
}

/// Builds a store by backend name (`memory`, or `sqlite` when compiled in).
pub async fn create_storage(
    kind: &str,
    backend_url: Option<&str>,
    identity: Arc<dyn IdentityProvider>,
) -> Result<Arc<dyn SavedArticleStore>> {
    match kind {
        "memory" => {
            let config = BackendConfig::new(backend_url.unwrap_or("memory://"));
            connect_backend::<MemoryStorage>(config, identity).await
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let config = BackendConfig::new(backend_url.unwrap_or("saved_articles.db"));
            connect_backend::<SQLiteStorage>(config, identity).await
        }
        other => Err(Error::Config(format!("Unknown storage backend: {}", other))),
    }
}

async fn connect_backend<T: StorageBackend + 'static>(
    config: BackendConfig,
    identity: Arc<dyn IdentityProvider>,
) -> Result<Arc<dyn SavedArticleStore>> {
    let storage = T::connect(config, identity).await?;
    info!("🏦 Connected storage backend {:?}", storage.get_config());
    Ok(Arc::new(storage))
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, BackendConfig, StorageBackend};
}

#[cfg(test)]
mod tests {
    use super::*;
    use sn_core::LocalIdentity;

    #[tokio::test]
    async fn test_create_storage() {
        let identity: Arc<dyn IdentityProvider> = Arc::new(LocalIdentity::new());
        assert!(create_storage("memory", None, identity.clone()).await.is_ok());
        assert!(matches!(
            create_storage("firestore", None, identity).await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_keeps_config() {
        let identity: Arc<dyn IdentityProvider> = Arc::new(LocalIdentity::new());
        let storage = MemoryStorage::connect(BackendConfig::new("memory://phone"), identity)
            .await
            .unwrap();
        assert_eq!(storage.get_config().url, "memory://phone");
    }

    #[test]
    fn test_collection_path() {
        let config = BackendConfig::new("memory://");
        assert_eq!(
            config.collection_path(&UserId::new("uid_1")),
            "users/uid_1/saved_articles"
        );
    }
}
