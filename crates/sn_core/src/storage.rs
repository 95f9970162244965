use async_trait::async_trait;

use crate::subscription::Subscription;
use crate::types::{Article, SavedArticle};
use crate::Result;

/// Per-user remote collection of saved articles, keyed by [`crate::identify`].
///
/// Every operation first resolves the signed-in user and fails with
/// `Unauthenticated` without touching the backend when there is none. There
/// are no retries; callers own retry policy. Two saves of the same URL race
/// and the last one acknowledged by the backend wins.
#[async_trait]
pub trait SavedArticleStore: Send + Sync {
    /// Upserts `article` under the key of its URL and stamps `saved_at`.
    /// A re-save replaces the previous record.
    async fn save(&self, article: &Article) -> Result<()>;

    /// Removes the record for `url`. Deleting a missing record succeeds.
    async fn delete(&self, url: &str) -> Result<()>;

    /// Best-effort existence check.
    ///
    /// Transport failures and a missing user both yield `false`, so `false`
    /// is not proof of absence.
    async fn exists(&self, url: &str) -> bool;

    /// All records, newest `saved_at` first.
    async fn list_once(&self) -> Result<Vec<SavedArticle>>;

    /// Opens a change feed delivering the full snapshot on attach and after
    /// every change, from any client. Failures arrive as
    /// [`crate::FeedEvent::Failed`].
    fn subscribe(&self) -> Subscription;
}
