use async_trait::async_trait;
use sn_core::{
    identify, Article, ArticleId, Error, IdentityProvider, Result, SavedArticle,
    SavedArticleStore, Source, Subscription, UserId,
};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::clock::MonotonicClock;
use crate::document::sort_newest_first;
use crate::feed::{spawn_feed, ChangeNotice, ListenerGuard};
use crate::{require_url, require_user, BackendConfig, StorageBackend};

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS saved_articles (
        user_id TEXT NOT NULL,
        article_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT,
        content TEXT,
        url TEXT,
        url_to_image TEXT,
        published_at TEXT NOT NULL,
        author TEXT,
        source_id TEXT,
        source_name TEXT,
        saved_timestamp INTEGER NOT NULL,
        PRIMARY KEY (user_id, article_id)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS saved_articles_by_time
    ON saved_articles (user_id, saved_timestamp DESC)
    "#,
];

const CHANGE_BUFFER: usize = 64;
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Row count, newest timestamp and timestamp sum of one user's collection.
type Fingerprint = (i64, i64, i64);

fn transport(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Transport(format!("{}: {}", context, e))
}

/// Saved articles in a SQLite file.
///
/// Writes through this client notify its feeds at once. Writes by any other
/// client of the same file are picked up by a watcher that polls per-user
/// fingerprints while the storage is alive.
pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
    watcher: JoinHandle<()>,
    identity: Arc<dyn IdentityProvider>,
    changes: broadcast::Sender<ChangeNotice>,
    listeners: Arc<AtomicUsize>,
    clock: MonotonicClock,
    config: BackendConfig,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    async fn connect(config: BackendConfig, identity: Arc<dyn IdentityProvider>) -> Result<Self> {
        let db_path = PathBuf::from(config.url.trim_start_matches("sqlite://"));
        let mut storage = Self::new_with_path(&db_path, identity).await?;
        storage.config = config;
        Ok(storage)
    }

    fn get_config(&self) -> &BackendConfig {
        &self.config
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path, identity: Arc<dyn IdentityProvider>) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pool = SqlitePool::connect(&format!("sqlite://{}?mode=rwc", db_path.display()))
            .await
            .map_err(transport("Failed to connect to database"))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Transport(format!("Failed to run migration {}: {}", i, e)))?;
        }

        let pool = Arc::new(pool);
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        let listeners = Arc::new(AtomicUsize::new(0));
        let baseline = fingerprints(&pool).await?;
        let watcher = spawn_watcher(
            pool.clone(),
            changes.clone(),
            listeners.clone(),
            baseline,
            POLL_INTERVAL,
        );
        Ok(Self {
            pool,
            watcher,
            identity,
            changes,
            listeners,
            clock: MonotonicClock::new(),
            config: BackendConfig::new(format!("sqlite://{}", db_path.display())),
        })
    }

    pub fn active_listeners(&self) -> usize {
        self.listeners.load(Ordering::SeqCst)
    }

    fn notify(&self, user: &UserId) {
        let _ = self.changes.send(ChangeNotice { user: user.clone() });
    }
}

impl Drop for SQLiteStorage {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

async fn fingerprints(pool: &SqlitePool) -> Result<HashMap<String, Fingerprint>> {
    let rows = sqlx::query(
        r#"
        SELECT user_id, COUNT(*) AS n, MAX(saved_timestamp) AS latest, SUM(saved_timestamp) AS total
        FROM saved_articles
        GROUP BY user_id
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(transport("Failed to check for changes"))?;

    rows.iter()
        .map(|row| {
            let get = |e: sqlx::Error| Error::Transport(format!("Malformed row: {}", e));
            let user: String = row.try_get("user_id").map_err(get)?;
            let n: i64 = row.try_get("n").map_err(get)?;
            let latest: i64 = row.try_get("latest").map_err(get)?;
            let total: i64 = row.try_get("total").map_err(get)?;
            Ok((user, (n, latest, total)))
        })
        .collect()
}

/// Users whose collection differs between two fingerprint sets, including
/// users whose last record was deleted.
fn changed_users(
    before: &HashMap<String, Fingerprint>,
    after: &HashMap<String, Fingerprint>,
) -> Vec<String> {
    let users: HashSet<&String> = before.keys().chain(after.keys()).collect();
    let mut changed: Vec<String> = users
        .into_iter()
        .filter(|user| before.get(*user) != after.get(*user))
        .cloned()
        .collect();
    changed.sort();
    changed
}

fn spawn_watcher(
    pool: Arc<SqlitePool>,
    changes: broadcast::Sender<ChangeNotice>,
    listeners: Arc<AtomicUsize>,
    mut seen: HashMap<String, Fingerprint>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let current = match fingerprints(&pool).await {
                Ok(current) => current,
                Err(e) => {
                    warn!("Change check failed: {}", e);
                    continue;
                }
            };
            // Unobserved changes are absorbed; new feeds start from a snapshot.
            if listeners.load(Ordering::SeqCst) > 0 {
                for user in changed_users(&seen, &current) {
                    debug!("Detected external change for {}", user);
                    let _ = changes.send(ChangeNotice {
                        user: UserId::new(user),
                    });
                }
            }
            seen = current;
        }
    })
}

fn row_to_saved(row: &SqliteRow) -> Result<SavedArticle> {
    let get = |e: sqlx::Error| Error::Transport(format!("Malformed row: {}", e));
    Ok(SavedArticle {
        article_id: ArticleId::new(row.try_get::<String, _>("article_id").map_err(get)?),
        saved_at: row.try_get("saved_timestamp").map_err(get)?,
        article: Article {
            title: row.try_get("title").map_err(get)?,
            description: row.try_get("description").map_err(get)?,
            content: row.try_get("content").map_err(get)?,
            canonical_url: row.try_get("url").map_err(get)?,
            image_url: row.try_get("url_to_image").map_err(get)?,
            published_at: row.try_get("published_at").map_err(get)?,
            author: row.try_get("author").map_err(get)?,
            source: Source {
                id: row.try_get("source_id").map_err(get)?,
                name: row.try_get("source_name").map_err(get)?,
            },
        },
    })
}

async fn load_snapshot(pool: &SqlitePool, user: &UserId) -> Result<Vec<SavedArticle>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM saved_articles
        WHERE user_id = ?
        ORDER BY saved_timestamp DESC, article_id ASC
        "#,
    )
    .bind(user.as_str())
    .fetch_all(pool)
    .await
    .map_err(transport("Failed to load saved articles"))?;

    let mut records = rows.iter().map(row_to_saved).collect::<Result<Vec<_>>>()?;
    sort_newest_first(&mut records);
    Ok(records)
}

#[async_trait]
impl SavedArticleStore for SQLiteStorage {
    async fn save(&self, article: &Article) -> Result<()> {
        let user = require_user(self.identity.as_ref())?;
        let url = require_url(article.url())?;
        let id = identify(url);

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO saved_articles
            (user_id, article_id, title, description, content, url, url_to_image,
             published_at, author, source_id, source_name, saved_timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.as_str())
        .bind(id.as_str())
        .bind(&article.title)
        .bind(article.description.as_deref())
        .bind(article.content.as_deref())
        .bind(url)
        .bind(article.image_url.as_deref())
        .bind(&article.published_at)
        .bind(article.author.as_deref())
        .bind(article.source.id.as_deref())
        .bind(article.source.name.as_deref())
        .bind(self.clock.now_millis())
        .execute(&*self.pool)
        .await
        .map_err(transport("Failed to save article"))?;

        debug!("Saved {} to {}", id, self.config.collection_path(&user));
        self.notify(&user);
        Ok(())
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let user = require_user(self.identity.as_ref())?;
        let url = require_url(Some(url))?;
        let id = identify(url);

        let result = sqlx::query("DELETE FROM saved_articles WHERE user_id = ? AND article_id = ?")
            .bind(user.as_str())
            .bind(id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(transport("Failed to delete article"))?;

        if result.rows_affected() > 0 {
            self.notify(&user);
        }
        Ok(())
    }

    async fn exists(&self, url: &str) -> bool {
        let Some(user) = self.identity.current_user() else {
            return false;
        };
        if url.is_empty() {
            return false;
        }
        let found = sqlx::query("SELECT 1 FROM saved_articles WHERE user_id = ? AND article_id = ?")
            .bind(user.as_str())
            .bind(identify(url).as_str())
            .fetch_optional(&*self.pool)
            .await;
        match found {
            Ok(row) => row.is_some(),
            Err(e) => {
                warn!("Error checking saved status: {}", e);
                false
            }
        }
    }

    async fn list_once(&self) -> Result<Vec<SavedArticle>> {
        let user = require_user(self.identity.as_ref())?;
        load_snapshot(&self.pool, &user).await
    }

    fn subscribe(&self) -> Subscription {
        let user = match require_user(self.identity.as_ref()) {
            Ok(user) => user,
            Err(e) => return Subscription::failed(e),
        };
        let changes = self.changes.subscribe();
        let guard = ListenerGuard::new(self.listeners.clone());
        let pool = self.pool.clone();
        let feed_user = user.clone();
        spawn_feed(user, changes, guard, move || {
            let pool = pool.clone();
            let user = feed_user.clone();
            async move { load_snapshot(&pool, &user).await }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sn_core::{FeedEvent, LocalIdentity};
    use std::time::Duration;
    use tempfile::tempdir;

    fn identity(user: &str) -> Arc<dyn IdentityProvider> {
        Arc::new(LocalIdentity::signed_in(UserId::new(user)))
    }

    #[tokio::test]
    async fn test_sqlite_storage() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let storage = SQLiteStorage::new_with_path(&db_path, identity("uid_1")).await.unwrap();

        let mut article = Article::new("Old title", "https://example.com/1");
        article.source.name = Some("Example".to_string());
        storage.save(&article).await.unwrap();
        article.title = "New title".to_string();
        storage.save(&article).await.unwrap();
        storage.save(&Article::new("Other", "https://example.com/2")).await.unwrap();

        let saved = storage.list_once().await.unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].article.title, "Other");
        assert_eq!(saved[1].article.title, "New title");
        assert_eq!(saved[1].article.source.name.as_deref(), Some("Example"));

        storage.delete("https://example.com/1").await.unwrap();
        storage.delete("https://example.com/1").await.unwrap();
        assert!(!storage.exists("https://example.com/1").await);
        assert!(storage.exists("https://example.com/2").await);
    }

    #[tokio::test]
    async fn test_sqlite_survives_reopen() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        {
            let storage = SQLiteStorage::new_with_path(&db_path, identity("uid_1")).await.unwrap();
            storage.save(&Article::new("Kept", "https://example.com/kept")).await.unwrap();
        }
        let reopened = SQLiteStorage::new_with_path(&db_path, identity("uid_1")).await.unwrap();
        let saved = reopened.list_once().await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].article_id, identify("https://example.com/kept"));

        let stranger = SQLiteStorage::new_with_path(&db_path, identity("uid_2")).await.unwrap();
        assert!(stranger.list_once().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_subscription() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("feed.db"), identity("uid_1"))
            .await
            .unwrap();

        let mut feed = storage.subscribe();
        let first = tokio::time::timeout(Duration::from_secs(2), feed.next()).await.unwrap();
        assert!(matches!(first, Some(FeedEvent::Snapshot(ref r)) if r.is_empty()));

        storage.save(&Article::new("A", "https://example.com/a")).await.unwrap();
        match tokio::time::timeout(Duration::from_secs(2), feed.next()).await.unwrap() {
            Some(FeedEvent::Snapshot(records)) => assert_eq!(records.len(), 1),
            other => panic!("expected snapshot, got {:?}", other),
        }

        feed.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(storage.active_listeners(), 0);
    }

    async fn next_snapshot(feed: &mut Subscription) -> Vec<SavedArticle> {
        match tokio::time::timeout(Duration::from_secs(3), feed.next()).await {
            Ok(Some(FeedEvent::Snapshot(records))) => records,
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sqlite_feed_sees_other_clients() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("shared.db");
        let phone = SQLiteStorage::new_with_path(&db_path, identity("uid_1")).await.unwrap();
        let tablet = SQLiteStorage::new_with_path(&db_path, identity("uid_1")).await.unwrap();

        let mut feed = tablet.subscribe();
        assert!(next_snapshot(&mut feed).await.is_empty());

        phone.save(&Article::new("A", "https://example.com/a")).await.unwrap();
        let records = next_snapshot(&mut feed).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].article.title, "A");

        phone.delete("https://example.com/a").await.unwrap();
        while !next_snapshot(&mut feed).await.is_empty() {}
    }

    #[test]
    fn test_changed_users() {
        let before = HashMap::from([
            ("uid_1".to_string(), (1, 10, 10)),
            ("uid_2".to_string(), (2, 20, 30)),
        ]);
        let after = HashMap::from([
            ("uid_2".to_string(), (2, 25, 35)),
            ("uid_3".to_string(), (1, 30, 30)),
        ]);
        assert_eq!(changed_users(&before, &after), vec!["uid_1", "uid_2", "uid_3"]);
        assert!(changed_users(&after, &after).is_empty());
    }
}
