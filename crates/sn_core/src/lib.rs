pub mod error;
pub mod headlines;
pub mod identity;
pub mod settings;
pub mod storage;
pub mod subscription;
pub mod types;

pub use error::{Error, Result};
pub use headlines::HeadlineSource;
pub use identity::{IdentityProvider, LocalIdentity};
pub use settings::{JsonSettingsStore, LocalSettings, SettingsStore};
pub use storage::SavedArticleStore;
pub use subscription::{Canceller, FeedEvent, Subscription};
pub use types::{identify, Article, ArticleId, Category, SavedArticle, Source, UserId};

pub mod prelude {
    pub use super::{
        Article, ArticleId, Category, Error, FeedEvent, HeadlineSource, IdentityProvider, Result,
        SavedArticle, SavedArticleStore, Subscription,
    };
}
