use async_trait::async_trait;

use crate::types::{Article, Category};
use crate::{Error, Result};

#[async_trait]
pub trait HeadlineSource: Send + Sync {
    /// Returns the name of the headline provider
    fn name(&self) -> &str;

    /// Fetches the current headlines for a category, in provider order
    async fn fetch_headlines(&self, category: Category) -> Result<Vec<Article>>;

    /// Free-text search, newest first
    async fn search(&self, query: &str) -> Result<Vec<Article>> {
        Err(Error::InvalidInput(format!(
            "{} cannot search for \"{}\"",
            self.name(),
            query
        )))
    }
}
