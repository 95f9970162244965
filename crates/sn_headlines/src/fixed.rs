use async_trait::async_trait;
use sn_core::{Article, Category, Error, HeadlineSource, Result, Source};
use std::collections::HashMap;
use std::sync::RwLock;

/// Serves preconfigured headlines per category. Used for offline runs.
#[derive(Debug, Default)]
pub struct StaticHeadlineSource {
    articles: RwLock<HashMap<Category, Vec<Article>>>,
    failing: RwLock<Option<String>>,
}

impl StaticHeadlineSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(self, category: Category, articles: Vec<Article>) -> Self {
        self.set_category(category, articles);
        self
    }

    pub fn set_category(&self, category: Category, articles: Vec<Article>) {
        self.articles
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(category, articles);
    }

    /// Makes every fetch fail with `Transport(message)` until cleared.
    pub fn set_failing(&self, message: Option<&str>) {
        *self.failing.write().unwrap_or_else(|e| e.into_inner()) = message.map(str::to_string);
    }

    /// A small built-in set of headlines for every category.
    pub fn sample() -> Self {
        let source = Self::new();
        for category in Category::all() {
            let articles = (1..=5)
                .map(|i| Article {
                    title: format!("{} headline #{}", category.label(), i),
                    description: Some(format!("Sample {} story number {}.", category, i)),
                    content: None,
                    canonical_url: Some(format!("https://news.example.com/{}/{}", category, i)),
                    image_url: None,
                    published_at: format!("2024-06-{:02}T09:00:00Z", i),
                    author: None,
                    source: Source {
                        id: Some("example".to_string()),
                        name: Some("Example News".to_string()),
                    },
                })
                .collect();
            source.set_category(category, articles);
        }
        source
    }
}

#[async_trait]
impl HeadlineSource for StaticHeadlineSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_headlines(&self, category: Category) -> Result<Vec<Article>> {
        if let Some(message) = self.failing.read().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(Error::Transport(message));
        }
        Ok(self
            .articles
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&category)
            .cloned()
            .unwrap_or_default())
    }

    /// Case-insensitive match on title or description across every category.
    async fn search(&self, query: &str) -> Result<Vec<Article>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(Error::InvalidInput("Search query must not be empty".to_string()));
        }
        if let Some(message) = self.failing.read().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(Error::Transport(message));
        }
        let articles = self.articles.read().unwrap_or_else(|e| e.into_inner());
        Ok(Category::all()
            .iter()
            .filter_map(|category| articles.get(category))
            .flatten()
            .filter(|article| {
                article.title.to_lowercase().contains(&needle)
                    || article
                        .description
                        .as_deref()
                        .map(|d| d.to_lowercase().contains(&needle))
                        .unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}
