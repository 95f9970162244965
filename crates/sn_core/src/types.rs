use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Publisher of an article, as reported by the headline source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// A fetched headline. Never mutated after it leaves the headline source.
///
/// `canonical_url` is the identity of the article; an article without one can
/// be shown in a deck but cannot be saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub canonical_url: Option<String>,
    pub image_url: Option<String>,
    /// ISO-8601, kept verbatim.
    pub published_at: String,
    pub author: Option<String>,
    pub source: Source,
}

impl Article {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            canonical_url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Non-empty canonical URL, if any.
    pub fn url(&self) -> Option<&str> {
        self.canonical_url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn is_savable(&self) -> bool {
        self.url().is_some()
    }

    pub fn published_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.published_at)
            .ok()
            .map(|d| d.with_timezone(&Utc))
    }

    /// Short display date such as `Mar 04, 2024`. Unparseable values are
    /// returned unchanged.
    pub fn display_date(&self) -> String {
        if self.published_at.is_empty() {
            return "Unknown date".to_string();
        }
        match self.published_at_utc() {
            Some(date) => date.format("%b %d, %Y").to_string(),
            None => self.published_at.clone(),
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.name.as_deref().unwrap_or("Unknown Source")
    }
}

/// Key of a saved article inside a user's collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArticleId(String);

impl ArticleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the storage key for an article URL.
///
/// The key is the first 128 bits of the SHA-256 of the URL, so it is stable
/// across processes and platforms. An empty URL has no identity and gets a
/// time-based key instead; saving such a record twice produces two records.
pub fn identify(url: &str) -> ArticleId {
    if url.is_empty() {
        return ArticleId(format!("article_t{}", Utc::now().timestamp_millis()));
    }
    let digest = Sha256::digest(url.as_bytes());
    let hex: String = digest.iter().take(16).map(|b| format!("{:02x}", b)).collect();
    ArticleId(format!("article_{}", hex))
}

/// An article persisted in a user's saved collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedArticle {
    pub article_id: ArticleId,
    pub article: Article,
    /// Epoch millis, assigned by the store when the save was acknowledged.
    pub saved_at: i64,
}

impl SavedArticle {
    pub fn url(&self) -> Option<&str> {
        self.article.url()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Headline categories understood by the headline source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    General,
    Business,
    Technology,
    Sports,
    Entertainment,
    Health,
    Science,
}

impl Category {
    /// All categories in display order.
    pub fn all() -> [Category; 7] {
        [
            Category::General,
            Category::Technology,
            Category::Business,
            Category::Sports,
            Category::Entertainment,
            Category::Health,
            Category::Science,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Business => "business",
            Category::Technology => "technology",
            Category::Sports => "sports",
            Category::Entertainment => "entertainment",
            Category::Health => "health",
            Category::Science => "science",
        }
    }

    /// Capitalized label, e.g. `Technology`.
    pub fn label(&self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::all()
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown category: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_is_stable() {
        let url = "https://example.com/news/1";
        assert_eq!(identify(url), identify(url));
        // Pinned: ids already stored remotely must keep resolving.
        assert_eq!(identify(url).as_str(), "article_3eaea8abd01c3643b0d4c6bc01f2cd93");
        assert!(identify(url).as_str().starts_with("article_"));
        assert_eq!(identify(url).as_str().len(), "article_".len() + 32);
    }

    #[test]
    fn test_identify_distinguishes_urls() {
        assert_ne!(identify("https://example.com/a"), identify("https://example.com/b"));
        assert_ne!(identify("http://example.com"), identify("https://example.com"));
    }

    #[test]
    fn test_identify_malformed_and_empty() {
        let malformed = identify("not a url at all");
        assert!(malformed.as_str().starts_with("article_"));
        assert!(identify("").as_str().starts_with("article_t"));
    }

    #[test]
    fn test_article_savable() {
        assert!(Article::new("Title", "https://example.com").is_savable());
        assert!(!Article::new("Title", "").is_savable());
        assert!(!Article { title: "No url".to_string(), ..Default::default() }.is_savable());
    }

    #[test]
    fn test_display_date() {
        let mut article = Article::new("Title", "https://example.com");
        assert_eq!(article.display_date(), "Unknown date");
        article.published_at = "2024-03-04T10:15:00Z".to_string();
        assert_eq!(article.display_date(), "Mar 04, 2024");
        article.published_at = "yesterday".to_string();
        assert_eq!(article.display_date(), "yesterday");
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("Technology".parse::<Category>().unwrap(), Category::Technology);
        assert_eq!(" sports ".parse::<Category>().unwrap(), Category::Sports);
        assert!("weather".parse::<Category>().is_err());
        assert_eq!(Category::Health.label(), "Health");
        assert_eq!(Category::default(), Category::General);
    }
}
