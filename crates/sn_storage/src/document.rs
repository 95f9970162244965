use serde::{Deserialize, Serialize};
use sn_core::{Article, ArticleId, SavedArticle, Source};

/// Stored form of a saved article.
///
/// Field names are the remote layout; the article id is the document key and
/// is never written inside the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedArticleDocument {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: Option<String>,
    pub url_to_image: Option<String>,
    #[serde(default)]
    pub published_at: String,
    pub author: Option<String>,
    #[serde(default)]
    pub saved_timestamp: i64,
    #[serde(default)]
    pub source: SourceDocument,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: Option<String>,
    pub name: Option<String>,
}

impl SavedArticleDocument {
    pub fn from_article(article: &Article, saved_timestamp: i64) -> Self {
        Self {
            title: article.title.clone(),
            description: article.description.clone(),
            content: article.content.clone(),
            url: article.canonical_url.clone(),
            url_to_image: article.image_url.clone(),
            published_at: article.published_at.clone(),
            author: article.author.clone(),
            saved_timestamp,
            source: SourceDocument {
                id: article.source.id.clone(),
                name: article.source.name.clone(),
            },
        }
    }

    pub fn into_saved(self, article_id: ArticleId) -> SavedArticle {
        SavedArticle {
            article_id,
            saved_at: self.saved_timestamp,
            article: Article {
                title: self.title,
                description: self.description,
                content: self.content,
                canonical_url: self.url,
                image_url: self.url_to_image,
                published_at: self.published_at,
                author: self.author,
                source: Source {
                    id: self.source.id,
                    name: self.source.name,
                },
            },
        }
    }
}

/// Newest first; ties broken by key so snapshots are stable.
pub fn sort_newest_first(records: &mut [SavedArticle]) {
    records.sort_by(|a, b| {
        b.saved_at
            .cmp(&a.saved_at)
            .then_with(|| a.article_id.cmp(&b.article_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Article {
        Article {
            title: "Rust 2.0 announced".to_string(),
            description: Some("Not really".to_string()),
            content: None,
            canonical_url: Some("https://example.com/rust".to_string()),
            image_url: Some("https://example.com/rust.png".to_string()),
            published_at: "2024-04-01T08:00:00Z".to_string(),
            author: None,
            source: Source {
                id: Some("example".to_string()),
                name: Some("Example News".to_string()),
            },
        }
    }

    #[test]
    fn test_document_layout() {
        let doc = SavedArticleDocument::from_article(&sample(), 1_700_000_000_000);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            json!({
                "title": "Rust 2.0 announced",
                "description": "Not really",
                "content": null,
                "url": "https://example.com/rust",
                "urlToImage": "https://example.com/rust.png",
                "publishedAt": "2024-04-01T08:00:00Z",
                "author": null,
                "savedTimestamp": 1_700_000_000_000i64,
                "source": {"id": "example", "name": "Example News"}
            })
        );
        assert!(value.get("articleId").is_none());
    }

    #[test]
    fn test_document_tolerates_missing_fields() {
        let doc: SavedArticleDocument =
            serde_json::from_value(json!({"url": "https://example.com/x"})).unwrap();
        let saved = doc.into_saved(ArticleId::new("article_x"));
        assert_eq!(saved.article.url(), Some("https://example.com/x"));
        assert_eq!(saved.saved_at, 0);
        assert_eq!(saved.article.source, Source::default());
    }

    #[test]
    fn test_sort_newest_first() {
        let record = |id: &str, at: i64| SavedArticle {
            article_id: ArticleId::new(id),
            article: Article::default(),
            saved_at: at,
        };
        let mut records = vec![record("b", 1), record("c", 3), record("a", 3)];
        sort_newest_first(&mut records);
        let ids: Vec<_> = records.iter().map(|r| r.article_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }
}
