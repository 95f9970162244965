use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use sn_core::{Article, Category, Error, HeadlineSource, Result, Source};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://newsapi.org/";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsResponse {
    status: String,
    #[serde(default)]
    total_results: u32,
    #[serde(default)]
    articles: Vec<WireArticle>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireArticle {
    source: Option<WireSource>,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireSource {
    id: Option<String>,
    name: Option<String>,
}

impl From<WireArticle> for Article {
    fn from(wire: WireArticle) -> Self {
        let source = wire
            .source
            .map(|s| Source { id: s.id, name: s.name })
            .unwrap_or_default();
        Article {
            title: wire.title.unwrap_or_default(),
            description: wire.description,
            content: wire.content,
            canonical_url: wire.url,
            image_url: wire.url_to_image,
            published_at: wire.published_at.unwrap_or_default(),
            author: wire.author,
            source,
        }
    }
}

#[derive(Clone)]
pub struct NewsApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub country: Option<String>,
    pub language: String,
    pub timeout: Duration,
}

impl NewsApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            country: Some("us".to_string()),
            language: "en".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_country(mut self, country: Option<String>) -> Self {
        self.country = country.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl fmt::Debug for NewsApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("country", &self.country)
            .field("language", &self.language)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Headlines from NewsAPI.org.
pub struct NewsApiSource {
    client: Arc<Client>,
    config: NewsApiConfig,
}

impl NewsApiSource {
    pub fn new(config: NewsApiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("NewsAPI key is not set".to_string()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()?;
        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    pub fn config(&self) -> &NewsApiConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Url::parse(&self.config.base_url)
            .and_then(|base| base.join(path))
            .map_err(|e| Error::Config(format!("Invalid NewsAPI base URL: {}", e)))
    }

    /// `v2/top-headlines` for one category.
    pub fn headlines_url(&self, category: Category) -> Result<Url> {
        let mut url = self.endpoint("v2/top-headlines")?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(country) = &self.config.country {
                query.append_pair("country", country);
            }
            query.append_pair("category", category.as_str());
            query.append_pair("apiKey", &self.config.api_key);
        }
        Ok(url)
    }

    /// `v2/everything` for a free-text query, newest first.
    pub fn search_url(&self, query: &str) -> Result<Url> {
        let mut url = self.endpoint("v2/everything")?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("language", &self.config.language)
            .append_pair("sortBy", "publishedAt")
            .append_pair("apiKey", &self.config.api_key);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<Vec<Article>> {
        debug!("GET {}", url.path());
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        parse_response(status.as_u16(), &body)
    }
}

/// Decodes a NewsAPI body. Error bodies carry a `message` that is surfaced
/// as-is; anything unparseable is reported with the HTTP status.
pub fn parse_response(http_status: u16, body: &str) -> Result<Vec<Article>> {
    let response: NewsResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) if (200..300).contains(&http_status) => return Err(e.into()),
        Err(_) => return Err(Error::Transport(format!("NewsAPI returned HTTP {}", http_status))),
    };

    if response.status != "ok" {
        return Err(Error::Transport(format!(
            "NewsAPI error {}: {}",
            response.code.as_deref().unwrap_or("unknown"),
            response.message.as_deref().unwrap_or("no message")
        )));
    }

    debug!("NewsAPI reported {} total results", response.total_results);
    Ok(response.articles.into_iter().map(Article::from).collect())
}

#[async_trait]
impl HeadlineSource for NewsApiSource {
    fn name(&self) -> &str {
        "NewsAPI"
    }

    async fn fetch_headlines(&self, category: Category) -> Result<Vec<Article>> {
        let articles = self.get(self.headlines_url(category)?).await?;
        info!("📰 Loaded {} {} headlines", articles.len(), category);
        Ok(articles)
    }

    async fn search(&self, query: &str) -> Result<Vec<Article>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("Search query must not be empty".to_string()));
        }
        let articles = self.get(self.search_url(query.trim())?).await?;
        info!("🔎 Found {} articles for \"{}\"", articles.len(), query.trim());
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK_BODY: &str = r#"{
        "status": "ok",
        "totalResults": 2,
        "articles": [
            {
                "source": {"id": null, "name": "Example News"},
                "author": "Jane Doe",
                "title": "Launch succeeds",
                "description": "A rocket went up.",
                "url": "https://example.com/launch",
                "urlToImage": "https://example.com/launch.jpg",
                "publishedAt": "2024-05-01T12:00:00Z",
                "content": "A rocket went up and stayed up."
            },
            {
                "source": {"id": "wire", "name": "Wire"},
                "author": null,
                "title": "[Removed]",
                "description": null,
                "url": null,
                "urlToImage": null,
                "publishedAt": "1970-01-01T00:00:00Z",
                "content": null
            }
        ]
    }"#;

    fn source() -> NewsApiSource {
        NewsApiSource::new(NewsApiConfig::new("test-key")).unwrap()
    }

    #[test]
    fn test_parse_ok_response() {
        let articles = parse_response(200, OK_BODY).unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Launch succeeds");
        assert_eq!(articles[0].url(), Some("https://example.com/launch"));
        assert_eq!(articles[0].source.name.as_deref(), Some("Example News"));
        assert_eq!(articles[0].author.as_deref(), Some("Jane Doe"));
        assert_eq!(articles[1].title, "[Removed]");
        assert!(!articles[1].is_savable());
    }

    #[test]
    fn test_parse_error_response() {
        let body = r#"{"status":"error","code":"apiKeyInvalid","message":"Your API key is invalid."}"#;
        match parse_response(401, body) {
            Err(Error::Transport(msg)) => {
                assert!(msg.contains("apiKeyInvalid"));
                assert!(msg.contains("Your API key is invalid."));
            }
            other => panic!("expected transport error, got {:?}", other),
        }
        assert!(parse_response(502, "<html>bad gateway</html>").unwrap_err().is_transport());
        assert!(matches!(parse_response(200, "not json"), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_headlines_url() {
        let url = source().headlines_url(Category::Technology).unwrap();
        assert_eq!(url.path(), "/v2/top-headlines");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("category".to_string(), "technology".to_string())));
        assert!(pairs.contains(&("country".to_string(), "us".to_string())));
        assert!(pairs.contains(&("apiKey".to_string(), "test-key".to_string())));

        let no_country = NewsApiSource::new(NewsApiConfig::new("k").with_country(None)).unwrap();
        let url = no_country.headlines_url(Category::General).unwrap();
        assert!(url.query_pairs().all(|(k, _)| k != "country"));
    }

    #[test]
    fn test_search_url() {
        let url = source().search_url("rust lang").unwrap();
        assert_eq!(url.path(), "/v2/everything");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("q".to_string(), "rust lang".to_string())));
        assert!(pairs.contains(&("language".to_string(), "en".to_string())));
        assert!(pairs.contains(&("sortBy".to_string(), "publishedAt".to_string())));
    }

    #[tokio::test]
    async fn test_empty_search_skips_request() {
        let source = NewsApiSource::new(NewsApiConfig::new("k").with_base_url("http://127.0.0.1:9/")).unwrap();
        assert!(matches!(source.search("   ").await, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_missing_key_is_config_error() {
        assert!(matches!(NewsApiSource::new(NewsApiConfig::new("  ")), Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", NewsApiConfig::new("super-secret"));
        assert!(!rendered.contains("super-secret"));
    }
}
