use sn_core::Article;
use thiserror::Error;

/// Names the card a swipe was made on: the deck generation it was shown
/// from plus the article's URL. Positions are never used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRef {
    pub generation: u64,
    pub url: Option<String>,
}

impl ArticleRef {
    pub fn new(generation: u64, article: &Article) -> Self {
        Self {
            generation,
            url: article.url().map(str::to_string),
        }
    }

    fn matches(&self, article: &Article) -> bool {
        self.url.as_deref() == article.url()
    }
}

/// Why a swipe left the deck untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwipeRejection {
    #[error("swipe was made on deck generation {got}, current is {current}")]
    StaleGeneration { current: u64, got: u64 },
    #[error("deck is exhausted")]
    Exhausted,
    #[error("article {url:?} is not on top of the deck")]
    NotOnTop { url: Option<String> },
}

/// Ordered, finite queue of candidate articles with a read cursor.
///
/// Invariant: `cursor <= articles.len()`. Every `load` starts a new
/// generation.
#[derive(Debug, Default)]
pub struct Deck {
    articles: Vec<Article>,
    cursor: usize,
    generation: u64,
}

impl Deck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the deck wholesale and returns the new generation.
    pub fn load(&mut self, articles: Vec<Article>) -> u64 {
        self.articles = articles;
        self.cursor = 0;
        self.generation += 1;
        self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.articles.len() - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.articles.len()
    }

    pub fn top(&self) -> Option<&Article> {
        self.articles.get(self.cursor)
    }

    /// Reference to the top card, for tagging a gesture.
    pub fn top_ref(&self) -> Option<ArticleRef> {
        self.top().map(|a| ArticleRef::new(self.generation, a))
    }

    /// Up to `n` unconsumed articles, top first.
    pub fn peek_window(&self, n: usize) -> &[Article] {
        let end = self.cursor.saturating_add(n).min(self.articles.len());
        &self.articles[self.cursor..end]
    }

    /// Consumes the top article if `target` names it.
    pub fn consume(&mut self, target: &ArticleRef) -> Result<Article, SwipeRejection> {
        if target.generation != self.generation {
            return Err(SwipeRejection::StaleGeneration {
                current: self.generation,
                got: target.generation,
            });
        }
        let top = self.top().ok_or(SwipeRejection::Exhausted)?;
        if !target.matches(top) {
            return Err(SwipeRejection::NotOnTop {
                url: target.url.clone(),
            });
        }
        let article = top.clone();
        self.cursor += 1;
        Ok(article)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn articles(n: usize) -> Vec<Article> {
        (0..n)
            .map(|i| Article::new(format!("Story {}", i), format!("https://example.com/{}", i)))
            .collect()
    }

    #[test]
    fn test_load_resets_cursor_and_bumps_generation() {
        let mut deck = Deck::new();
        assert_eq!(deck.generation(), 0);
        assert!(deck.is_exhausted());

        assert_eq!(deck.load(articles(3)), 1);
        let top = deck.top_ref().unwrap();
        deck.consume(&top).unwrap();
        assert_eq!(deck.cursor(), 1);

        assert_eq!(deck.load(articles(2)), 2);
        assert_eq!(deck.cursor(), 0);
        assert_eq!(deck.len(), 2);
    }

    #[test]
    fn test_consume_until_exhausted() {
        let mut deck = Deck::new();
        deck.load(articles(4));
        for i in 0..4 {
            assert!(!deck.is_exhausted());
            let consumed = deck.consume(&deck.top_ref().unwrap()).unwrap();
            assert_eq!(consumed.title, format!("Story {}", i));
        }
        assert!(deck.is_exhausted());
        assert_eq!(deck.remaining(), 0);

        let late = ArticleRef { generation: 1, url: Some("https://example.com/3".to_string()) };
        assert_eq!(deck.consume(&late), Err(SwipeRejection::Exhausted));
        assert_eq!(deck.cursor(), 4);
    }

    #[test]
    fn test_stale_generation_is_rejected() {
        let mut deck = Deck::new();
        deck.load(articles(3));
        let old = deck.top_ref().unwrap();
        deck.load(articles(3));

        assert_eq!(
            deck.consume(&old),
            Err(SwipeRejection::StaleGeneration { current: 2, got: 1 })
        );
        assert_eq!(deck.cursor(), 0);
    }

    #[test]
    fn test_wrong_article_is_rejected() {
        let mut deck = Deck::new();
        let generation = deck.load(articles(3));
        let second = ArticleRef { generation, url: Some("https://example.com/1".to_string()) };
        assert!(matches!(deck.consume(&second), Err(SwipeRejection::NotOnTop { .. })));
        assert_eq!(deck.cursor(), 0);
    }

    #[test]
    fn test_articles_without_url_can_be_swiped() {
        let mut deck = Deck::new();
        let generation = deck.load(vec![Article { title: "Untitled".to_string(), ..Default::default() }]);
        let target = ArticleRef { generation, url: None };
        assert_eq!(deck.consume(&target).unwrap().title, "Untitled");
        assert!(deck.is_exhausted());
    }

    #[test]
    fn test_peek_window() {
        let mut deck = Deck::new();
        deck.load(articles(5));
        assert_eq!(deck.peek_window(3).len(), 3);
        assert_eq!(deck.peek_window(10).len(), 5);
        assert_eq!(deck.peek_window(0).len(), 0);

        for _ in 0..4 {
            deck.consume(&deck.top_ref().unwrap()).unwrap();
        }
        let window = deck.peek_window(3);
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].title, "Story 4");
        assert_eq!(deck.cursor(), 4);
    }
}
