use sn_core::{Article, Category, Error, HeadlineSource, Result, SavedArticleStore};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::deck::{ArticleRef, Deck, SwipeRejection};
use crate::logging::DeckLogger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    /// Keep: the article is saved.
    Accept,
    /// Skip: nothing is stored.
    Discard,
}

/// Immediate result of a gesture. The deck has already advanced for
/// `Accepted` and `Discarded`; persistence is reported later as a
/// [`SaveNotice`].
#[derive(Debug, Clone, PartialEq)]
pub enum SwipeOutcome {
    Accepted(Article),
    Discarded(Article),
    Ignored(SwipeRejection),
}

/// Late result of the save started by an accept swipe.
#[derive(Debug)]
pub enum SaveNotice {
    Saved { generation: u64, article: Article },
    Failed { generation: u64, article: Article, error: Error },
    /// The deck was reloaded while the save was in flight. The result has no
    /// effect on the current deck.
    Stale { generation: u64, article: Article, result: Result<()> },
}

impl SaveNotice {
    pub fn article(&self) -> &Article {
        match self {
            SaveNotice::Saved { article, .. }
            | SaveNotice::Failed { article, .. }
            | SaveNotice::Stale { article, .. } => article,
        }
    }
}

struct CompletedSave {
    generation: u64,
    article: Article,
    result: Result<()>,
}

/// Drives a [`Deck`] from swipe gestures and turns accepts into store writes.
///
/// Owned by a single task. Saves run in the background and never hold up
/// the deck; their results come back through [`DeckController::next_notice`]
/// so that deck state is only touched by the owner.
pub struct DeckController {
    deck: Deck,
    store: Arc<dyn SavedArticleStore>,
    headlines: Arc<dyn HeadlineSource>,
    category: Category,
    query: Option<String>,
    completed_tx: mpsc::UnboundedSender<CompletedSave>,
    completed_rx: mpsc::UnboundedReceiver<CompletedSave>,
    pending: usize,
    logger: DeckLogger,
}

impl DeckController {
    pub fn new(store: Arc<dyn SavedArticleStore>, headlines: Arc<dyn HeadlineSource>) -> Self {
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();
        Self {
            deck: Deck::new(),
            store,
            headlines,
            category: Category::default(),
            query: None,
            completed_tx,
            completed_rx,
            pending: 0,
            logger: DeckLogger::for_deck(Category::default().as_str(), 0),
        }
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// The search the deck was loaded from, if it came from one.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.deck.generation()
    }

    pub fn cursor(&self) -> usize {
        self.deck.cursor()
    }

    pub fn is_exhausted(&self) -> bool {
        self.deck.is_exhausted()
    }

    pub fn peek_window(&self, n: usize) -> &[Article] {
        self.deck.peek_window(n)
    }

    pub fn top_ref(&self) -> Option<ArticleRef> {
        self.deck.top_ref()
    }

    /// Saves started by accept swipes whose results have not been collected.
    pub fn pending_saves(&self) -> usize {
        self.pending
    }

    /// Replaces the deck and returns the new generation. Swipes tagged with
    /// an older generation are ignored from now on.
    pub fn load_deck(&mut self, articles: Vec<Article>) -> u64 {
        let count = articles.len();
        let generation = self.deck.load(articles);
        self.logger = match &self.query {
            Some(query) => DeckLogger::for_deck(&format!("\"{}\"", query), generation),
            None => DeckLogger::for_deck(self.category.as_str(), generation),
        };
        self.logger.info(&format!("Loaded {} articles", count));
        generation
    }

    /// Fetches `category` and loads it. On failure the current deck is kept.
    pub async fn refresh(&mut self, category: Category) -> Result<u64> {
        match self.headlines.fetch_headlines(category).await {
            Ok(articles) => {
                self.category = category;
                self.query = None;
                Ok(self.load_deck(articles))
            }
            Err(e) => {
                self.logger.error(&format!(
                    "Failed to load {} from {}: {}",
                    category,
                    self.headlines.name(),
                    e
                ));
                Err(e)
            }
        }
    }

    /// Loads the results of a free-text search. On failure the current deck
    /// is kept.
    pub async fn search(&mut self, query: &str) -> Result<u64> {
        match self.headlines.search(query).await {
            Ok(articles) => {
                self.query = Some(query.to_string());
                Ok(self.load_deck(articles))
            }
            Err(e) => {
                self.logger.error(&format!(
                    "Search for \"{}\" on {} failed: {}",
                    query,
                    self.headlines.name(),
                    e
                ));
                Err(e)
            }
        }
    }

    /// Re-runs whatever produced the current deck.
    pub async fn reload(&mut self) -> Result<u64> {
        match self.query.clone() {
            Some(query) => self.search(&query).await,
            None => self.refresh(self.category).await,
        }
    }

    /// Applies one gesture to the article named by `target`.
    ///
    /// The cursor advances as soon as the gesture is accepted, before any
    /// save completes, and is not rolled back if the save fails. Must be
    /// called from within a Tokio runtime.
    pub fn on_swipe(&mut self, direction: SwipeDirection, target: &ArticleRef) -> SwipeOutcome {
        let article = match self.deck.consume(target) {
            Ok(article) => article,
            Err(rejection) => {
                self.logger.debug(&format!("Ignored swipe: {}", rejection));
                return SwipeOutcome::Ignored(rejection);
            }
        };

        match direction {
            SwipeDirection::Discard => {
                self.logger.debug(&format!("Article skipped: {}", article.title));
                SwipeOutcome::Discarded(article)
            }
            SwipeDirection::Accept => {
                self.start_save(target.generation, article.clone());
                SwipeOutcome::Accepted(article)
            }
        }
    }

    /// Swipes whatever is on top right now.
    pub fn swipe_top(&mut self, direction: SwipeDirection) -> SwipeOutcome {
        match self.deck.top_ref() {
            Some(target) => self.on_swipe(direction, &target),
            None => SwipeOutcome::Ignored(SwipeRejection::Exhausted),
        }
    }

    fn start_save(&mut self, generation: u64, article: Article) {
        let store = self.store.clone();
        let done = self.completed_tx.clone();
        self.pending += 1;
        tokio::spawn(async move {
            let saving = article.clone();
            // A panic in the store still counts as a finished save.
            let result = match tokio::spawn(async move { store.save(&saving).await }).await {
                Ok(result) => result,
                Err(e) => Err(Error::External(e.into())),
            };
            // The controller may be gone; nobody is left to tell.
            let _ = done.send(CompletedSave {
                generation,
                article,
                result,
            });
        });
    }

    fn classify(&mut self, done: CompletedSave) -> SaveNotice {
        self.pending = self.pending.saturating_sub(1);
        let CompletedSave {
            generation,
            article,
            result,
        } = done;

        if generation != self.deck.generation() {
            self.logger.debug(&format!(
                "Dropping late save result for {} from deck#{}",
                article.title, generation
            ));
            return SaveNotice::Stale {
                generation,
                article,
                result,
            };
        }
        match result {
            Ok(()) => {
                self.logger.info(&format!("Article saved: {}", article.title));
                SaveNotice::Saved {
                    generation,
                    article,
                }
            }
            Err(error) => {
                self.logger.warn(&format!("Save error for {}: {}", article.title, error));
                SaveNotice::Failed {
                    generation,
                    article,
                    error,
                }
            }
        }
    }

    /// Waits for the next save result. `None` when no save is outstanding.
    pub async fn next_notice(&mut self) -> Option<SaveNotice> {
        if self.pending == 0 {
            return None;
        }
        let done = self.completed_rx.recv().await?;
        Some(self.classify(done))
    }

    /// A save result if one has already arrived.
    pub fn try_next_notice(&mut self) -> Option<SaveNotice> {
        let done = self.completed_rx.try_recv().ok()?;
        Some(self.classify(done))
    }
}
