pub mod controller;
pub mod deck;
pub mod logging;
pub mod saved_list;
pub mod session;

pub use controller::{DeckController, SaveNotice, SwipeDirection, SwipeOutcome};
pub use deck::{ArticleRef, Deck, SwipeRejection};
pub use logging::{init_logging, DeckLogger};
pub use saved_list::SavedList;
pub use session::Session;

pub mod prelude {
    pub use super::{
        ArticleRef, DeckController, SaveNotice, SavedList, Session, SwipeDirection, SwipeOutcome,
    };
    pub use sn_core::{Article, Category, Error, Result};
}
