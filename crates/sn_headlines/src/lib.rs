pub mod fixed;
pub mod newsapi;

pub use fixed::StaticHeadlineSource;
pub use newsapi::{NewsApiConfig, NewsApiSource};

pub mod prelude {
    pub use super::{NewsApiConfig, NewsApiSource, StaticHeadlineSource};
    pub use sn_core::{Article, Category, Error, HeadlineSource, Result};
}
