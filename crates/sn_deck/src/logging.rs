use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Tags log lines with the deck they concern, e.g. `[technology] [deck#3]`.
#[derive(Debug, Clone)]
pub struct DeckLogger {
    tag: String,
}

impl DeckLogger {
    pub fn for_deck(label: &str, generation: u64) -> Self {
        Self {
            tag: format!("[{}] [deck#{}]", label, generation),
        }
    }

    pub fn info(&self, message: &str) {
        tracing::info!("{} {}", self.tag, message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!("{} {}", self.tag, message);
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!("{} {}", self.tag, message);
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!("{} {}", self.tag, message);
    }
}

/// Installs the fmt subscriber once. `RUST_LOG` overrides the INFO default.
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}
