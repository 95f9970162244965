use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::Category;
use crate::Result;

/// Device-local preferences. None of these leave the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSettings {
    pub dark_mode: bool,
    pub news_api_key: Option<String>,
    pub selected_category: Category,
    pub country: String,
    pub user_email: Option<String>,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            dark_mode: false,
            news_api_key: None,
            selected_category: Category::General,
            country: "us".to_string(),
            user_email: None,
        }
    }
}

impl LocalSettings {
    /// Saved API key, ignoring blank values.
    pub fn api_key(&self) -> Option<&str> {
        self.news_api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<LocalSettings>;

    async fn save(&self, settings: &LocalSettings) -> Result<()>;

    /// Resets everything to defaults, as on sign-out.
    async fn clear(&self) -> Result<()>;
}

/// Settings kept as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn load(&self) -> Result<LocalSettings> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {}, using defaults", self.path.display());
                Ok(LocalSettings::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, settings: &LocalSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let raw = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.save(&LocalSettings::default()).await
    }
}

/// Masks an API key for display, keeping the first and last four characters.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 8), tail)
}
