use sn_core::{Error, LocalSettings, Result};
use std::path::PathBuf;

pub const API_KEY_ENV: &str = "NEWS_API_KEY";

/// Picks the NewsAPI key: command line first, then the saved settings, then
/// the environment. Blank values are skipped.
pub fn resolve_api_key(
    flag: Option<&str>,
    settings: &LocalSettings,
    env: Option<String>,
) -> Result<String> {
    let from_env = env.as_deref().map(str::trim).filter(|k| !k.is_empty());
    flag.map(str::trim)
        .filter(|k| !k.is_empty())
        .or_else(|| settings.api_key())
        .or(from_env)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::Config(format!(
                "No NewsAPI key configured. Pass --api-key, run `sn settings --set-api-key <key>` or set {}",
                API_KEY_ENV
            ))
        })
}

fn config_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".config").join("sn"),
        None => PathBuf::from(".sn"),
    }
}

pub fn default_settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn default_database_path() -> PathBuf {
    config_dir().join("saved_articles.db")
}

/// Backend location for `kind`: the explicit one, else the per-user SQLite
/// file. Other backends pick their own default.
pub fn storage_location(kind: &str, explicit: Option<&str>) -> Option<String> {
    match explicit {
        Some(url) => Some(url.to_string()),
        None if kind == "sqlite" => Some(default_database_path().display().to_string()),
        None => None,
    }
}

/// Records `email` as the account to sign in with next time. Returns true
/// when the settings changed and need saving.
pub fn remember_user(settings: &mut LocalSettings, email: &str) -> bool {
    let email = email.trim();
    if email.is_empty() || settings.user_email.as_deref() == Some(email) {
        return false;
    }
    settings.user_email = Some(email.to_string());
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_key(key: &str) -> LocalSettings {
        LocalSettings {
            news_api_key: Some(key.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_flag_wins() {
        let key = resolve_api_key(Some("flag-key"), &with_key("saved-key"), Some("env-key".into()));
        assert_eq!(key.unwrap(), "flag-key");
    }

    #[test]
    fn test_settings_before_env() {
        let key = resolve_api_key(None, &with_key("saved-key"), Some("env-key".into()));
        assert_eq!(key.unwrap(), "saved-key");
        let key = resolve_api_key(Some("  "), &with_key(""), Some("env-key".into()));
        assert_eq!(key.unwrap(), "env-key");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = resolve_api_key(None, &LocalSettings::default(), Some(" ".into())).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_default_paths() {
        assert!(default_settings_path().ends_with("settings.json"));
        assert_eq!(default_settings_path().parent(), default_database_path().parent());
    }

    #[test]
    fn test_storage_location() {
        assert_eq!(storage_location("sqlite", Some("/tmp/x.db")).as_deref(), Some("/tmp/x.db"));
        let default = storage_location("sqlite", None).unwrap();
        assert!(default.ends_with("saved_articles.db"));
        assert_eq!(storage_location("memory", None), None);
    }

    #[test]
    fn test_remember_user() {
        let mut settings = LocalSettings::default();
        assert!(remember_user(&mut settings, " reader@example.com "));
        assert_eq!(settings.user_email.as_deref(), Some("reader@example.com"));
        assert!(!remember_user(&mut settings, "reader@example.com"));
        assert!(!remember_user(&mut settings, "  "));
        assert!(remember_user(&mut settings, "other@example.com"));
    }
}
