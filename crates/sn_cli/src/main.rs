mod config;
mod swipe;

use chrono::{TimeZone, Utc};
use clap::Parser;
use sn_core::settings::mask_api_key;
use sn_core::{
    Category, HeadlineSource, IdentityProvider, JsonSettingsStore, LocalIdentity, LocalSettings,
    SavedArticle, SavedArticleStore, SettingsStore,
};
use sn_deck::{init_logging, Session};
use sn_headlines::{NewsApiConfig, NewsApiSource, StaticHeadlineSource};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Swipe through headlines and keep the ones you like", long_about = None)]
pub struct Cli {
    /// Saved-article backend: sqlite or memory
    #[arg(long, default_value = "sqlite", global = true)]
    storage: String,
    /// Backend location. Defaults to saved_articles.db next to the settings
    #[arg(long, global = true)]
    backend_url: Option<String>,
    /// NewsAPI key, overrides the saved one
    #[arg(long, global = true)]
    api_key: Option<String>,
    /// Two-letter country code for headlines
    #[arg(long, global = true)]
    country: Option<String>,
    /// E-mail to sign in with. Remembered for later runs
    #[arg(long, global = true)]
    user: Option<String>,
    /// Local settings file
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// Use built-in sample headlines instead of NewsAPI
    #[arg(long, global = true)]
    offline: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Swipe through the headlines of a category
    Swipe {
        /// Category to load. Defaults to the saved one
        category: Option<Category>,
        /// Swipe through search results instead of a category
        #[arg(long, conflicts_with = "category")]
        query: Option<String>,
    },
    /// List saved articles
    Saved {
        /// Keep printing the list as it changes, until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
    /// Remove a saved article
    Delete { url: String },
    /// List headline categories
    Categories,
    /// Sign out and reset local settings
    Logout,
    /// Show or change local settings
    Settings {
        #[arg(long)]
        dark_mode: Option<bool>,
        #[arg(long = "set-api-key")]
        new_api_key: Option<String>,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long = "set-country")]
        new_country: Option<String>,
    },
}

async fn check_storage(store: &Arc<dyn SavedArticleStore>, storage_type: &str) -> sn_core::Result<()> {
    let saved = store.list_once().await?;
    info!(
        "🏦 Storage backend ready (using {}, {} saved articles)",
        storage_type,
        saved.len()
    );
    Ok(())
}

async fn check_storage_with_retry(
    store: &Arc<dyn SavedArticleStore>,
    storage_type: &str,
    max_retries: u32,
    timeout: Duration,
) -> sn_core::Result<()> {
    let mut retries = 0;
    let mut last_error = None;

    while retries < max_retries {
        match tokio::time::timeout(timeout, check_storage(store, storage_type)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) if !e.is_transport() => return Err(e),
            Ok(Err(e)) => last_error = Some(e),
            Err(elapsed) => {
                last_error = Some(sn_core::Error::Transport(format!(
                    "Storage health check timed out: {}",
                    elapsed
                )))
            }
        }
        retries += 1;
        if retries < max_retries {
            info!("Storage health check failed, retrying {}/{}...", retries, max_retries);
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }

    Err(last_error.unwrap_or_else(|| {
        sn_core::Error::Transport("Storage health check failed after all retries".to_string())
    }))
}

fn headline_source(cli: &Cli, settings: &LocalSettings) -> anyhow::Result<Arc<dyn HeadlineSource>> {
    if cli.offline {
        return Ok(Arc::new(StaticHeadlineSource::sample()));
    }
    let key = config::resolve_api_key(
        cli.api_key.as_deref(),
        settings,
        std::env::var(config::API_KEY_ENV).ok(),
    )?;
    let country = cli.country.clone().unwrap_or_else(|| settings.country.clone());
    Ok(Arc::new(NewsApiSource::new(
        NewsApiConfig::new(key).with_country(Some(country)),
    )?))
}

fn print_saved(items: &[SavedArticle]) {
    if items.is_empty() {
        println!("No saved articles yet.");
        return;
    }
    for (i, record) in items.iter().enumerate() {
        let saved_at = Utc
            .timestamp_millis_opt(record.saved_at)
            .single()
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{:>3}. {} ({}, {})",
            i + 1,
            record.article.title,
            record.article.source_name(),
            record.article.display_date()
        );
        println!("     {}  saved {}", record.url().unwrap_or("-"), saved_at);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let settings_store = Arc::new(JsonSettingsStore::new(
        cli.settings.clone().unwrap_or_else(config::default_settings_path),
    ));
    let mut settings = settings_store.load().await?;

    match &cli.command {
        Commands::Categories => {
            for category in Category::all() {
                let marker = if category == settings.selected_category { "*" } else { " " };
                println!("{} {}", marker, category.label());
            }
            return Ok(());
        }
        Commands::Settings {
            dark_mode,
            new_api_key,
            category,
            new_country,
        } => {
            let mut changed = false;
            if let Some(dark_mode) = dark_mode {
                settings.dark_mode = *dark_mode;
                changed = true;
            }
            if let Some(key) = new_api_key {
                settings.news_api_key = Some(key.trim().to_string()).filter(|k| !k.is_empty());
                changed = true;
            }
            if let Some(category) = category {
                settings.selected_category = *category;
                changed = true;
            }
            if let Some(country) = new_country {
                settings.country = country.trim().to_lowercase();
                changed = true;
            }
            if changed {
                settings_store.save(&settings).await?;
                info!("⚙️ Settings saved to {}", settings_store.path().display());
            }
            println!("dark mode: {}", settings.dark_mode);
            println!(
                "api key:   {}",
                settings.api_key().map(mask_api_key).unwrap_or_else(|| "(not set)".to_string())
            );
            println!("category:  {}", settings.selected_category.label());
            println!("country:   {}", settings.country);
            return Ok(());
        }
        _ => {}
    }

    let email = cli.user.clone().or_else(|| settings.user_email.clone());
    if matches!(cli.command, Commands::Logout) && email.is_none() {
        println!("Nobody is signed in.");
        return Ok(());
    }

    let identity = Arc::new(LocalIdentity::new());
    let user = match email.as_deref() {
        Some(email) => {
            let user = identity.sign_in(email).await?;
            if config::remember_user(&mut settings, email) {
                settings_store.save(&settings).await?;
            }
            user
        }
        None => {
            warn!("No --user given, signing in anonymously; saved articles will not carry over");
            identity.sign_in_anonymous()
        }
    };
    info!("🔑 Signed in as {}", user);

    let location = config::storage_location(&cli.storage, cli.backend_url.as_deref());
    let store = sn_storage::create_storage(&cli.storage, location.as_deref(), identity.clone()).await?;
    check_storage_with_retry(&store, &cli.storage, 3, Duration::from_secs(10)).await?;

    let session = Session::start(identity, store)?.with_settings(settings_store.clone());

    match &cli.command {
        Commands::Swipe { category, query } => {
            let headlines = headline_source(&cli, &settings)?;
            info!("🗞️ Headlines from {}", headlines.name());
            let source = match query {
                Some(query) => swipe::DeckSource::Query(query.clone()),
                None => swipe::DeckSource::Category(category.unwrap_or(settings.selected_category)),
            };
            swipe::run(session.deck_controller(headlines), source).await?;
        }
        Commands::Saved { watch } => {
            let watch = *watch;
            let mut list = session.saved_list();
            match list.next_update().await {
                Some(update) => {
                    update?;
                }
                None => anyhow::bail!("Saved-article feed ended before the first snapshot"),
            }
            print_saved(list.items());

            while watch {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    update = list.next_update() => match update {
                        Some(update) => {
                            update?;
                            println!();
                            print_saved(list.items());
                        }
                        None => break,
                    },
                }
            }
        }
        Commands::Delete { url } => {
            session.store().delete(url).await?;
            println!("🗑️ Deleted {}", url);
        }
        Commands::Logout => {
            let user = session.user().clone();
            session.close().await?;
            println!("👋 Signed out {}", user);
        }
        Commands::Categories | Commands::Settings { .. } => {}
    }

    Ok(())
}
