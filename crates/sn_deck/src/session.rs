use sn_core::{
    Canceller, Error, HeadlineSource, IdentityProvider, Result, SavedArticleStore, SettingsStore,
    UserId,
};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::controller::DeckController;
use crate::saved_list::SavedList;

/// Everything one signed-in user works with, created at sign-in and closed
/// at sign-out.
pub struct Session {
    user: UserId,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn SavedArticleStore>,
    settings: Option<Arc<dyn SettingsStore>>,
    feeds: Mutex<Vec<Canceller>>,
}

impl Session {
    /// Fails with `Unauthenticated` unless someone is signed in.
    pub fn start(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn SavedArticleStore>,
    ) -> Result<Self> {
        let user = identity.current_user().ok_or(Error::Unauthenticated)?;
        info!("🔑 Session started for {}", user);
        Ok(Self {
            user,
            identity,
            store,
            settings: None,
            feeds: Mutex::new(Vec::new()),
        })
    }

    pub fn with_settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn store(&self) -> Arc<dyn SavedArticleStore> {
        self.store.clone()
    }

    /// A deck controller that saves into this session's store.
    pub fn deck_controller(&self, headlines: Arc<dyn HeadlineSource>) -> DeckController {
        DeckController::new(self.store.clone(), headlines)
    }

    /// A saved list already attached to the change feed. The feed is
    /// cancelled when the list is dropped or the session closes.
    pub fn saved_list(&self) -> SavedList {
        let mut list = SavedList::new(self.store.clone());
        let canceller = list.attach();
        let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        feeds.retain(Canceller::is_active);
        feeds.push(canceller);
        list
    }

    fn cancel_feeds(&self) {
        let feeds: Vec<Canceller> = self.feeds.lock().unwrap_or_else(|e| e.into_inner()).drain(..).collect();
        for feed in feeds {
            feed.cancel();
        }
    }

    /// Cancels open feeds, signs out and resets local settings.
    pub async fn close(self) -> Result<()> {
        self.cancel_feeds();
        self.identity.sign_out().await;
        if let Some(settings) = &self.settings {
            settings.clear().await?;
        }
        info!("👋 Session closed for {}", self.user);
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel_feeds();
    }
}
