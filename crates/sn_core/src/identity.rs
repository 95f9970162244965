use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::RwLock;
use tracing::debug;

use crate::types::UserId;
use crate::{Error, Result};

/// Source of the signed-in user. Every store operation consults it first.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<UserId>;

    async fn sign_in(&self, email: &str) -> Result<UserId>;

    async fn sign_out(&self);
}

/// In-process identity provider.
///
/// Signing in with an e-mail always yields the same user id, so separate
/// processes (devices) that sign in with the same address share a namespace.
#[derive(Debug, Default)]
pub struct LocalIdentity {
    user: RwLock<Option<UserId>>,
}

impl LocalIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user: UserId) -> Self {
        Self {
            user: RwLock::new(Some(user)),
        }
    }

    pub fn sign_in_anonymous(&self) -> UserId {
        let user = UserId::new(format!("anon_{}", uuid::Uuid::new_v4().simple()));
        self.set(Some(user.clone()));
        user
    }

    fn set(&self, user: Option<UserId>) {
        let mut slot = self.user.write().unwrap_or_else(|e| e.into_inner());
        *slot = user;
    }
}

pub fn user_id_for_email(email: &str) -> UserId {
    let normalized = email.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    let hex: String = digest.iter().take(10).map(|b| format!("{:02x}", b)).collect();
    UserId::new(format!("uid_{}", hex))
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.user.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn sign_in(&self, email: &str) -> Result<UserId> {
        if email.trim().is_empty() {
            return Err(Error::InvalidInput("Email must not be empty".to_string()));
        }
        let user = user_id_for_email(email);
        debug!("Signed in as {}", user);
        self.set(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) {
        self.set(None);
    }
}
