//! Current credential pair, restored once from profile-scoped storage.

use std::sync::Arc;

use tokio::sync::{OnceCell, RwLock};

use crate::{
    domain::Credential,
    error::DecodeError,
    storage::{
        BlobStorage,
        blob::{self, Decoded},
    },
};

/// Profile storage key of the encoded credential.
pub const USER_STATE_KEY: &str = "userState";

pub struct SessionStore {
    storage: Arc<dyn BlobStorage>,
    state: OnceCell<RwLock<Credential>>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn BlobStorage>) -> Self {
        Self {
            storage,
            state: OnceCell::new(),
        }
    }

    async fn state(&self) -> &RwLock<Credential> {
        self.state
            .get_or_init(|| async {
                let stored =
                    blob::load::<Credential>(self.storage.as_ref(), USER_STATE_KEY).await;
                let credential = match stored {
                    Decoded::Valid(credential) => credential,
                    Decoded::Absent => Credential::anonymous(),
                    Decoded::Fallback(e) => {
                        tracing::warn!(
                            error = %e,
                            "stored credential unusable, starting anonymous"
                        );
                        Credential::anonymous()
                    }
                };
                tracing::debug!(
                    authenticated = credential.is_authenticated(),
                    "restored session"
                );
                RwLock::new(credential)
            })
            .await
    }

    /// Load the persisted credential. Only the first call (of this or any other accessor)
    /// reads storage.
    pub async fn restore(&self) -> Credential {
        self.credential().await
    }

    pub async fn credential(&self) -> Credential {
        self.state().await.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state().await.read().await.is_authenticated()
    }

    /// Replace the current credential. Nothing is verified against the server here;
    /// the first API call using the pair does that.
    ///
    /// A pair with exactly one empty field cannot be represented and leaves the session anonymous.
    #[tracing::instrument(level = "debug", skip(self, key))]
    pub async fn login(&self, username: &str, key: &str) -> bool {
        let credential = Credential::new(username, key);
        if !credential.is_authenticated() {
            tracing::warn!("login with an incomplete credential, session stays anonymous");
            self.logout().await;
            return true;
        }

        *self.state().await.write().await = credential.clone();
        if let Err(e) = blob::store(self.storage.as_ref(), USER_STATE_KEY, &credential).await {
            tracing::warn!(error = %format!("{:?}", e), "failed to persist credential");
        }
        tracing::info!(%username, "logged in");
        true
    }

    /// Log in with the base64 `{username, key}` blob the server hands out after basic-auth login.
    pub async fn login_encoded(&self, encoded: &str) -> Result<bool, DecodeError> {
        let credential: Credential = blob::decode(encoded)?;
        Ok(self.login(&credential.username, &credential.key).await)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn logout(&self) {
        *self.state().await.write().await = Credential::anonymous();
        if let Err(e) = self.storage.remove(USER_STATE_KEY).await {
            tracing::warn!(error = %format!("{:?}", e), "failed to delete persisted credential");
        }
        tracing::info!("logged out");
    }
}
