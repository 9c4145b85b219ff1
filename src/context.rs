// Explicit owner of the session, the API client and the sync coordinator

use std::sync::Arc;

use anyhow::Context;

use crate::{
    api_client::ApiClient,
    config::Config,
    domain::{Credential, SyncSnapshot},
    error::DecodeError,
    session::SessionStore,
    storage::{BlobStorage, MemoryStorage, SqliteStorage},
    sync::{Clock, SyncCoordinator, SyncOutcome, SystemClock},
};

/// One application session. Everything the UI needs goes through this value;
/// nothing is shared process-wide.
pub struct KosyncClient {
    session: Arc<SessionStore>,
    api: Arc<ApiClient>,
    sync: SyncCoordinator,
}

impl KosyncClient {
    /// Profile state in the configured SQLite database, session state in memory.
    #[tracing::instrument(level = "debug", skip(config))]
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        config.validate().map_err(|e| anyhow::anyhow!(e))?;
        let profile = SqliteStorage::connect(&config.profile_db)
            .await
            .with_context(|| format!("Failed to open profile storage {}", config.profile_db))?;
        let client = Self::from_parts(
            config,
            Arc::new(profile),
            Arc::new(MemoryStorage::new()),
            Arc::new(SystemClock),
        )?;
        tracing::info!(base_url = %config.base_url, "kosync client ready");
        Ok(client)
    }

    pub fn from_parts(
        config: &Config,
        profile_storage: Arc<dyn BlobStorage>,
        session_storage: Arc<dyn BlobStorage>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let session = Arc::new(SessionStore::new(profile_storage));
        let api = Arc::new(ApiClient::new(
            &config.base_url,
            session.clone(),
            config.fetch_timeout,
        )?);
        let sync = SyncCoordinator::new(
            api.clone(),
            session_storage,
            clock,
            config.sync_settings(),
        );
        Ok(Self { session, api, sync })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn sync_coordinator(&self) -> &SyncCoordinator {
        &self.sync
    }

    pub async fn login(&self, username: &str, key: &str) -> bool {
        self.session.login(username, key).await
    }

    pub async fn login_encoded(&self, encoded: &str) -> Result<bool, DecodeError> {
        self.session.login_encoded(encoded).await
    }

    /// Drop the credential and every document cached for it.
    pub async fn logout(&self) {
        self.session.logout().await;
        self.sync.clear().await;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.is_authenticated().await
    }

    pub async fn credential(&self) -> Credential {
        self.session.credential().await
    }

    pub async fn sync(&self) -> SyncOutcome {
        self.sync.sync().await
    }

    pub async fn snapshot(&self) -> SyncSnapshot {
        self.sync.snapshot().await
    }
}
