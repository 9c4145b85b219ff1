// Domain models shared by the session store, the API client and the sync coordinator

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::blob::Validate;

/// Timestamp value meaning "never synced".
pub const NEVER_SYNCED: i64 = -1;

/// Username and key pair sent as `x-auth-user` / `x-auth-key`.
///
/// Either both fields are set (authenticated) or both are empty (anonymous).
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub key: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            key: key.into(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        !self.username.is_empty() && !self.key.is_empty()
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty() && self.key.is_empty()
    }
}

// The key must never end up in logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("key", &if self.key.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

impl Validate for Credential {
    fn validate(&self) -> Result<(), String> {
        if self.is_authenticated() || self.is_anonymous() {
            Ok(())
        } else {
            Err("credential has only one of username and key set".into())
        }
    }
}

/// One progress report for a document, as stored by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressRecord {
    /// Document hash the reader computed
    #[serde(rename = "document")]
    pub document_id: String,
    /// Reader specific position marker (xpointer, page, ...)
    pub progress: String,
    /// 0.0 - 1.0 fraction
    pub percentage: f32,
    pub device: String,
    pub device_id: String,
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    /// User given name, set through the web UI
    pub pretty_name: String,
}

impl ProgressRecord {
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// A tracked document: its latest progress plus the server-side history.
///
/// History entries are kept in the order the server sent them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncDocument {
    pub id: String,
    #[serde(rename = "document", default)]
    pub current: ProgressRecord,
    #[serde(
        rename = "document_history",
        default,
        deserialize_with = "de::null_as_default"
    )]
    pub history: Vec<ProgressRecord>,
}

impl SyncDocument {
    pub fn current_progress_marker(&self) -> &str {
        &self.current.progress
    }

    pub fn current_device_id(&self) -> &str {
        &self.current.device_id
    }

    pub fn display_name(&self) -> &str {
        if !self.current.pretty_name.is_empty() {
            &self.current.pretty_name
        } else if !self.current.document_id.is_empty() {
            &self.current.document_id
        } else {
            &self.id
        }
    }
}

/// Last known document list and the time of the last successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    /// Epoch milliseconds, [`NEVER_SYNCED`] before the first successful fetch
    #[serde(alias = "lastSync", default = "de::never_synced")]
    pub last_sync_timestamp: i64,
    #[serde(default)]
    pub documents: Vec<SyncDocument>,
}

impl Default for SyncSnapshot {
    fn default() -> Self {
        Self {
            last_sync_timestamp: NEVER_SYNCED,
            documents: Vec::new(),
        }
    }
}

impl SyncSnapshot {
    pub fn has_synced(&self) -> bool {
        self.last_sync_timestamp != NEVER_SYNCED
    }

    /// True while `now_ms` is still inside the throttle window of the last successful fetch.
    pub fn is_fresh(&self, now_ms: i64, window_ms: i64) -> bool {
        self.has_synced() && now_ms - self.last_sync_timestamp < window_ms
    }

    pub(crate) fn replace(&mut self, documents: Vec<SyncDocument>, fetched_at_ms: i64) {
        self.documents = documents;
        self.last_sync_timestamp = fetched_at_ms;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Validate for SyncSnapshot {
    fn validate(&self) -> Result<(), String> {
        if self.last_sync_timestamp < NEVER_SYNCED {
            return Err(format!(
                "lastSyncTimestamp {} is before the never-synced marker",
                self.last_sync_timestamp
            ));
        }
        Ok(())
    }
}

/// Internal serde helpers
mod de {
    use serde::{Deserialize, Deserializer};

    /// The server encodes an empty history as `null`.
    pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    pub fn never_synced() -> i64 {
        super::NEVER_SYNCED
    }
}
