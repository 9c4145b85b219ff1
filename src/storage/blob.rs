//! Encoding of persisted state: base64 (standard alphabet) over JSON.
//!
//! Decoding never trusts the JSON alone. Every decoded value passes through
//! [`Validate`] and the caller gets a [`Decoded`] tag telling it whether to use
//! the value or fall back to its default state.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Serialize, de::DeserializeOwned};

use super::BlobStorage;
use crate::error::DecodeError;

/// Schema check applied after JSON decoding.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

#[derive(Debug)]
pub enum Decoded<T> {
    Valid(T),
    /// Nothing stored under the key
    Absent,
    /// Something was stored but could not be used
    Fallback(DecodeError),
}

impl<T> Decoded<T> {
    pub fn valid(self) -> Option<T> {
        match self {
            Decoded::Valid(value) => Some(value),
            Decoded::Absent | Decoded::Fallback(_) => None,
        }
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(STANDARD.encode(serde_json::to_vec(value)?))
}

pub fn decode<T: DeserializeOwned + Validate>(encoded: &str) -> Result<T, DecodeError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    let value: T = serde_json::from_slice(&bytes)?;
    value.validate().map_err(DecodeError::Schema)?;
    Ok(value)
}

/// Read and decode the blob under `key`. Never fails; problems are reported through the tag.
pub async fn load<T: DeserializeOwned + Validate>(
    storage: &dyn BlobStorage,
    key: &str,
) -> Decoded<T> {
    match storage.get(key).await {
        Ok(None) => Decoded::Absent,
        Ok(Some(encoded)) => match decode(&encoded) {
            Ok(value) => Decoded::Valid(value),
            Err(e) => {
                tracing::warn!(%key, error = %e, "discarding unreadable persisted state");
                Decoded::Fallback(e)
            }
        },
        Err(e) => {
            tracing::warn!(%key, error = %format!("{:?}", e), "failed to read persisted state");
            Decoded::Fallback(DecodeError::Storage(e.to_string()))
        }
    }
}

pub async fn store<T: Serialize>(
    storage: &dyn BlobStorage,
    key: &str,
    value: &T,
) -> anyhow::Result<()> {
    let encoded = encode(value)?;
    storage.set(key, &encoded).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Credential, SyncSnapshot};
    use crate::storage::MemoryStorage;

    #[test]
    fn encodes_like_btoa_of_json() {
        let encoded = encode(&Credential::new("alice", "k1")).unwrap();
        // btoa(JSON.stringify({username: "alice", key: "k1"}))
        assert_eq!(encoded, "eyJ1c2VybmFtZSI6ImFsaWNlIiwia2V5IjoiazEifQ==");
    }

    #[test]
    fn decode_rejects_each_layer() {
        assert!(matches!(
            decode::<Credential>("not base64!"),
            Err(DecodeError::Base64(_))
        ));
        // "hello" is valid base64 text but not JSON
        assert!(matches!(
            decode::<Credential>("aGVsbG8="),
            Err(DecodeError::Json(_))
        ));
        let partial = encode(&Credential::new("alice", "")).unwrap();
        assert!(matches!(
            decode::<Credential>(&partial),
            Err(DecodeError::Schema(_))
        ));
    }

    #[tokio::test]
    async fn load_tags_missing_and_corrupt_blobs() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            load::<SyncSnapshot>(&storage, "syncState").await,
            Decoded::Absent
        ));

        storage.set("syncState", "%%%").await.unwrap();
        let loaded = load::<SyncSnapshot>(&storage, "syncState").await;
        assert!(matches!(loaded, Decoded::Fallback(DecodeError::Base64(_))));
        assert_eq!(loaded.valid(), None);
    }

    #[tokio::test]
    async fn store_then_load() {
        let storage = MemoryStorage::new();
        store(&storage, "userState", &Credential::new("alice", "k1"))
            .await
            .unwrap();
        let loaded = load::<Credential>(&storage, "userState").await.valid();
        assert_eq!(loaded, Some(Credential::new("alice", "k1")));
    }
}
