//! Client-side session and sync-cache layer for a KOReader progress sync server.
//!
//! [`KosyncClient`] owns a [`session::SessionStore`] (credentials, kept in
//! profile storage across restarts) and a [`sync::SyncCoordinator`] (the
//! throttled, session-scoped cache of the server's document list). UI code calls
//! `login`, `logout` and `sync` and reads the snapshot; failures never escape as
//! panics or errors from `sync`.

pub mod api_client;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod session;
pub mod storage;
pub mod sync;
pub mod telemetry;

pub use api_client::{ApiClient, DocumentSource, Payload, RequestOptions};
pub use config::Config;
pub use context::KosyncClient;
pub use domain::{Credential, ProgressRecord, SyncDocument, SyncSnapshot};
pub use error::{ApiError, ApiResult, DecodeError};
pub use sync::{SyncOutcome, SyncSettings};
