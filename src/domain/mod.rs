pub mod models;

pub use models::{Credential, ProgressRecord, SyncDocument, SyncSnapshot};
