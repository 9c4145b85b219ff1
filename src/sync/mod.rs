//! Throttled refresh of the cached document list.
//!
//! [`SyncCoordinator::sync`] is safe to call as often as the UI likes: inside the
//! throttle window it returns without touching the network, and callers arriving
//! while a fetch is outstanding join that fetch instead of starting another one.

pub mod clock;

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::sync::{Mutex, OnceCell, RwLock, watch};

pub use clock::{Clock, ManualClock, SystemClock};

use crate::{
    api_client::DocumentSource,
    domain::{SyncDocument, SyncSnapshot},
    error::ApiError,
    storage::{
        BlobStorage,
        blob::{self, Decoded},
    },
};

/// Session storage key of the encoded snapshot.
pub const SYNC_STATE_KEY: &str = "syncState";

pub const DEFAULT_THROTTLE_WINDOW: Duration = Duration::from_millis(60_000);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub throttle_window: Duration,
    pub fetch_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            throttle_window: DEFAULT_THROTTLE_WINDOW,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Inside the throttle window; nothing fetched, nothing written
    Throttled { last_sync_timestamp: i64 },
    Updated { documents: usize, synced_at: i64 },
    /// Cached documents and timestamp were left as they were
    Failed(ApiError),
    /// The snapshot was cleared while the fetch was outstanding
    Discarded,
}

impl SyncOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, SyncOutcome::Updated { .. })
    }
}

struct InFlight {
    cycle: u64,
    generation: u64,
    outcome: watch::Receiver<Option<SyncOutcome>>,
}

pub struct SyncCoordinator {
    source: Arc<dyn DocumentSource>,
    storage: Arc<dyn BlobStorage>,
    clock: Arc<dyn Clock>,
    settings: SyncSettings,
    snapshot: OnceCell<RwLock<SyncSnapshot>>,
    in_flight: Mutex<Option<InFlight>>,
    next_cycle: AtomicU64,
    // bumped by clear(); a cycle that sees it change drops its result
    generation: AtomicU64,
}

impl SyncCoordinator {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        storage: Arc<dyn BlobStorage>,
        clock: Arc<dyn Clock>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            source,
            storage,
            clock,
            settings,
            snapshot: OnceCell::new(),
            in_flight: Mutex::new(None),
            next_cycle: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings
    }

    async fn state(&self) -> &RwLock<SyncSnapshot> {
        self.snapshot
            .get_or_init(|| async {
                let stored =
                    blob::load::<SyncSnapshot>(self.storage.as_ref(), SYNC_STATE_KEY).await;
                let snapshot = match stored {
                    Decoded::Valid(snapshot) => snapshot,
                    Decoded::Absent => SyncSnapshot::default(),
                    Decoded::Fallback(e) => {
                        tracing::warn!(error = %e, "stored sync state unusable, starting empty");
                        SyncSnapshot::default()
                    }
                };
                tracing::debug!(
                    last_sync = snapshot.last_sync_timestamp,
                    documents = snapshot.documents.len(),
                    "restored sync state"
                );
                RwLock::new(snapshot)
            })
            .await
    }

    pub async fn snapshot(&self) -> SyncSnapshot {
        self.state().await.read().await.clone()
    }

    pub async fn documents(&self) -> Vec<SyncDocument> {
        self.state().await.read().await.documents.clone()
    }

    pub async fn last_sync_timestamp(&self) -> i64 {
        self.state().await.read().await.last_sync_timestamp
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.settings.throttle_window.as_millis()).unwrap_or(i64::MAX)
    }

    /// Refresh the document list unless the last successful fetch is recent enough.
    ///
    /// Never fails; the outcome tells the caller what happened.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn sync(&self) -> SyncOutcome {
        let now = self.clock.now_ms();
        {
            let snapshot = self.state().await.read().await;
            if snapshot.is_fresh(now, self.window_ms()) {
                tracing::debug!(last_sync = snapshot.last_sync_timestamp, "sync throttled");
                return SyncOutcome::Throttled {
                    last_sync_timestamp: snapshot.last_sync_timestamp,
                };
            }
        }

        let (cycle, generation, tx) = {
            let mut slot = self.in_flight.lock().await;
            let generation = self.generation.load(Ordering::SeqCst);
            // a closed sender means the leading caller was dropped mid-cycle, a
            // stale generation means clear() already condemned the running cycle
            let joinable = slot
                .as_ref()
                .filter(|running| running.generation == generation)
                .filter(|running| running.outcome.has_changed().is_ok())
                .map(|running| running.outcome.clone());
            if let Some(rx) = joinable {
                drop(slot);
                return Self::join(rx).await;
            }
            let cycle = self.next_cycle.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = watch::channel(None);
            *slot = Some(InFlight {
                cycle,
                generation,
                outcome: rx,
            });
            (cycle, generation, tx)
        };

        let outcome = self.run_cycle(now, generation).await;
        tx.send_replace(Some(outcome.clone()));
        let mut slot = self.in_flight.lock().await;
        if slot.as_ref().is_some_and(|running| running.cycle == cycle) {
            *slot = None;
        }
        outcome
    }

    async fn join(mut rx: watch::Receiver<Option<SyncOutcome>>) -> SyncOutcome {
        tracing::debug!("joining sync already in flight");
        match rx.wait_for(|outcome| outcome.is_some()).await {
            Ok(outcome) => {
                Option::clone(&outcome).unwrap_or(SyncOutcome::Failed(ApiError::Aborted))
            }
            Err(_) => SyncOutcome::Failed(ApiError::Aborted),
        }
    }

    async fn run_cycle(&self, started_at: i64, generation: u64) -> SyncOutcome {
        tracing::debug!("fetching document list");
        let fetch = self.source.list_documents();
        let fetched = match tokio::time::timeout(self.settings.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout(self.settings.fetch_timeout)),
        };

        let mut snapshot = self.state().await.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::info!("sync state cleared during fetch, dropping result");
            return SyncOutcome::Discarded;
        }

        let outcome = match fetched {
            Ok(documents) => {
                let count = documents.len();
                let synced_at = started_at.max(snapshot.last_sync_timestamp);
                snapshot.replace(documents, synced_at);
                tracing::info!(documents = count, synced_at, "synced documents");
                SyncOutcome::Updated {
                    documents: count,
                    synced_at,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "sync failed, keeping cached documents");
                SyncOutcome::Failed(e)
            }
        };

        // written after every fetch attempt; on failure this rewrites the unchanged snapshot
        if let Err(e) = blob::store(self.storage.as_ref(), SYNC_STATE_KEY, &*snapshot).await {
            tracing::warn!(error = %format!("{:?}", e), "failed to persist sync state");
        }
        outcome
    }

    /// Forget every cached document and the persisted snapshot.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn clear(&self) {
        let mut snapshot = self.state().await.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        snapshot.reset();
        if let Err(e) = self.storage.remove(SYNC_STATE_KEY).await {
            tracing::warn!(error = %format!("{:?}", e), "failed to delete persisted sync state");
        }
        tracing::info!("cleared sync state");
    }
}
