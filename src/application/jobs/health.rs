//! Periodic store health check: integrity-check every store, rebuildable
//! history stores are deleted when corrupt, WALs are truncated, and stuck
//! locks are swept.

use crate::application::jobs::Job;
use crate::application::locks::LockManager;
use crate::domain::errors::StoreError;
use crate::infrastructure::persistence::database::Stores;
use crate::infrastructure::persistence::repositories::HistoryRepository;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct HealthCheckJob {
    pub stores: Stores,
    pub history: Arc<HistoryRepository>,
    pub locks: Arc<LockManager>,
    /// Locks older than this are considered abandoned by a dead process.
    pub stuck_lock_age: Duration,
}

#[async_trait]
impl Job for HealthCheckJob {
    fn name(&self) -> &'static str {
        "health_check"
    }

    async fn run(&self) -> Result<()> {
        // Fixed stores are not rebuildable; a corrupt one is fatal and
        // surfaced to the operator.
        for store in self.stores.fixed_stores() {
            match store.integrity_check().await {
                Ok(()) => {}
                Err(StoreError::IntegrityCheckFailed { store, detail }) => {
                    error!(%store, %detail, "core store corrupt");
                    anyhow::bail!("core store corrupt: {}", store);
                }
                Err(StoreError::Unavailable { store, reason }) => {
                    error!(%store, %reason, "store unavailable");
                    anyhow::bail!("store unavailable: {}", store);
                }
            }
        }

        // Per-symbol history stores are disposable: delete on corruption and
        // let the next price sync rebuild them.
        let mut rebuilt = 0;
        for isin in self.history.known_isins()? {
            match self.history.integrity_check(&isin).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(%isin, "history store corrupt, deleting for rebuild");
                    self.history.delete(&isin).await?;
                    rebuilt += 1;
                }
                Err(error) => {
                    warn!(%isin, %error, "history store unreadable, deleting for rebuild");
                    self.history.delete(&isin).await?;
                    rebuilt += 1;
                }
            }
        }

        for store in self.stores.fixed_stores() {
            if let Err(error) = store.wal_checkpoint().await {
                warn!(store = %store.path.display(), %error, "WAL checkpoint failed");
            }
        }

        let cleared = self.locks.clear_stuck(self.stuck_lock_age).await?;
        info!(
            rebuilt_history_stores = rebuilt,
            cleared_locks = cleared.len(),
            "health check finished"
        );
        Ok(())
    }
}
