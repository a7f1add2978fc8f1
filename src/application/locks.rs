use crate::domain::errors::LockError;
use crate::infrastructure::persistence::repositories::LockRepository;
use anyhow::Result;
use chrono::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Process-wide named mutual exclusion, persisted so a crash cannot wedge
/// future runs: the periodic stuck-lock sweep reclaims anything an earlier
/// process left behind.
pub struct LockManager {
    repository: LockRepository,
    owner: String,
}

/// Held lock. Release is explicit (and idempotent at the store level); the
/// job runner guarantees it runs on every exit path, including a panicking
/// job body.
#[must_use = "a lock guard that is never released wedges the job until the stuck sweep"]
pub struct LockGuard {
    pub name: String,
}

impl LockManager {
    pub fn new(repository: LockRepository) -> Self {
        Self {
            repository,
            owner: Uuid::new_v4().to_string(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Non-blocking acquisition: jobs abort their tick on contention rather
    /// than queueing behind the holder.
    pub async fn acquire(&self, name: &str) -> Result<Result<LockGuard, LockError>> {
        match self.repository.try_acquire(name, &self.owner).await? {
            Ok(()) => {
                debug!(lock = name, "lock acquired");
                Ok(Ok(LockGuard {
                    name: name.to_string(),
                }))
            }
            Err(holder) => Ok(Err(LockError::AlreadyHeld {
                name: name.to_string(),
                owner: holder,
            })),
        }
    }

    pub async fn release(&self, guard: LockGuard) -> Result<()> {
        self.repository.release(&guard.name, &self.owner).await?;
        debug!(lock = %guard.name, "lock released");
        Ok(())
    }

    /// Reclaim locks older than `age`, returning the reclaimed names.
    pub async fn clear_stuck(&self, age: Duration) -> Result<Vec<String>> {
        let cleared = self.repository.clear_stuck(age).await?;
        if !cleared.is_empty() {
            info!(locks = ?cleared, "reclaimed stuck locks");
        }
        Ok(cleared)
    }
}
