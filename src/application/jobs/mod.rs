//! Periodic jobs and their runner. Every job runs under its named lock;
//! a held lock means another runner is active and the tick is skipped.

pub mod bucket_maintenance;
pub mod health;
pub mod scheduler;
pub mod sync_cycle;

use crate::application::locks::LockManager;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;

    fn lock_name(&self) -> &'static str {
        self.name()
    }

    async fn run(&self) -> Result<()>;
}

/// Wraps a job body in lock acquisition and guaranteed release. The body is
/// spawned as its own task so a panic surfaces as a join error instead of
/// tearing down the scheduler, and the lock is released on every exit path.
pub struct JobRunner {
    locks: Arc<LockManager>,
}

impl JobRunner {
    pub fn new(locks: Arc<LockManager>) -> Self {
        Self { locks }
    }

    pub async fn run_job(&self, job: Arc<dyn Job>) {
        let guard = match self.locks.acquire(job.lock_name()).await {
            Ok(Ok(guard)) => guard,
            Ok(Err(held)) => {
                debug!(job = job.name(), %held, "skipping tick, lock held");
                return;
            }
            Err(error) => {
                error!(job = job.name(), %error, "lock store unavailable, skipping tick");
                return;
            }
        };

        let body = {
            let job = job.clone();
            tokio::spawn(async move { job.run().await })
        };

        match body.await {
            Ok(Ok(())) => info!(job = job.name(), "job finished"),
            // Failed jobs are never retried here; the next scheduled tick is
            // the sole retry mechanism.
            Ok(Err(error)) => error!(job = job.name(), %error, "job failed"),
            Err(join_error) => error!(job = job.name(), %join_error, "job panicked"),
        }

        if let Err(error) = self.locks.release(guard).await {
            error!(job = job.name(), %error, "failed to release job lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::StoreKind;
    use crate::infrastructure::persistence::database::Store;
    use crate::infrastructure::persistence::repositories::LockRepository;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingJob {
        runs: AtomicU32,
    }

    #[async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct PanickingJob;

    #[async_trait]
    impl Job for PanickingJob {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn run(&self) -> Result<()> {
            panic!("boom");
        }
    }

    async fn runner() -> (tempfile::TempDir, JobRunner, Arc<LockManager>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("locks.db"), StoreKind::Locks)
            .await
            .unwrap();
        let locks = Arc::new(LockManager::new(LockRepository::new(store)));
        (dir, JobRunner::new(locks.clone()), locks)
    }

    #[tokio::test]
    async fn test_job_runs_and_releases_lock() {
        let (_dir, runner, locks) = runner().await;
        let job = Arc::new(CountingJob {
            runs: AtomicU32::new(0),
        });

        runner.run_job(job.clone()).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);

        // Lock is free again for the next tick.
        let guard = locks.acquire("counting").await.unwrap().unwrap();
        locks.release(guard).await.unwrap();
    }

    #[tokio::test]
    async fn test_held_lock_skips_tick() {
        let (_dir, runner, locks) = runner().await;
        let job = Arc::new(CountingJob {
            runs: AtomicU32::new(0),
        });

        let guard = locks.acquire("counting").await.unwrap().unwrap();
        runner.run_job(job.clone()).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);
        locks.release(guard).await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_job_still_releases_lock() {
        let (_dir, runner, locks) = runner().await;

        runner.run_job(Arc::new(PanickingJob)).await;

        // The panic was contained and the lock came back.
        let guard = locks.acquire("panicking").await.unwrap().unwrap();
        locks.release(guard).await.unwrap();
    }
}
