use crate::infrastructure::persistence::database::Store;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};

/// Row-level lock persistence. Acquisition is a single atomic insert so two
/// processes can never both hold one name.
pub struct LockRepository {
    store: Store,
}

#[derive(Debug, Clone)]
pub struct LockRow {
    pub name: String,
    pub owner: String,
    pub acquired_at: DateTime<Utc>,
}

impl LockRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Atomically take the lock. Returns the current holder on contention.
    pub async fn try_acquire(&self, name: &str, owner: &str) -> Result<Result<(), String>> {
        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO locks (name, owner, acquired_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(name)
        .bind(owner)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.store.pool)
        .await
        .context("Failed to insert lock row")?;

        if inserted.rows_affected() > 0 {
            return Ok(Ok(()));
        }

        let holder = sqlx::query_as::<_, (String,)>("SELECT owner FROM locks WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.store.pool)
            .await
            .context("Failed to read lock holder")?;
        Ok(Err(holder.map(|h| h.0).unwrap_or_default()))
    }

    /// Idempotent release, scoped to the owner so a stale process cannot
    /// release someone else's re-acquired lock.
    pub async fn release(&self, name: &str, owner: &str) -> Result<()> {
        sqlx::query("DELETE FROM locks WHERE name = $1 AND owner = $2")
            .bind(name)
            .bind(owner)
            .execute(&self.store.pool)
            .await
            .context("Failed to release lock")?;
        Ok(())
    }

    /// Release locks older than `age` and return their names.
    pub async fn clear_stuck(&self, age: Duration) -> Result<Vec<String>> {
        let cutoff = (Utc::now() - age).to_rfc3339();
        let stuck = sqlx::query_as::<_, (String,)>(
            "SELECT name FROM locks WHERE acquired_at < $1 ORDER BY name",
        )
        .bind(&cutoff)
        .fetch_all(&self.store.pool)
        .await
        .context("Failed to query stuck locks")?;

        sqlx::query("DELETE FROM locks WHERE acquired_at < $1")
            .bind(&cutoff)
            .execute(&self.store.pool)
            .await
            .context("Failed to clear stuck locks")?;

        Ok(stuck.into_iter().map(|row| row.0).collect())
    }

    pub async fn all(&self) -> Result<Vec<LockRow>> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            "SELECT name, owner, acquired_at FROM locks ORDER BY name",
        )
        .fetch_all(&self.store.pool)
        .await
        .context("Failed to list locks")?;

        Ok(rows
            .into_iter()
            .map(|(name, owner, acquired_at)| LockRow {
                name,
                owner,
                acquired_at: DateTime::parse_from_rfc3339(&acquired_at)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::StoreKind;

    async fn repo() -> (tempfile::TempDir, LockRepository) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("locks.db"), StoreKind::Locks)
            .await
            .unwrap();
        (dir, LockRepository::new(store))
    }

    #[tokio::test]
    async fn test_single_holder_per_name() {
        let (_dir, repo) = repo().await;

        assert!(repo.try_acquire("sync_cycle", "proc-a").await.unwrap().is_ok());
        let contended = repo.try_acquire("sync_cycle", "proc-b").await.unwrap();
        assert_eq!(contended.unwrap_err(), "proc-a");

        repo.release("sync_cycle", "proc-a").await.unwrap();
        assert!(repo.try_acquire("sync_cycle", "proc-b").await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_release_is_owner_scoped_and_idempotent() {
        let (_dir, repo) = repo().await;
        repo.try_acquire("health", "proc-a").await.unwrap().unwrap();

        // A stranger's release is a no-op.
        repo.release("health", "proc-b").await.unwrap();
        assert_eq!(repo.all().await.unwrap().len(), 1);

        repo.release("health", "proc-a").await.unwrap();
        repo.release("health", "proc-a").await.unwrap();
        assert!(repo.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_stuck_only_releases_old_locks() {
        let (_dir, repo) = repo().await;
        repo.try_acquire("fresh", "proc-a").await.unwrap().unwrap();

        // Backdate a second lock far past any reasonable job runtime.
        sqlx::query("INSERT INTO locks (name, owner, acquired_at) VALUES ('stale', 'dead-proc', $1)")
            .bind((Utc::now() - Duration::hours(3)).to_rfc3339())
            .execute(&repo.store.pool)
            .await
            .unwrap();

        let cleared = repo.clear_stuck(Duration::hours(1)).await.unwrap();
        assert_eq!(cleared, vec!["stale".to_string()]);
        let remaining = repo.all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "fresh");
    }
}
