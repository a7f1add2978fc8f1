use crate::application::planner::plan::HolisticPlan;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Bound on retained plans; any state change produces a fresh key, so old
/// entries are dead weight once the portfolio moves.
const MAX_ENTRIES: usize = 32;

/// Plan cache keyed by the composite recommendation hash. Concurrent readers
/// are allowed; writers serialize on the lock.
#[derive(Default)]
pub struct PlanCache {
    inner: RwLock<HashMap<String, HolisticPlan>>,
}

impl PlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<HolisticPlan> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: String, plan: HolisticPlan) {
        let mut guard = self.inner.write().await;
        if guard.len() >= MAX_ENTRIES && !guard.contains_key(&key) {
            guard.clear();
        }
        guard.insert(key, plan);
    }

    pub async fn invalidate_all(&self) {
        self.inner.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
