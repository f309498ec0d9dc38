//! RaceStateCache - shared latest-known race state

use contracts::{PositionUpdate, RaceState, TelemetryUpdate};
use tokio::sync::RwLock;
use tracing::trace;

/// Concurrent snapshot cache
///
/// Each `apply_*` call holds the write lock for the whole batch, so a
/// concurrent `snapshot` observes either none or all of that batch.
#[derive(Debug, Default)]
pub struct RaceStateCache {
    state: RwLock<RaceState>,
}

impl RaceStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache with an existing state
    pub fn with_state(state: RaceState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Overwrite the stored position of every entity in the batch
    pub async fn apply_positions(&self, batch: &[PositionUpdate]) {
        if batch.is_empty() {
            return;
        }
        let mut state = self.state.write().await;
        state.apply_positions(batch);
        trace!(entries = batch.len(), known = state.positions.len(), "positions applied");
    }

    /// Overwrite the stored telemetry of every entity in the batch
    pub async fn apply_telemetry(&self, batch: &[TelemetryUpdate]) {
        if batch.is_empty() {
            return;
        }
        let mut state = self.state.write().await;
        state.apply_telemetry(batch);
        trace!(entries = batch.len(), known = state.telemetry.len(), "telemetry applied");
    }

    /// Independent copy of the full current state
    pub async fn snapshot(&self) -> RaceState {
        self.state.read().await.clone()
    }

    /// Number of distinct entities known in either category
    pub async fn entity_count(&self) -> usize {
        self.state.read().await.entity_count()
    }

    /// Forget every entity (e.g. between sessions)
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.positions.clear();
        state.telemetry.clear();
    }
}
