use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::services::job_store::JobStore;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically drop finished jobs older than `retention`.
///
/// Only store entries are removed; artifact files stay on disk.
pub fn spawn_sweeper(store: Arc<JobStore>, retention: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            sweep(&store, retention);
        }
    })
}

fn sweep(store: &JobStore, retention: Duration) -> usize {
    let Ok(retention) = chrono::Duration::from_std(retention) else {
        return 0;
    };
    let removed = store.purge_finished_before(chrono::Utc::now() - retention);
    if removed > 0 {
        tracing::info!(removed, remaining = store.len(), "Expired finished jobs");
    }
    removed
}
