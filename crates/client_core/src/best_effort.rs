use std::future::Future;

use tokio::task::JoinHandle;
use tracing::warn;

/// Spawns a background task whose failure is logged and discarded instead
/// of being returned. Callers that need at-least-once delivery re-trigger
/// on their next natural cycle rather than retrying here.
pub fn spawn_best_effort<F>(label: &'static str, future: F) -> JoinHandle<()>
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = future.await {
            warn!("{label}: best-effort operation failed: {err}");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    #[tokio::test]
    async fn completed_future_runs_to_the_end() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        spawn_best_effort("test op", async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await
        .expect("join");
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failures_do_not_propagate() {
        spawn_best_effort("failing op", async { Err(anyhow!("boom")) })
            .await
            .expect("join must succeed despite inner failure");
    }
}
