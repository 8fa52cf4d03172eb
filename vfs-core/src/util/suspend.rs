//! `src/util/suspend.rs`
//!
//! Bounds a suspension point (network request, permission prompt, token
//! exchange) by a timeout and the owning operator's cancellation token.

use std::{future::Future, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{VfsError, VfsResult};

/// Await `fut` unless `cancel` fires or `limit` elapses first.
pub async fn guarded<F, T>(
    operation: &'static str,
    cancel: &CancellationToken,
    limit: Option<Duration>,
    fut: F,
) -> VfsResult<T>
where
    F: Future<Output = VfsResult<T>>,
{
    let timed = async {
        match limit {
            Some(after) => tokio::time::timeout(after, fut).await.map_err(|_| {
                warn!(operation, timeout_ms = after.as_millis(), "Suspension point timed out");
                VfsError::Timeout { operation, after }
            })?,
            None => fut.await,
        }
    };

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(VfsError::Cancelled),
        result = timed => result,
    }
}
