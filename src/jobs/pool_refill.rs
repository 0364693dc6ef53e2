//! Pool refill job.
//!
//! Keeps a reserve of issuable activation codes so that `POST /code/get`
//! seldom has to generate a batch while a caller waits.

use tokio::sync::Mutex;
use tracing::debug;

use crate::activation_code::CodeBatchConfig;
use crate::server::database::Database;
use crate::server::handlers::replenish_pool;

use super::JobError;

/// Generate one batch if fewer than `min_available` codes are issuable.
///
/// The count and the insert both happen under `refill_lock`, the same lock
/// the issuance handler takes before refilling an empty pool.
///
/// Returns the number of codes inserted (0 when the pool was healthy).
pub async fn run_pool_refill(
    db: &Database,
    refill_lock: &Mutex<()>,
    min_available: i64,
    batch: &CodeBatchConfig,
) -> Result<u64, JobError> {
    let _guard = refill_lock.lock().await;

    let available = db.count_available().await?;

    debug!(
        "Pool has {} issuable codes (threshold {})",
        available, min_available
    );

    if available >= min_available {
        return Ok(0);
    }

    Ok(replenish_pool(db, batch).await?)
}
