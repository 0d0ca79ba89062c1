/*!
 * Bounded transactions.
 *
 * Workflow operations open a transaction, do their reads and guarded writes,
 * and commit. The whole unit runs under a deadline; if the deadline passes the
 * future is dropped, which drops the open `DatabaseTransaction` and rolls it
 * back, and the caller sees a retryable `TransactionFailure`.
 */

use crate::errors::ServiceError;
use metrics::{counter, histogram};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::warn;

/// Runs `work` to completion or fails with `TransactionFailure` after `limit`.
///
/// ```rust,ignore
/// with_timeout(self.txn_timeout, "cancel_order", async {
///     let txn = self.db.begin().await?;
///     // reads and guarded writes against &txn
///     txn.commit().await?;
///     Ok(order)
/// })
/// .await
/// ```
pub async fn with_timeout<T, F>(limit: Duration, operation: &'static str, work: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    let started = Instant::now();
    let outcome = tokio::time::timeout(limit, work).await;
    histogram!(
        "storefront_db.transaction_seconds",
        started.elapsed().as_secs_f64(),
        "operation" => operation
    );

    match outcome {
        Ok(Ok(value)) => {
            counter!("storefront_db.transactions_committed", 1, "operation" => operation);
            Ok(value)
        }
        Ok(Err(err)) => {
            counter!("storefront_db.transactions_rolled_back", 1, "operation" => operation);
            if err.is_retryable() {
                warn!(operation, error = %err, "transaction aborted by storage conflict");
            }
            Err(err)
        }
        Err(_) => {
            counter!("storefront_db.transactions_timed_out", 1, "operation" => operation);
            warn!(operation, timeout_secs = limit.as_secs_f64(), "transaction exceeded deadline; rolled back");
            Err(ServiceError::TransactionFailure(format!(
                "{} did not complete within {:?}",
                operation, limit
            )))
        }
    }
}
