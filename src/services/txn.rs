// services/txn.rs
//
// Session/transaction plumbing shared by the purchase paths. Transient
// conflicts are retried a bounded number of times before surfacing.

use mongodb::error::{TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT};
use mongodb::ClientSession;

use crate::errors::{AppError, Result};

pub const MAX_TXN_RETRIES: u32 = 3;

pub fn is_transient(err: &AppError) -> bool {
    match err {
        AppError::MongoDB(e) => e.contains_label(TRANSIENT_TRANSACTION_ERROR),
        _ => false,
    }
}

/// Commit, retrying while the driver reports an unknown commit result.
pub async fn commit_with_retry(session: &mut ClientSession) -> Result<()> {
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(e) if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Abort without masking the original failure; abort errors are best-effort.
pub async fn abort_quietly(session: &mut ClientSession) {
    if let Err(e) = session.abort_transaction().await {
        tracing::warn!("failed to abort transaction: {}", e);
    }
}
