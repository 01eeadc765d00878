//! Retrying after commit races
//!
//! A commit that races another one fails with
//! [`ScmError::CheckoutNeedsUpdate`]. The fix is always the same: bring the
//! checkout up to date and run the whole sequence again.

use std::future::Future;
use tracing::warn;

use crate::{Result, ScmError};

/// Run `attempt`, resynchronizing with `resync` after each retryable failure
///
/// Gives up after `max_attempts` tries and returns the last error. Errors
/// that are not retryable, including failures of `resync` itself, are
/// returned immediately.
///
/// ```no_run
/// use cq_core::retry::retry_on_stale_checkout;
/// use cq_core::Result;
///
/// async fn land() -> Result<String> {
///     Ok("Committed revision 47346.".to_string())
/// }
///
/// async fn update() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() -> Result<String> {
///     retry_on_stale_checkout("land", 3, || land(), || update()).await
/// }
/// ```
pub async fn retry_on_stale_checkout<A, AFut, R, RFut, T>(
    operation_name: &str,
    max_attempts: usize,
    mut attempt: A,
    mut resync: R,
) -> Result<T>
where
    A: FnMut() -> AFut,
    AFut: Future<Output = Result<T>>,
    R: FnMut() -> RFut,
    RFut: Future<Output = Result<()>>,
{
    let max_attempts = max_attempts.max(1);
    let mut tries = 1;
    loop {
        match attempt().await {
            Err(e) if e.is_retryable() && tries < max_attempts => {
                warn!(
                    "{} raced another commit (attempt {}/{}): {}",
                    operation_name, tries, max_attempts, e
                );
                resync().await?;
                tries += 1;
            }
            Err(e) if e.is_retryable() => {
                warn!(
                    "{} still out of date after {} attempts",
                    operation_name, max_attempts
                );
                return Err(e);
            }
            result => return result,
        }
    }
}

/// Whether `result` failed only because the checkout was stale
pub fn needs_update<T>(result: &Result<T>) -> bool {
    matches!(result, Err(ScmError::CheckoutNeedsUpdate(_)))
}
