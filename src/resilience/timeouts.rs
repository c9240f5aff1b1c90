//! Deadline enforcement for protected calls.
//!
//! # Responsibilities
//! - Bound every protected call by the breaker's `timeout_seconds`
//! - Report a missed deadline distinctly from an operation error
//! - Let the caller abandon a call without it being judged
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; an expired future is dropped, which is
//!   the cancellation signal the downstream operation receives
//! - Caller cancellation wins over a simultaneous completion

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a deadline-bounded future ended.
#[derive(Debug, PartialEq, Eq)]
pub enum Deadline<T> {
    /// The future resolved in time.
    Completed(T),
    /// The deadline passed first.
    Elapsed,
    /// The caller's token fired first.
    Cancelled,
}

/// Drive `fut` to completion, giving up after `limit` or when `cancel` fires.
pub async fn run_with_deadline<F>(
    limit: Duration,
    cancel: Option<&CancellationToken>,
    fut: F,
) -> Deadline<F::Output>
where
    F: Future,
{
    let bounded = tokio::time::timeout(limit, fut);

    match cancel {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Deadline::Cancelled,
                res = bounded => res.map_or(Deadline::Elapsed, Deadline::Completed),
            }
        }
        None => bounded.await.map_or(Deadline::Elapsed, Deadline::Completed),
    }
}
