//! Progress reporting for the search harvest.
//!
//! [`Portal::harvest`](crate::Portal::harvest) reports one unit per search
//! page. Rendering (a progress bar, log lines, nothing) is left to the
//! caller.

use std::sync::Arc;

/// Receives page-level progress from a harvest.
///
/// Shared across concurrently fetched pages, hence `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Number of search pages the harvest will fetch.
    fn set_total(&self, total: u64);

    /// `delta` more pages have been parsed.
    fn inc(&self, delta: u64);

    /// Short status line for the most recent page.
    fn set_message(&self, msg: String);

    /// The harvest has finished; `msg` summarizes the result.
    fn finish(&self, msg: String);
}

/// Discards all progress.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// A shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
