//! Record view fetching and per-trial caching.
//!
//! A trial is rendered as three independent pages ([`ViewKind`]). Each
//! [`crate::Trial`] owns one [`ViewCache`]; a slot is filled by the first
//! access and never refetched. Concurrent first accesses share a single
//! in-flight fetch.
//!
//! The cache holds raw page bodies: parsed documents are not `Send`, so
//! they are built per access in synchronous code.

use std::future::Future;

use ctis_models::{TrialNumber, ViewKind};
use tokio::sync::OnceCell;

use crate::PortalError;

/// Portlet serving the record views.
pub const VIEW_PORTLET: &str = "emactview_WAR_emactpublicportlet";

/// URL of one record view.
#[must_use]
pub fn view_url(base_url: &str, number: &TrialNumber, kind: ViewKind) -> String {
    format!(
        "{base_url}/view-clinical-trial?p_p_id={VIEW_PORTLET}&p_p_lifecycle=0\
         &p_p_state=normal&p_p_mode=view&p_p_col_id=column-1&p_p_col_count=1\
         &_{VIEW_PORTLET}_number={number}\
         &_{VIEW_PORTLET}__facesViewIdRender=%2FWEB-INF%2Fviews%2Fview%2Ftabs%2F{}",
        kind.facelet()
    )
}

/// One lazily populated slot per [`ViewKind`].
#[derive(Debug, Default)]
pub struct ViewCache {
    full: OnceCell<String>,
    results: OnceCell<String>,
    summary: OnceCell<String>,
}

impl ViewCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    const fn slot(&self, kind: ViewKind) -> &OnceCell<String> {
        match kind {
            ViewKind::Full => &self.full,
            ViewKind::Results => &self.results,
            ViewKind::Summary => &self.summary,
        }
    }

    /// Returns the cached body for `kind`, running `fetch` to fill the slot
    /// if it is empty.
    ///
    /// A failed fetch leaves the slot empty so a later call can try again.
    ///
    /// # Errors
    ///
    /// Returns the error of `fetch`.
    pub async fn get_or_fetch<F, Fut>(&self, kind: ViewKind, fetch: F) -> Result<&str, PortalError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, PortalError>>,
    {
        self.slot(kind)
            .get_or_try_init(fetch)
            .await
            .map(String::as_str)
    }

    /// Returns the cached body for `kind` without fetching.
    #[must_use]
    pub fn get(&self, kind: ViewKind) -> Option<&str> {
        self.slot(kind).get().map(String::as_str)
    }
}
