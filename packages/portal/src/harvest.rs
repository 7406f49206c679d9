//! Pagination harvester.
//!
//! Pages through the search results with the state captured by
//! [`Portal::bootstrap`] and collects every trial number. Each page is a
//! partial-ajax `POST` replaying the view-state token and session cookie;
//! trial numbers are pattern-matched over the raw response body because the
//! result rows are not uniformly addressable.
//!
//! Exactly `ceil(total / page_size)` pages are requested, with no early exit
//! on pages that contribute nothing new.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use ctis_models::TrialNumber;
use futures::StreamExt as _;

use crate::progress::{ProgressCallback, null_progress};
use crate::session::{SEARCH_PORTLET, SessionToken, landing_url};
use crate::{Portal, PortalError, PortalRequest};

const MAIN_FORM: &str = "_emactsearch_WAR_emactpublicportlet_:mainFormID";

/// Number of search pages needed to cover `total` results.
#[must_use]
pub fn page_count(total: u64, page_size: u32) -> u64 {
    total.div_ceil(u64::from(page_size.max(1)))
}

/// URL the paginator posts to.
#[must_use]
pub fn results_url(base_url: &str) -> String {
    format!(
        "{base_url}/search-for-clinical-trials?p_p_id={SEARCH_PORTLET}&p_p_lifecycle=2\
         &p_p_state=normal&p_p_mode=view&p_p_cacheability=cacheLevelPage\
         &p_p_col_id=column-1&p_p_col_count=1\
         &_{SEARCH_PORTLET}__jsfBridgeAjax=true\
         &_{SEARCH_PORTLET}__facesViewIdResource=%2FWEB-INF%2Fviews%2Fsearch%2Ftabs%2FsearchResults.xhtml"
    )
}

/// Builds the request for one (1-based) search page.
#[must_use]
pub fn page_request(base_url: &str, page_size: u32, token: &SessionToken, page: u64) -> PortalRequest {
    let url = results_url(base_url);
    let paginator = format!("{MAIN_FORM}:trialSearchResultsPaginatorId");

    let form = [
        (MAIN_FORM.to_owned(), MAIN_FORM.to_owned()),
        ("javax.faces.encodedURL".to_owned(), url.clone()),
        (format!("{MAIN_FORM}:j_idt34"), "decisionDate".to_owned()),
        (format!("{MAIN_FORM}:j_idt37"), "DESC".to_owned()),
        (
            format!("{MAIN_FORM}:trialSearchResultsDataTableId_selectedRowIndexes"),
            String::new(),
        ),
        (
            format!("{MAIN_FORM}:searchResultRowsPerPageId"),
            page_size.to_string(),
        ),
        ("javax.faces.ViewState".to_owned(), token.view_state().to_owned()),
        ("javax.faces.source".to_owned(), paginator.clone()),
        ("javax.faces.partial.event".to_owned(), "click".to_owned()),
        (
            "javax.faces.partial.execute".to_owned(),
            format!("{paginator} {paginator}"),
        ),
        (
            "javax.faces.partial.render".to_owned(),
            format!("{paginator} {MAIN_FORM}:trialSearchResultsDataTableId"),
        ),
        (format!("{paginator}_paginatorAction"), page.to_string()),
        ("javax.faces.behavior.event".to_owned(), "action".to_owned()),
        ("javax.faces.partial.ajax".to_owned(), "true".to_owned()),
    ];

    PortalRequest::post_form(url, Vec::from(form))
        .with_header("Faces-Request", "partial/ajax")
        .with_header("Referer", &landing_url(base_url))
        .with_header("Cookie", &token.cookie_header())
}

impl Portal {
    /// Fetches every search page and returns the union of the trial numbers
    /// found on them.
    ///
    /// Up to [`crate::PortalConfig::concurrency`] pages are in flight at
    /// once; the result does not depend on the order they complete in.
    ///
    /// # Errors
    ///
    /// Returns the first transport error encountered. Nothing is retried
    /// unless the portal's transport does so itself.
    pub async fn harvest(
        &self,
        token: &SessionToken,
        total: u64,
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<BTreeSet<TrialNumber>, PortalError> {
        let config = self.config();
        let page_size = config.page_size.max(1);
        let pages = page_count(total, page_size);
        let delay = config.delay_ms.map(Duration::from_millis);

        progress.set_total(pages);
        log::info!(
            "Harvesting {total} results over {pages} pages (page size {}, concurrency {})",
            page_size,
            config.concurrency
        );

        let mut fetches = futures::stream::iter(1..=pages)
            .map(|page| {
                let request = page_request(&config.base_url, page_size, token, page);
                async move {
                    if page > 1
                        && let Some(delay) = delay
                    {
                        tokio::time::sleep(delay).await;
                    }
                    log::debug!("Fetching search page {page}/{pages}");
                    let response = self.send(&request).await?;
                    let found: Vec<TrialNumber> = TrialNumber::find_all(&response.body).collect();
                    Ok::<_, PortalError>((page, found))
                }
            })
            .buffer_unordered(config.concurrency.max(1));

        let mut numbers = BTreeSet::new();

        while let Some(result) = fetches.next().await {
            let (page, found) = result?;
            let before = numbers.len();
            let on_page = found.len();
            numbers.extend(found);

            let message = format!(
                "page {page}: {on_page} trial numbers, {} new",
                numbers.len() - before
            );
            log::debug!("{message}");
            progress.set_message(message);
            progress.inc(1);
        }

        log::info!("Harvest complete: {} unique trial numbers", numbers.len());
        progress.finish(format!("{} trial numbers", numbers.len()));

        Ok(numbers)
    }

    /// Bootstraps a search session and harvests every trial number.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Portal::bootstrap`] or [`Portal::harvest`].
    pub async fn all_trial_numbers(&self) -> Result<BTreeSet<TrialNumber>, PortalError> {
        let (token, total) = self.bootstrap().await?;
        self.harvest(&token, total, &null_progress()).await
    }
}
