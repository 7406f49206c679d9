//! Session bootstrap.
//!
//! The search results are paged through a stateful UI framework: every
//! "next page" request must carry the view-state token and the session
//! cookie issued with the search landing page. [`Portal::bootstrap`] loads
//! that page once (no authentication, no retry) and captures both, together
//! with the total number of results.

use std::sync::LazyLock;

use ctis_scraper::{ExtractError, find_by_id};
use regex::Regex;
use scraper::Html;

use crate::{Portal, PortalError, PortalRequest, PortalResponse};

/// Portlet serving the search pages.
pub const SEARCH_PORTLET: &str = "emactsearch_WAR_emactpublicportlet";

/// Identifier of the hidden form field holding the view-state token.
pub const VIEW_STATE_FIELD_ID: &str = "_emactsearch_WAR_emactpublicportlet_:javax.faces.ViewState:0";

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "JSESSIONID";

static RESULTS_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r">\s*([\d.,]*)\s*results found</span>").unwrap_or_else(|_| unreachable!())
});

/// Server-side state replayed on every search page request of one harvest.
///
/// Only valid for the harvest it was created for; the portal invalidates it
/// after inactivity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    view_state: String,
    session_id: String,
}

impl SessionToken {
    /// Creates a token from its parts.
    #[must_use]
    pub const fn new(view_state: String, session_id: String) -> Self {
        Self {
            view_state,
            session_id,
        }
    }

    /// The opaque view-state token.
    #[must_use]
    pub fn view_state(&self) -> &str {
        &self.view_state
    }

    /// The session identifier carried by the session cookie.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// `Cookie` header value forwarded with every request of the session.
    #[must_use]
    pub fn cookie_header(&self) -> String {
        format!(
            "COOKIE_SUPPORT=true; GUEST_LANGUAGE_ID=en_GB; accepted_cookie=true; {SESSION_COOKIE}={}",
            self.session_id
        )
    }
}

/// URL of the search landing page.
#[must_use]
pub fn landing_url(base_url: &str) -> String {
    format!(
        "{base_url}/search-for-clinical-trials?p_p_id={SEARCH_PORTLET}&p_p_lifecycle=0\
         &p_p_state=normal&p_p_mode=view\
         &_{SEARCH_PORTLET}__facesViewIdRender=%2FWEB-INF%2Fviews%2Fsearch%2Ftabs%2FsearchResults.xhtml"
    )
}

/// Extracts the session state and total result count from the landing
/// page response.
///
/// # Errors
///
/// Returns [`ExtractError::UnexpectedPageFormat`] (wrapped in
/// [`PortalError::Extract`]) if the results-count marker is missing or
/// appears more than once, or if the view-state field is missing.
/// Returns [`PortalError::MissingSession`] if no session cookie was set.
pub fn parse_landing_page(response: &PortalResponse) -> Result<(SessionToken, u64), PortalError> {
    let total = results_count(&response.body)?;
    let view_state = view_state(&response.body)?;

    let session_id = response
        .cookie(SESSION_COOKIE)
        .filter(|id| !id.is_empty())
        .ok_or(PortalError::MissingSession)?;

    Ok((SessionToken::new(view_state, session_id.to_owned()), total))
}

fn results_count(body: &str) -> Result<u64, ExtractError> {
    let markers: Vec<_> = RESULTS_COUNT_RE.captures_iter(body).collect();

    let [marker] = markers.as_slice() else {
        return Err(ExtractError::unexpected(format!(
            "expected exactly one results-count marker, found {}",
            markers.len()
        )));
    };

    let digits: String = marker[1].chars().filter(char::is_ascii_digit).collect();
    digits
        .parse()
        .map_err(|_| ExtractError::unexpected(format!("unreadable results count '{}'", &marker[1])))
}

fn view_state(body: &str) -> Result<String, ExtractError> {
    let document = Html::parse_document(body);
    find_by_id(document.root_element(), VIEW_STATE_FIELD_ID)?
        .and_then(|field| field.value().attr("value"))
        .map(str::to_owned)
        .ok_or_else(|| ExtractError::unexpected(format!("view-state field '{VIEW_STATE_FIELD_ID}' not found")))
}

impl Portal {
    /// Loads the search landing page and captures the session state and
    /// total number of results.
    ///
    /// # Errors
    ///
    /// Returns any transport error, or the errors of [`parse_landing_page`].
    pub async fn bootstrap(&self) -> Result<(SessionToken, u64), PortalError> {
        let request = PortalRequest::get(landing_url(&self.config().base_url));
        let response = self.send(&request).await?;
        let (token, total) = parse_landing_page(&response)?;

        log::info!("Bootstrapped search session: {total} results");

        Ok((token, total))
    }
}
