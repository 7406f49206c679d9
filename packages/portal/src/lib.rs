#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Client for the CTIS clinical-trials public portal.
//!
//! The portal exposes no API, only server-rendered pages driven by a
//! stateful UI framework. This crate replays the minimum state needed to use
//! it:
//!
//! 1. [`Portal::bootstrap`] loads the search page once and captures the
//!    view-state token, the session cookie, and the total result count.
//! 2. [`Portal::harvest`] pages through the search results with that state
//!    and collects every trial number.
//! 3. [`Trial`] fetches a trial's record views lazily, at most once each,
//!    and derives typed fields from them with [`ctis_scraper`].
//!
//! All networking goes through the [`Transport`] trait. [`HttpTransport`]
//! is the reqwest implementation; [`RetryTransport`] adds opt-in retry with
//! exponential backoff for transient failures.

pub mod config;
pub mod harvest;
pub mod maintenance;
pub mod progress;
pub mod retry;
pub mod session;
pub mod transport;
pub mod trial;
pub mod views;

#[cfg(test)]
mod mock;

use std::sync::Arc;

pub use config::{PortalConfig, RetryPolicy};
pub use ctis_models::{DocumentDescriptor, DocumentType, FileType, TrialNumber, ViewKind};
pub use ctis_scraper::ExtractError;
pub use maintenance::{is_maintenance_window, is_maintenance_window_now};
pub use progress::{NullProgress, ProgressCallback, null_progress};
pub use retry::RetryTransport;
pub use session::SessionToken;
pub use transport::{HttpTransport, PortalRequest, PortalResponse, Transport};
pub use trial::Trial;

/// Errors that can occur while talking to the portal.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// The HTTP request could not be completed.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The portal answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("Request timed out: {url}")]
    Timeout {
        /// Requested URL.
        url: String,
    },

    /// The search page did not set a session cookie.
    #[error("Portal did not set a session cookie")]
    MissingSession,

    /// A page could not be interpreted.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// A trial number was malformed.
    #[error(transparent)]
    InvalidTrialNumber(#[from] ctis_models::InvalidTrialNumber),

    /// The client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

impl PortalError {
    /// Returns `true` for network-level failures and non-success responses.
    #[must_use]
    pub const fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Status { .. } | Self::Timeout { .. }
        )
    }

    /// Returns `true` if the failure is likely transient and worth retrying:
    /// timeouts, connection errors, HTTP 429, and HTTP 5xx.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_body() || e.is_request(),
            _ => false,
        }
    }
}

/// Entry point to the portal.
///
/// Cheap to clone; clones share the transport and configuration.
#[derive(Clone)]
pub struct Portal {
    transport: Arc<dyn Transport>,
    config: Arc<PortalConfig>,
}

impl std::fmt::Debug for Portal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Portal")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Portal {
    /// Creates a portal client backed by [`HttpTransport`].
    ///
    /// When the configuration's retry policy allows retries, the transport
    /// is wrapped in a [`RetryTransport`].
    ///
    /// # Errors
    ///
    /// Returns [`PortalError`] if the HTTP client cannot be built.
    pub fn new(config: PortalConfig) -> Result<Self, PortalError> {
        let http = HttpTransport::new(&config)?;
        let transport: Arc<dyn Transport> = if config.retry.max_retries > 0 {
            Arc::new(RetryTransport::new(http, config.retry.clone()))
        } else {
            Arc::new(http)
        };
        Ok(Self::with_transport(config, transport))
    }

    /// Creates a portal client configured from `CTIS_*` environment
    /// variables. See [`PortalConfig::from_env`].
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Config`] for invalid variables, or any error
    /// of [`Portal::new`].
    pub fn from_env() -> Result<Self, PortalError> {
        Self::new(PortalConfig::from_env()?)
    }

    /// Creates a portal client over an arbitrary transport.
    #[must_use]
    pub fn with_transport(config: PortalConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Returns a handle to one trial. Nothing is fetched until a field is
    /// requested.
    #[must_use]
    pub fn trial(&self, number: TrialNumber) -> Trial {
        Trial::new(self.clone(), number)
    }

    pub(crate) async fn send(&self, request: &PortalRequest) -> Result<PortalResponse, PortalError> {
        self.transport.execute(request).await
    }
}
