//! Opt-in retry layer for transient transport failures.
//!
//! The core client never retries on its own. Wrap a transport in
//! [`RetryTransport`] (or set [`crate::PortalConfig::retry`] before calling
//! [`crate::Portal::new`]) to retry timeouts, connection failures, HTTP 429
//! and HTTP 5xx with exponential backoff.
//!
//! ```ignore
//! let http = HttpTransport::new(&config)?;
//! let transport = RetryTransport::new(http, RetryPolicy {
//!     max_retries: 5,
//!     base_delay: Duration::from_secs(2),
//! });
//! let portal = Portal::with_transport(config, Arc::new(transport));
//! ```
//!
//! Other 4xx responses are permanent and returned immediately.

use async_trait::async_trait;

use crate::{PortalError, PortalRequest, PortalResponse, RetryPolicy, Transport};

/// [`Transport`] wrapper that retries transient failures.
#[derive(Debug, Clone)]
pub struct RetryTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryTransport<T> {
    /// Wraps `inner` with the given policy.
    #[must_use]
    pub const fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Returns the wrapped transport.
    #[must_use]
    pub const fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryTransport<T> {
    async fn execute(&self, request: &PortalRequest) -> Result<PortalResponse, PortalError> {
        let max_retries = self.policy.max_retries;
        let mut attempt = 0;

        loop {
            match self.inner.execute(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < max_retries => {
                    attempt += 1;
                    let delay = self.policy.delay_for(attempt);
                    log::warn!(
                        "  transient error on {}: {e}; retry {attempt}/{max_retries} in {delay:?}...",
                        request.url
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if attempt > 0 {
                        log::error!(
                            "Request to {} failed after {attempt} retries: {e}",
                            request.url
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}
