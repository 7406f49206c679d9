//! Client configuration.

use std::time::Duration;

use crate::PortalError;

/// Public portal host.
pub const DEFAULT_BASE_URL: &str = "https://euclinicaltrials.eu";

/// Number of search results per page. Fixed by the portal.
pub const PORTAL_PAGE_SIZE: u32 = 20;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Browser-like user agent; the portal serves degraded markup to unknown
/// clients.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:102.0) Gecko/20100101 Firefox/102.0";

/// Retry behaviour of [`crate::RetryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }
}

/// Configuration shared by every request a [`crate::Portal`] makes.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Scheme and host of the portal, without a trailing slash.
    pub base_url: String,
    /// Search results per page.
    pub page_size: u32,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Delay in milliseconds before each search page after the first.
    pub delay_ms: Option<u64>,
    /// Maximum number of search pages in flight at once. `1` fetches pages
    /// strictly in sequence.
    pub concurrency: usize,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Retry policy used by [`crate::Portal::new`].
    pub retry: RetryPolicy,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            page_size: PORTAL_PAGE_SIZE,
            timeout: DEFAULT_TIMEOUT,
            delay_ms: None,
            concurrency: 1,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            retry: RetryPolicy::default(),
        }
    }
}

impl PortalConfig {
    /// Creates a configuration for the public portal with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads overrides from the environment:
    ///
    /// - `CTIS_BASE_URL`
    /// - `CTIS_TIMEOUT_SECS`
    /// - `CTIS_PAGE_DELAY_MS`
    /// - `CTIS_CONCURRENCY`
    /// - `CTIS_MAX_RETRIES`
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Config`] if a variable is set to an invalid
    /// value.
    pub fn from_env() -> Result<Self, PortalError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PortalError> {
        let mut config = Self::default();

        if let Some(url) = lookup("CTIS_BASE_URL") {
            config = config.with_base_url(&url);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "CTIS_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "CTIS_PAGE_DELAY_MS")? {
            config.delay_ms = Some(ms);
        }
        if let Some(n) = parse_var::<usize>(&lookup, "CTIS_CONCURRENCY")? {
            if n == 0 {
                return Err(PortalError::Config {
                    message: "CTIS_CONCURRENCY must be at least 1".to_owned(),
                });
            }
            config.concurrency = n;
        }
        if let Some(n) = parse_var::<u32>(&lookup, "CTIS_MAX_RETRIES")? {
            config.retry.max_retries = n;
        }

        Ok(config)
    }

    /// Sets the portal host.
    #[must_use]
    pub fn with_base_url(mut self, url: &str) -> Self {
        url.trim_end_matches('/').clone_into(&mut self.base_url);
        self
    }

    /// Sets the search page size (at least 1).
    #[must_use]
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the delay between search page fetches.
    #[must_use]
    pub const fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay_ms = Some(ms);
        self
    }

    /// Sets how many search pages may be fetched concurrently (at least 1).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        user_agent.clone_into(&mut self.user_agent);
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, PortalError> {
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| PortalError::Config {
                message: format!("{key} has invalid value '{raw}'"),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_portal() {
        let config = PortalConfig::new();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.page_size, 20);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn reads_overrides() {
        let config = PortalConfig::from_lookup(lookup(&[
            ("CTIS_BASE_URL", "http://localhost:8080/"),
            ("CTIS_TIMEOUT_SECS", "5"),
            ("CTIS_CONCURRENCY", "4"),
            ("CTIS_MAX_RETRIES", "3"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.delay_ms, None);
    }

    #[test]
    fn rejects_invalid_values() {
        let err = PortalConfig::from_lookup(lookup(&[("CTIS_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, PortalError::Config { .. }));

        let err = PortalConfig::from_lookup(lookup(&[("CTIS_CONCURRENCY", "0")])).unwrap_err();
        assert!(matches!(err, PortalError::Config { .. }));
    }

    #[test]
    fn builders_clamp_to_one() {
        let config = PortalConfig::new().with_page_size(0).with_concurrency(0);
        assert_eq!(config.page_size, 1);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    }
}
