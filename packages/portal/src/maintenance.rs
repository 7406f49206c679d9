//! Scheduled maintenance windows and the outage check.
//!
//! The portal publishes a fixed schedule, in Amsterdam time:
//!
//! - every Tuesday and Thursday, 18:00 to 21:00;
//! - the first Saturday of each month, 10:00 to 14:00.

use chrono::{DateTime, Datelike as _, TimeZone, Timelike as _, Utc, Weekday};
use chrono_tz::Europe::Amsterdam;

use crate::{Portal, PortalError, PortalRequest};

/// Status page announcing outages.
pub const OUTAGE_PAGE_PATH: &str = "/website-outages-and-system-releases";

/// Banner shown on [`OUTAGE_PAGE_PATH`] while the portal is down.
pub const OUTAGE_BANNER: &str = "CTIS public portal is temporarily unavailable";

/// Returns `true` if `time` falls inside a scheduled maintenance window.
#[must_use]
pub fn is_maintenance_window<Tz: TimeZone>(time: &DateTime<Tz>) -> bool {
    let local = time.with_timezone(&Amsterdam);
    let hour = local.hour();

    match local.weekday() {
        Weekday::Tue | Weekday::Thu => (18..21).contains(&hour),
        Weekday::Sat => local.day() <= 7 && (10..14).contains(&hour),
        _ => false,
    }
}

/// [`is_maintenance_window`] for the current time.
#[must_use]
pub fn is_maintenance_window_now() -> bool {
    is_maintenance_window(&Utc::now())
}

/// Returns `true` if the outage banner appears in `body`.
#[must_use]
pub fn banner_present(body: &str) -> bool {
    body.contains(OUTAGE_BANNER)
}

impl Portal {
    /// Checks the status page for an outage announcement.
    ///
    /// # Errors
    ///
    /// Returns any transport error of the status page request.
    pub async fn is_unavailable(&self) -> Result<bool, PortalError> {
        let url = format!("{}{OUTAGE_PAGE_PATH}", self.config().base_url);
        let response = self.send(&PortalRequest::get(url)).await?;
        let unavailable = banner_present(&response.body);

        if unavailable {
            log::warn!("Portal reports an outage");
        }

        Ok(unavailable)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, NaiveDate};

    use super::*;
    use crate::mock::MockTransport;
    use crate::{PortalConfig, PortalResponse};

    fn amsterdam(y: i32, m: u32, d: u32, h: u32) -> DateTime<chrono_tz::Tz> {
        Amsterdam
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(y, m, d)
                    .unwrap()
                    .and_hms_opt(h, 0, 0)
                    .unwrap(),
            )
            .single()
            .unwrap()
    }

    #[test]
    fn tuesday_evening_is_in_window() {
        assert!(is_maintenance_window(&amsterdam(2024, 3, 5, 19)));
        assert!(is_maintenance_window(&amsterdam(2024, 3, 7, 18)));
        assert!(!is_maintenance_window(&amsterdam(2024, 3, 5, 21)));
        assert!(!is_maintenance_window(&amsterdam(2024, 3, 5, 17)));
    }

    #[test]
    fn wednesday_evening_is_not() {
        assert!(!is_maintenance_window(&amsterdam(2024, 3, 6, 19)));
    }

    #[test]
    fn only_the_first_saturday_counts() {
        assert!(is_maintenance_window(&amsterdam(2024, 3, 2, 11)));
        assert!(!is_maintenance_window(&amsterdam(2024, 3, 9, 11)));
        assert!(!is_maintenance_window(&amsterdam(2024, 3, 2, 14)));
        assert!(!is_maintenance_window(&amsterdam(2024, 3, 3, 11)));
    }

    #[test]
    fn other_timezones_are_converted() {
        // 18:00 UTC is 19:00 in Amsterdam (CET) on this Tuesday.
        let utc = Utc.with_ymd_and_hms(2024, 3, 5, 18, 0, 0).single().unwrap();
        assert!(is_maintenance_window(&utc));

        // 16:30 UTC is 17:30 in Amsterdam, before the window opens.
        let early = Utc.with_ymd_and_hms(2024, 3, 5, 16, 30, 0).single().unwrap();
        assert!(!is_maintenance_window(&early));

        let new_york = FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 5, 13, 0, 0)
            .single()
            .unwrap();
        assert!(is_maintenance_window(&new_york));
    }

    #[tokio::test]
    async fn status_page_with_banner() {
        let mock = MockTransport::new(|request: &PortalRequest| {
            Ok(PortalResponse::ok(
                &request.url,
                format!("<p>{OUTAGE_BANNER} due to maintenance.</p>"),
            ))
        });
        let portal = Portal::with_transport(PortalConfig::new(), mock.clone());

        assert!(portal.is_unavailable().await.unwrap());
        assert!(mock.requests()[0].url.ends_with(OUTAGE_PAGE_PATH));
    }

    #[tokio::test]
    async fn status_page_without_banner() {
        let mock = MockTransport::new(|request: &PortalRequest| {
            Ok(PortalResponse::ok(&request.url, "<p>All systems normal</p>"))
        });
        let portal = Portal::with_transport(PortalConfig::new(), mock);

        assert!(!portal.is_unavailable().await.unwrap());
    }
}
