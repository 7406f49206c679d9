//! The trial aggregate.
//!
//! A [`Trial`] is a handle on one trial number. Its record views are fetched
//! on first use and cached for the handle's lifetime; every accessor derives
//! its value from whichever view it needs and nothing is computed eagerly.
//! Two handles for the same number do not share a cache.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use ctis_models::{DocumentDescriptor, TrialNumber, ViewKind};
use ctis_scraper::accordion::Accordion;
use ctis_scraper::documents::{documents_after_anchor, documents_after_label};
use ctis_scraper::fields::{date_field, field_text, flag_field, parse_count};
use ctis_scraper::table::{Record, column, table_records};
use ctis_scraper::{ExtractError, element_text, find_by_id, first_table, parse_selector};
use scraper::{ElementRef, Html};

use crate::views::{ViewCache, view_url};
use crate::{Portal, PortalError, PortalRequest};

const FIELD_PREFIX: &str = "_emactview_WAR_emactpublicportlet_:mainFormID:";

const DESCRIPTION_ID: &str = "_emactview_WAR_emactpublicportlet_:ctPublicViewHeaderFornId:trialDescriptionId";

/// Element after which the Part I documents follow.
const PRODUCTS_ANCHOR_ID: &str = "productsDetails";

const COUNTRY_ACCORDION_ID: &str = "countrySpecificDetailsInfoAccordionId";

const ALL_DOCUMENTS_LABEL: &str = "All Documents";

const PLANNED_SUBJECTS_SELECTOR: &str = "span[id$=subjectId]";

const TRIAL_STATUS_TABLE_ID: &str = "trialStatusInfoDataTableId";

const MEMBER_STATE_COLUMN: &str = "Member state";

fn field_id(name: &str) -> String {
    format!("{FIELD_PREFIX}{name}")
}

/// One trial on the portal.
pub struct Trial {
    number: TrialNumber,
    portal: Portal,
    views: ViewCache,
}

impl fmt::Debug for Trial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trial")
            .field("number", &self.number)
            .field("views", &self.views)
            .finish_non_exhaustive()
    }
}

impl Trial {
    /// Creates a handle for `number`. Nothing is fetched.
    #[must_use]
    pub fn new(portal: Portal, number: TrialNumber) -> Self {
        Self {
            number,
            portal,
            views: ViewCache::new(),
        }
    }

    /// The trial number.
    #[must_use]
    pub const fn number(&self) -> &TrialNumber {
        &self.number
    }

    /// Link to the trial's summary page. Does not touch the network.
    #[must_use]
    pub fn link(&self) -> String {
        view_url(&self.portal.config().base_url, &self.number, ViewKind::Summary)
    }

    /// Raw body of one record view, fetching it on first use.
    ///
    /// # Errors
    ///
    /// Returns any transport error of the fetch. A failed fetch is not
    /// cached.
    pub async fn view(&self, kind: ViewKind) -> Result<&str, PortalError> {
        self.views
            .get_or_fetch(kind, || async move {
                let url = view_url(&self.portal.config().base_url, &self.number, kind);
                log::debug!("Fetching {kind} view of {}", self.number);
                let response = self.portal.send(&PortalRequest::get(url)).await?;
                Ok(response.body)
            })
            .await
    }

    async fn extract<T>(
        &self,
        kind: ViewKind,
        extract: impl FnOnce(ElementRef<'_>) -> Result<T, ExtractError>,
    ) -> Result<T, PortalError> {
        let body = self.view(kind).await?;
        let document = Html::parse_document(body);
        Ok(extract(document.root_element())?)
    }

    async fn text(&self, kind: ViewKind, id: &str) -> Result<String, PortalError> {
        self.extract(kind, |root| field_text(root, id)).await
    }

    async fn flag(&self, name: &str) -> Result<bool, PortalError> {
        let id = field_id(name);
        self.extract(ViewKind::Summary, |root| flag_field(root, &id))
            .await
    }

    async fn date(&self, name: &str) -> Result<NaiveDate, PortalError> {
        let id = field_id(name);
        self.extract(ViewKind::Summary, |root| date_field(root, &id))
            .await
    }

    /// Trial scope (Full view).
    ///
    /// # Errors
    ///
    /// Returns a transport error or [`ExtractError::FieldNotFound`].
    pub async fn scope(&self) -> Result<String, PortalError> {
        self.text(ViewKind::Full, &field_id("trialScopeId")).await
    }

    /// Sponsor name.
    ///
    /// # Errors
    ///
    /// Returns a transport error or [`ExtractError::FieldNotFound`].
    pub async fn sponsor(&self) -> Result<String, PortalError> {
        self.text(ViewKind::Summary, &field_id("trialInfoSponsorId"))
            .await
    }

    /// Medical conditions under study.
    ///
    /// # Errors
    ///
    /// Returns a transport error or [`ExtractError::FieldNotFound`].
    pub async fn conditions(&self) -> Result<String, PortalError> {
        self.text(ViewKind::Summary, &field_id("trialInfoConditionsId"))
            .await
    }

    /// Population type, including vulnerable populations.
    ///
    /// # Errors
    ///
    /// Returns a transport error or [`ExtractError::FieldNotFound`].
    pub async fn population_type(&self) -> Result<String, PortalError> {
        self.text(
            ViewKind::Summary,
            &field_id("trialInfoVulnerablePopulationsId"),
        )
        .await
    }

    /// Trial title shown in the page header.
    ///
    /// # Errors
    ///
    /// Returns a transport error or [`ExtractError::FieldNotFound`].
    pub async fn description(&self) -> Result<String, PortalError> {
        self.text(ViewKind::Summary, DESCRIPTION_ID).await
    }

    /// Therapeutic area.
    ///
    /// # Errors
    ///
    /// Returns a transport error or [`ExtractError::FieldNotFound`].
    pub async fn therapeutic_area(&self) -> Result<String, PortalError> {
        self.text(ViewKind::Summary, &field_id("trialInfoTherapeuticAreaId"))
            .await
    }

    /// Trial phase.
    ///
    /// # Errors
    ///
    /// Returns a transport error or [`ExtractError::FieldNotFound`].
    pub async fn phase(&self) -> Result<String, PortalError> {
        self.text(ViewKind::Summary, &field_id("trialInfoTrialPhaseId"))
            .await
    }

    /// Whether this is a low-intervention trial.
    ///
    /// # Errors
    ///
    /// Returns a transport error, [`ExtractError::FieldNotFound`], or
    /// [`ExtractError::UnrecognizedBooleanText`].
    pub async fn is_low_intervention(&self) -> Result<bool, PortalError> {
        self.flag("trialInfoLowInterStudyLabelNoId").await
    }

    /// Whether the trial was transitioned from the previous directive.
    ///
    /// # Errors
    ///
    /// Same as [`Trial::is_low_intervention`].
    pub async fn is_transition_trial(&self) -> Result<bool, PortalError> {
        self.flag("isTransitionedLabelNoId").await
    }

    /// Whether the trial involves a medical device.
    ///
    /// # Errors
    ///
    /// Same as [`Trial::is_low_intervention`].
    pub async fn is_medical_device(&self) -> Result<bool, PortalError> {
        self.flag("trialInfoMedicalDeviceLabelNoId").await
    }

    /// Date the trial was first submitted.
    ///
    /// # Errors
    ///
    /// Returns a transport error, [`ExtractError::FieldNotFound`], or
    /// [`ExtractError::UnparseableDate`].
    pub async fn first_submitted_date(&self) -> Result<NaiveDate, PortalError> {
        // Field identifier is misspelled on the portal.
        self.date("trialInfoFirstSumbittedId").await
    }

    /// Date of the last update.
    ///
    /// # Errors
    ///
    /// Same as [`Trial::first_submitted_date`].
    pub async fn last_update_date(&self) -> Result<NaiveDate, PortalError> {
        self.date("trialInfoLastUpdatedId").await
    }

    /// Documents attached to the trial-wide application (Part I).
    ///
    /// # Errors
    ///
    /// Returns a transport error, [`ExtractError::UnexpectedPageFormat`] if
    /// the products anchor is missing, or
    /// [`ExtractError::MalformedDocumentRow`].
    pub async fn documents_part_one(&self) -> Result<Vec<DocumentDescriptor>, PortalError> {
        self.extract(ViewKind::Full, |root| {
            documents_after_anchor(root, PRODUCTS_ANCHOR_ID)
        })
        .await
    }

    /// Documents attached to each country's application (Part II), keyed
    /// by country.
    ///
    /// # Errors
    ///
    /// Returns a transport error, [`ExtractError::UnexpectedPageFormat`] if
    /// the country accordion is missing, [`ExtractError::SectionNotFound`]
    /// if a country section has no documents label, or
    /// [`ExtractError::MalformedDocumentRow`].
    pub async fn documents_part_two(
        &self,
    ) -> Result<BTreeMap<String, Vec<DocumentDescriptor>>, PortalError> {
        self.extract(ViewKind::Full, |root| {
            country_accordion(root)?
                .iter()
                .map(|(country, section)| {
                    Ok::<_, ExtractError>((
                        country.to_owned(),
                        documents_after_label(section, ALL_DOCUMENTS_LABEL)?,
                    ))
                })
                .collect()
        })
        .await
    }

    /// Planned number of subjects in each country.
    ///
    /// # Errors
    ///
    /// Returns a transport error, [`ExtractError::UnexpectedPageFormat`] if
    /// the country accordion is missing, [`ExtractError::FieldNotFound`] if
    /// a country section has no subject count, or
    /// [`ExtractError::InvalidNumber`].
    pub async fn planned_subjects_by_country(&self) -> Result<BTreeMap<String, u64>, PortalError> {
        self.extract(ViewKind::Full, |root| {
            let selector = parse_selector(PLANNED_SUBJECTS_SELECTOR)?;

            country_accordion(root)?
                .iter()
                .map(|(country, section)| {
                    let span = section.select(&selector).next().ok_or_else(|| {
                        ExtractError::FieldNotFound {
                            field: format!("{country}: {PLANNED_SUBJECTS_SELECTOR}"),
                        }
                    })?;
                    Ok::<_, ExtractError>((country.to_owned(), parse_count(&element_text(span))?))
                })
                .collect()
        })
        .await
    }

    /// Planned number of subjects across all countries.
    ///
    /// # Errors
    ///
    /// Same as [`Trial::planned_subjects_by_country`].
    pub async fn total_planned_subjects(&self) -> Result<u64, PortalError> {
        Ok(self.planned_subjects_by_country().await?.values().sum())
    }

    /// Rows of the overall trial status table on the Summary view, keyed by
    /// column header.
    ///
    /// # Errors
    ///
    /// Returns a transport error, [`ExtractError::SectionNotFound`] if the
    /// table is missing, or [`ExtractError::UnexpectedPageFormat`] if it has
    /// no headers.
    pub async fn overall_trial_status_table(&self) -> Result<Vec<Record>, PortalError> {
        self.extract(ViewKind::Summary, |root| table_records(status_table(root)?))
            .await
    }

    /// Member states in which the trial takes place, in table order.
    ///
    /// # Errors
    ///
    /// Same as [`Trial::overall_trial_status_table`], plus
    /// [`ExtractError::FieldNotFound`] if the member state column is gone.
    pub async fn member_states_concerned(&self) -> Result<Vec<String>, PortalError> {
        self.extract(ViewKind::Summary, |root| {
            column(status_table(root)?, MEMBER_STATE_COLUMN)
        })
        .await
    }

    /// Whether a full protocol has been published among the Part I
    /// documents.
    ///
    /// # Errors
    ///
    /// Same as [`Trial::documents_part_one`].
    pub async fn is_protocol_published(&self) -> Result<bool, PortalError> {
        Ok(self
            .documents_part_one()
            .await?
            .iter()
            .any(DocumentDescriptor::is_published_protocol))
    }
}

fn country_accordion(root: ElementRef<'_>) -> Result<Accordion<'_>, ExtractError> {
    let container = find_by_id(root, COUNTRY_ACCORDION_ID)?.ok_or_else(|| {
        ExtractError::unexpected(format!("country accordion '{COUNTRY_ACCORDION_ID}' not found"))
    })?;
    Accordion::by_country(container)
}

fn status_table(root: ElementRef<'_>) -> Result<ElementRef<'_>, ExtractError> {
    let wrapper = find_by_id(root, TRIAL_STATUS_TABLE_ID)?.ok_or_else(|| {
        ExtractError::SectionNotFound {
            section: TRIAL_STATUS_TABLE_ID.to_owned(),
        }
    })?;
    first_table(wrapper)?.ok_or_else(|| {
        ExtractError::unexpected(format!("'{TRIAL_STATUS_TABLE_ID}' contains no table"))
    })
}

#[cfg(test)]
mod tests {
    use ctis_models::{DocumentType, FileType};

    use super::*;
    use crate::PortalConfig;
    use crate::mock::{MockTransport, full_body, portal_handler};

    fn number() -> TrialNumber {
        "2022-500137-89-00".parse().unwrap()
    }

    #[tokio::test]
    async fn summary_fields() {
        let mock = MockTransport::new(portal_handler);
        let trial = Portal::with_transport(PortalConfig::new(), mock.clone()).trial(number());

        assert_eq!(trial.sponsor().await.unwrap(), "Acme Pharma");
        assert_eq!(trial.conditions().await.unwrap(), "Asthma");
        assert_eq!(trial.population_type().await.unwrap(), "Adults");
        assert_eq!(trial.description().await.unwrap(), "A study of things");
        assert_eq!(trial.therapeutic_area().await.unwrap(), "Respiratory");
        assert_eq!(trial.phase().await.unwrap(), "Phase III");
        assert!(!trial.is_low_intervention().await.unwrap());
        assert!(trial.is_transition_trial().await.unwrap());
        assert!(!trial.is_medical_device().await.unwrap());
        assert_eq!(
            trial.first_submitted_date().await.unwrap(),
            NaiveDate::from_ymd_opt(2022, 3, 7).unwrap()
        );
        assert_eq!(
            trial.last_update_date().await.unwrap(),
            NaiveDate::from_ymd_opt(2023, 11, 15).unwrap()
        );

        assert_eq!(mock.request_count(), 1);
        assert_eq!(mock.count_matching("summary.xhtml"), 1);
    }

    #[tokio::test]
    async fn concurrent_accessors_share_one_fetch() {
        let mock = MockTransport::new(portal_handler);
        let trial = Portal::with_transport(PortalConfig::new(), mock.clone()).trial(number());

        let (sponsor, phase) = tokio::join!(trial.sponsor(), trial.phase());

        assert_eq!(sponsor.unwrap(), "Acme Pharma");
        assert_eq!(phase.unwrap(), "Phase III");
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn each_view_is_fetched_at_most_once() {
        let _ = pretty_env_logger::try_init();
        let mock = MockTransport::new(portal_handler);
        let trial = Portal::with_transport(PortalConfig::new(), mock.clone()).trial(number());

        trial.scope().await.unwrap();
        trial.documents_part_one().await.unwrap();
        trial.member_states_concerned().await.unwrap();
        trial.total_planned_subjects().await.unwrap();
        trial.sponsor().await.unwrap();
        trial.view(ViewKind::Results).await.unwrap();
        trial.view(ViewKind::Results).await.unwrap();

        assert_eq!(mock.count_matching("fullInformation.xhtml"), 1);
        assert_eq!(mock.count_matching("summary.xhtml"), 1);
        assert_eq!(mock.count_matching("trialResults.xhtml"), 1);
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn separate_handles_do_not_share_views() {
        let mock = MockTransport::new(portal_handler);
        let portal = Portal::with_transport(PortalConfig::new(), mock.clone());

        portal.trial(number()).sponsor().await.unwrap();
        portal.trial(number()).sponsor().await.unwrap();

        assert_eq!(mock.request_count(), 2);
    }

    #[tokio::test]
    async fn link_needs_no_network() {
        let mock = MockTransport::new(portal_handler);
        let portal = Portal::with_transport(
            PortalConfig::new().with_base_url("https://portal.test/"),
            mock.clone(),
        );
        let link = portal.trial(number()).link();

        assert!(link.starts_with("https://portal.test/view-clinical-trial?"));
        assert!(link.contains("number=2022-500137-89-00"));
        assert!(link.ends_with("summary.xhtml"));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn part_one_documents() {
        let trial = Portal::with_transport(PortalConfig::new(), MockTransport::new(portal_handler))
            .trial(number());

        let documents = trial.documents_part_one().await.unwrap();

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].url.as_deref(), Some("/docs/1"));
        assert_eq!(documents[0].title, "Protocol v2");
        assert_eq!(documents[0].file_type, FileType::Pdf);
        assert_eq!(documents[0].document_type, DocumentType::Protocol);
        assert_eq!(documents[1].url, None);
        assert_eq!(documents[1].title, "Cover letter");
        assert_eq!(documents[1].file_type, FileType::Unspecified);
        assert!(trial.is_protocol_published().await.unwrap());
    }

    #[tokio::test]
    async fn part_two_documents_by_country() {
        let trial = Portal::with_transport(PortalConfig::new(), MockTransport::new(portal_handler))
            .trial(number());

        let documents = trial.documents_part_two().await.unwrap();

        assert_eq!(documents.keys().collect::<Vec<_>>(), vec!["France", "Germany"]);
        assert_eq!(documents["France"].len(), 1);
        assert_eq!(documents["France"][0].file_type, FileType::Docx);
        assert!(documents["Germany"].is_empty());
    }

    #[tokio::test]
    async fn total_subjects_is_the_sum_over_countries() {
        let trial = Portal::with_transport(PortalConfig::new(), MockTransport::new(portal_handler))
            .trial(number());

        let by_country = trial.planned_subjects_by_country().await.unwrap();

        assert_eq!(by_country.get("France"), Some(&120));
        assert_eq!(by_country.get("Germany"), Some(&30));
        assert_eq!(
            trial.total_planned_subjects().await.unwrap(),
            by_country.values().sum::<u64>()
        );
    }

    #[tokio::test]
    async fn member_states_from_status_table() {
        let trial = Portal::with_transport(PortalConfig::new(), MockTransport::new(portal_handler))
            .trial(number());

        let table = trial.overall_trial_status_table().await.unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[1].get("Status").map(String::as_str), Some("Authorised"));

        assert_eq!(
            trial.member_states_concerned().await.unwrap(),
            vec!["France".to_owned(), "Germany".to_owned()]
        );
    }

    #[tokio::test]
    async fn missing_country_accordion_is_unexpected() {
        let mock = MockTransport::new(|request: &PortalRequest| {
            let body = full_body().replace(COUNTRY_ACCORDION_ID, "somethingElse");
            Ok(crate::PortalResponse::ok(&request.url, body))
        });
        let trial = Portal::with_transport(PortalConfig::new(), mock).trial(number());

        assert!(matches!(
            trial.documents_part_two().await,
            Err(PortalError::Extract(ExtractError::UnexpectedPageFormat { .. }))
        ));
        assert!(matches!(
            trial.planned_subjects_by_country().await,
            Err(PortalError::Extract(ExtractError::UnexpectedPageFormat { .. }))
        ));
    }

    #[tokio::test]
    async fn missing_field_is_reported() {
        let mock = MockTransport::new(|request: &PortalRequest| {
            Ok(crate::PortalResponse::ok(&request.url, "<html><body></body></html>"))
        });
        let trial = Portal::with_transport(PortalConfig::new(), mock).trial(number());

        assert!(matches!(
            trial.sponsor().await,
            Err(PortalError::Extract(ExtractError::FieldNotFound { .. }))
        ));
        assert!(matches!(
            trial.member_states_concerned().await,
            Err(PortalError::Extract(ExtractError::SectionNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn failed_view_fetch_is_retried_on_next_access() {
        let mock = MockTransport::new(|request: &PortalRequest| {
            Err(PortalError::Timeout {
                url: request.url.clone(),
            })
        });
        let trial = Portal::with_transport(PortalConfig::new(), mock.clone()).trial(number());

        assert!(matches!(trial.scope().await, Err(PortalError::Timeout { .. })));
        assert!(trial.scope().await.is_err());
        assert_eq!(mock.request_count(), 2);
    }
}
