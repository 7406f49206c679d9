//! In-memory [`Transport`] and page fixtures shared by the unit tests.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::session::VIEW_STATE_FIELD_ID;
use crate::{PortalError, PortalRequest, PortalResponse, Transport};

/// Answers every request with `handler` and records it.
pub struct MockTransport<F> {
    handler: F,
    requests: Mutex<Vec<PortalRequest>>,
}

impl<F> MockTransport<F>
where
    F: Fn(&PortalRequest) -> Result<PortalResponse, PortalError> + Send + Sync,
{
    pub fn new(handler: F) -> Arc<Self> {
        Arc::new(Self {
            handler,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<PortalRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.url.contains(needle))
            .count()
    }
}

#[async_trait]
impl<F> Transport for MockTransport<F>
where
    F: Fn(&PortalRequest) -> Result<PortalResponse, PortalError> + Send + Sync,
{
    async fn execute(&self, request: &PortalRequest) -> Result<PortalResponse, PortalError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        tokio::task::yield_now().await;
        (self.handler)(request)
    }
}

pub const FIELD_PREFIX: &str = "_emactview_WAR_emactpublicportlet_:mainFormID:";

pub fn landing_body(count: &str) -> String {
    format!(
        r#"<html><body><form id="mainFormID">
            <span class="results">{count} results found</span>
            <input type="hidden" id="{VIEW_STATE_FIELD_ID}" value="-123:456" />
        </form></body></html>"#
    )
}

pub fn landing_response(count: &str) -> PortalResponse {
    PortalResponse::ok("https://x", landing_body(count))
        .with_set_cookie("JSESSIONID=S1; Path=/; HttpOnly")
}

/// Partial-response body listing `numbers` the way a search page does.
pub fn search_page_body(numbers: &[&str]) -> String {
    let rows: String = numbers
        .iter()
        .map(|n| format!(r#"<tr><td><a href="/view?number={n}">{n}</a></td></tr>"#))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><partial-response><changes>
            <update id="results"><![CDATA[<table><tbody>{rows}</tbody></table>]]></update>
        </changes></partial-response>"#
    )
}

pub fn summary_body() -> String {
    let p = FIELD_PREFIX;
    format!(
        r#"<html><body>
        <div id="_emactview_WAR_emactpublicportlet_:ctPublicViewHeaderFornId:trialDescriptionId">
            A study of things
        </div>
        <form>
            <span id="{p}trialInfoSponsorId"> Acme Pharma </span>
            <span id="{p}trialInfoConditionsId">Asthma</span>
            <span id="{p}trialInfoVulnerablePopulationsId">Adults</span>
            <span id="{p}trialInfoTherapeuticAreaId">Respiratory</span>
            <span id="{p}trialInfoTrialPhaseId">Phase III</span>
            <span id="{p}trialInfoLowInterStudyLabelNoId">No</span>
            <span id="{p}isTransitionedLabelNoId">Yes</span>
            <span id="{p}trialInfoMedicalDeviceLabelNoId">No</span>
            <span id="{p}trialInfoFirstSumbittedId">07/03/2022</span>
            <span id="{p}trialInfoLastUpdatedId">15/11/2023</span>
            <div id="trialStatusInfoDataTableId"><table>
                <thead>
                    <tr><th colspan="2">Trial status</th></tr>
                    <tr><th>Member state</th><th>Status</th></tr>
                </thead>
                <tbody>
                    <tr><td>France</td><td>Ongoing</td></tr>
                    <tr><td>Germany</td><td>Authorised</td></tr>
                </tbody>
            </table></div>
        </form></body></html>"#
    )
}

pub fn full_body() -> String {
    let p = FIELD_PREFIX;
    format!(
        r#"<html><body><form>
        <span id="{p}trialScopeId">Therapy</span>
        <div id="productsDetails">Products</div>
        <div>product list</div>
        <div class="documents"><table>
            <thead><tr><th>Document</th><th>File type</th><th>Document type</th></tr></thead>
            <tbody>
                <tr><td><a href="/docs/1"><span>Protocol v2</span></a></td><td>PDF</td><td>Protocol (for publication)</td></tr>
                <tr><td>Cover letter</td><td></td><td>Cover letter (for publication)</td></tr>
            </tbody>
        </table></div>
        <div id="countrySpecificDetailsInfoAccordionId">
            <h3>France - Ongoing</h3>
            <div>
                <p>Planned subjects <span id="{p}fr:subjectId">120</span></p>
                <p><span>All Documents</span></p>
                <table><tbody>
                    <tr><td><a href="/docs/fr-1"><span>Consent form</span></a></td><td>DOCX</td><td>Subject information and informed consent form (for publication)</td></tr>
                </tbody></table>
            </div>
            <h3>Germany</h3>
            <div>
                <p>Planned subjects <span id="{p}de:subjectId">30</span></p>
                <p><span>All Documents</span></p>
                <table><tbody>
                    <tr><td colspan="3" class="ui-datatable-empty-message">No records found.</td></tr>
                </tbody></table>
            </div>
        </div>
        </form></body></html>"#
    )
}

/// Serves the three record views; anything else is a 404.
pub fn portal_handler(request: &PortalRequest) -> Result<PortalResponse, PortalError> {
    let url = &request.url;
    let body = if url.contains("summary.xhtml") {
        summary_body()
    } else if url.contains("fullInformation.xhtml") {
        full_body()
    } else if url.contains("trialResults.xhtml") {
        "<html><body><p>No results</p></body></html>".to_owned()
    } else {
        return Err(PortalError::Status {
            status: 404,
            url: url.clone(),
        });
    };
    Ok(PortalResponse::ok(url, body))
}
