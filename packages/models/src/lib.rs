#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Data model for records scraped from the CTIS public portal.
//!
//! A trial is addressed by its [`TrialNumber`] and rendered by the portal as
//! three independent [`ViewKind`] pages. Documents attached to a trial are
//! described by [`DocumentDescriptor`], whose [`FileType`] and
//! [`DocumentType`] vocabularies are open: values the portal introduces later
//! are kept verbatim in an `Other` variant instead of being rejected.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Pattern of a trial number inside arbitrary text (`NNNN-NNNNNN-NN-NN`).
///
/// Only the digit groups are matched; [`TrialNumber::find_all`] rejects
/// matches that run into further digits.
pub const TRIAL_NUMBER_PATTERN: &str = r"[0-9]{4}-[0-9]{6}-[0-9]{2}-[0-9]{2}";

static TRIAL_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TRIAL_NUMBER_PATTERN).unwrap_or_else(|_| unreachable!()));

static TRIAL_NUMBER_EXACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{6}-[0-9]{2}-[0-9]{2}$").unwrap_or_else(|_| unreachable!())
});

/// Error returned when a string is not a well-formed trial number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid trial number '{value}': expected NNNN-NNNNNN-NN-NN")]
pub struct InvalidTrialNumber {
    /// The rejected input.
    pub value: String,
}

/// A CTIS trial number such as `2022-500137-89-00`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrialNumber(String);

impl TrialNumber {
    /// Returns the trial number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Finds every trial number occurring anywhere in `text`, in order of
    /// appearance. Duplicates are not removed.
    ///
    /// Letters, underscores and punctuation may touch a trial number
    /// (`row_2022-500137-89-00`); a neighbouring digit may not.
    pub fn find_all(text: &str) -> impl Iterator<Item = Self> + '_ {
        let bytes = text.as_bytes();

        TRIAL_NUMBER_RE
            .find_iter(text)
            .filter(move |m| {
                let before = m.start().checked_sub(1).map(|i| bytes[i]);
                let after = bytes.get(m.end()).copied();
                !before.is_some_and(|b| b.is_ascii_digit())
                    && !after.is_some_and(|b| b.is_ascii_digit())
            })
            .map(|m| Self(m.as_str().to_owned()))
    }
}

impl FromStr for TrialNumber {
    type Err = InvalidTrialNumber;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if TRIAL_NUMBER_EXACT_RE.is_match(trimmed) {
            Ok(Self(trimmed.to_owned()))
        } else {
            Err(InvalidTrialNumber {
                value: s.to_owned(),
            })
        }
    }
}

impl TryFrom<String> for TrialNumber {
    type Error = InvalidTrialNumber;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TrialNumber> for String {
    fn from(value: TrialNumber) -> Self {
        value.0
    }
}

impl AsRef<str> for TrialNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the three independently rendered detail pages of a trial.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewKind {
    /// Full trial information (Part I and Part II).
    Full,
    /// Trial results.
    Results,
    /// Summary tab with the headline fields and the status table.
    Summary,
}

impl ViewKind {
    /// All view kinds, in tab order.
    pub const ALL: [Self; 3] = [Self::Full, Self::Results, Self::Summary];

    /// The facelet the portal renders for this view.
    #[must_use]
    pub const fn facelet(self) -> &'static str {
        match self {
            Self::Full => "fullInformation.xhtml",
            Self::Results => "trialResults.xhtml",
            Self::Summary => "summary.xhtml",
        }
    }
}

/// File format of an attached document, as labelled by the portal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString, AsRefStr, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[strum(ascii_case_insensitive)]
pub enum FileType {
    /// `PDF`
    #[strum(serialize = "PDF")]
    Pdf,
    /// `DOCX`
    #[strum(serialize = "DOCX")]
    Docx,
    /// `DOC`
    #[strum(serialize = "DOC")]
    Doc,
    /// The portal left the file type cell empty.
    #[strum(serialize = "")]
    Unspecified,
    /// A label not known to this crate, kept verbatim.
    #[strum(default)]
    Other(String),
}

impl FileType {
    /// Maps a portal label to a file type, ignoring surrounding whitespace.
    /// Unknown labels become [`FileType::Other`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        label
            .parse()
            .unwrap_or_else(|_| Self::Other(label.to_owned()))
    }

    /// Returns the portal label for this file type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Other(label) => label,
            known => known.as_ref(),
        }
    }
}

impl From<String> for FileType {
    fn from(value: String) -> Self {
        Self::from_label(&value)
    }
}

impl From<FileType> for String {
    fn from(value: FileType) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of an attached document, as labelled by the portal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString, AsRefStr, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DocumentType {
    #[strum(serialize = "Agreement from another sponsor (for publication)")]
    AgreementFromAnotherSponsor,
    #[strum(serialize = "Authorisation of manufacturing and import (for publication)")]
    AuthorisationOfManufacturingAndImport,
    #[strum(serialize = "Auxiliary Medicinal Product Dossier (for publication)")]
    AuxiliaryMedicinalProductDossier,
    #[strum(serialize = "Compliance with Regulation (EU) 2016/679 (for publication)")]
    ComplianceWithDataProtectionRegulation,
    #[strum(
        serialize = "Compliance with national requirements on Data Protection (for publication)"
    )]
    ComplianceWithNationalDataProtection,
    #[strum(serialize = "Compliance with use of Biological samples (for publication)")]
    ComplianceWithBiologicalSamples,
    #[strum(serialize = "Content labelling of the IMPs (for publication)")]
    ContentLabellingOfImps,
    #[strum(serialize = "Cover letter (for publication)")]
    CoverLetter,
    #[strum(serialize = "Data Safety Monitoring Board Charter (for publication)")]
    DataSafetyMonitoringBoardCharter,
    #[strum(
        serialize = "Investigational Medicinal Product Dossier: Safety and Efficacy (for publication)"
    )]
    ImpdSafetyAndEfficacy,
    #[strum(serialize = "Investigator Brochure (for publication)")]
    InvestigatorBrochure,
    #[strum(serialize = "Investigator CV (for publication)")]
    InvestigatorCv,
    #[strum(serialize = "Low Intervention Justification (for publication)")]
    LowInterventionJustification,
    #[strum(serialize = "Modification Description (for publication)")]
    ModificationDescription,
    #[strum(serialize = "PIP opinion (for publication)")]
    PipOpinion,
    #[strum(serialize = "Proof of insurance (for publication)")]
    ProofOfInsurance,
    #[strum(serialize = "Proof of payment (for publication)")]
    ProofOfPayment,
    #[strum(serialize = "Protocol (for publication)")]
    Protocol,
    #[strum(serialize = "QP GMP certification (for publication)")]
    QpGmpCertification,
    #[strum(serialize = "Recruitment arrangements (for publication)")]
    RecruitmentArrangements,
    #[strum(serialize = "Simplified IMPD: Safety and Efficacy (for publication)")]
    SimplifiedImpdSafetyAndEfficacy,
    #[strum(serialize = "Study design (for publication)")]
    StudyDesign,
    #[strum(serialize = "Subject information and informed consent form (for publication)")]
    SubjectInformationAndInformedConsent,
    #[strum(serialize = "Suitability of the clinical trial sites facilities (for publication)")]
    SuitabilityOfSiteFacilities,
    #[strum(serialize = "Suitability of the investigator (for publication)")]
    SuitabilityOfInvestigator,
    #[strum(serialize = "Summary of Product Characteristics (SmPC) (for publication)")]
    SummaryOfProductCharacteristics,
    #[strum(serialize = "Summary of scientific advice (for publication)")]
    SummaryOfScientificAdvice,
    #[strum(serialize = "Synopsis of the protocol (for publication)")]
    ProtocolSynopsis,
    /// A label not known to this crate, kept verbatim.
    #[strum(default)]
    Other(String),
}

impl DocumentType {
    /// Maps a portal label to a document type, ignoring surrounding whitespace.
    /// Unknown labels become [`DocumentType::Other`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        label
            .parse()
            .unwrap_or_else(|_| Self::Other(label.to_owned()))
    }

    /// Returns the portal label for this document type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Other(label) => label,
            known => known.as_ref(),
        }
    }
}

impl From<String> for DocumentType {
    fn from(value: String) -> Self {
        Self::from_label(&value)
    }
}

impl From<DocumentType> for String {
    fn from(value: DocumentType) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a trial's documents table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDescriptor {
    /// Download link. `None` when the portal lists the document without one
    /// (e.g. pending publication).
    pub url: Option<String>,
    /// Display title of the document.
    pub title: String,
    /// File format label.
    pub file_type: FileType,
    /// Document category label.
    pub document_type: DocumentType,
}

impl DocumentDescriptor {
    /// Returns `true` if this is a full protocol that can be downloaded.
    #[must_use]
    pub fn is_published_protocol(&self) -> bool {
        self.document_type == DocumentType::Protocol && self.url.is_some()
    }
}
