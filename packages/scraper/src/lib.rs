#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HTML extraction for pages rendered by the CTIS public portal.
//!
//! Provides the structural parsers that turn a parsed page into typed data:
//! accordion sections ([`accordion`]), attached-document tables
//! ([`documents`]), single labelled fields and their value normalizers
//! ([`fields`]), and plain data tables ([`table`]).
//!
//! This crate performs no networking. Every function operates on a
//! [`scraper::ElementRef`] the caller obtained from an already fetched page,
//! so the same code runs against live responses and test fixtures.

pub mod accordion;
pub mod documents;
pub mod fields;
pub mod table;

use scraper::{ElementRef, Selector};

/// Errors raised while extracting data from a portal page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// A structural marker the parser depends on is missing or duplicated.
    /// Usually means the portal changed its layout.
    #[error("Unexpected page format: {message}")]
    UnexpectedPageFormat {
        /// What was expected and not found.
        message: String,
    },

    /// A requested accordion section is not present on the page.
    #[error("Section not found: '{section}'")]
    SectionNotFound {
        /// The requested section label.
        section: String,
    },

    /// A requested field is not present on the page.
    #[error("Field not found: '{field}'")]
    FieldNotFound {
        /// The element identifier that was looked up.
        field: String,
    },

    /// A documents table row does not follow the three-cell layout.
    #[error("Malformed document row {row}: {message}")]
    MalformedDocumentRow {
        /// Zero-based index of the offending row in the table body.
        row: usize,
        /// What was wrong with the row.
        message: String,
    },

    /// A yes/no flag holds some other text.
    #[error("Unrecognized boolean text: '{text}'")]
    UnrecognizedBooleanText {
        /// The offending value.
        text: String,
    },

    /// A date is not in the portal's `dd/mm/yyyy` format.
    #[error("Unparseable date: '{text}'")]
    UnparseableDate {
        /// The offending value.
        text: String,
    },

    /// A count field is not a non-negative integer.
    #[error("Invalid number: '{text}'")]
    InvalidNumber {
        /// The offending value.
        text: String,
    },
}

impl ExtractError {
    /// Builds an [`ExtractError::UnexpectedPageFormat`].
    #[must_use]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedPageFormat {
            message: message.into(),
        }
    }
}

/// Parses a CSS selector string, returning an [`ExtractError`] on failure.
///
/// # Errors
///
/// Returns [`ExtractError::UnexpectedPageFormat`] if the selector is invalid.
pub fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector)
        .map_err(|e| ExtractError::unexpected(format!("invalid CSS selector '{selector}': {e}")))
}

/// Builds a selector matching an element by its exact `id` attribute.
///
/// Portal identifiers contain `:` and other characters that are not valid in
/// an `#id` selector, so an attribute selector is used instead.
///
/// # Errors
///
/// Returns [`ExtractError::UnexpectedPageFormat`] if the resulting selector
/// cannot be parsed.
pub fn id_selector(id: &str) -> Result<Selector, ExtractError> {
    let escaped = id.replace('\\', "\\\\").replace('"', "\\\"");
    parse_selector(&format!("[id=\"{escaped}\"]"))
}

/// Returns the first element below `root` whose `id` is exactly `id`.
///
/// # Errors
///
/// Returns [`ExtractError::UnexpectedPageFormat`] if the selector cannot be
/// built.
pub fn find_by_id<'a>(root: ElementRef<'a>, id: &str) -> Result<Option<ElementRef<'a>>, ExtractError> {
    let selector = id_selector(id)?;
    Ok(root.select(&selector).next())
}

/// Concatenates all text below `element` and trims surrounding whitespace.
#[must_use]
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}

/// Returns `element` itself if it is a `<table>`, otherwise the first table
/// below it.
///
/// # Errors
///
/// Returns [`ExtractError::UnexpectedPageFormat`] if the selector cannot be
/// built.
pub fn first_table(element: ElementRef<'_>) -> Result<Option<ElementRef<'_>>, ExtractError> {
    if element.value().name() == "table" {
        return Ok(Some(element));
    }
    let selector = parse_selector("table")?;
    Ok(element.select(&selector).next())
}

/// Returns `true` if the element carries the given class.
#[must_use]
pub fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

#[cfg(test)]
mod tests {
    use scraper::Html;

    use super::*;

    #[test]
    fn finds_element_by_portal_style_id() {
        let html = Html::parse_fragment(
            r#"<div><span id="_emactview_WAR_emactpublicportlet_:mainFormID:trialScopeId"> Therapy </span></div>"#,
        );
        let element = find_by_id(
            html.root_element(),
            "_emactview_WAR_emactpublicportlet_:mainFormID:trialScopeId",
        )
        .unwrap()
        .unwrap();
        assert_eq!(element_text(element), "Therapy");
    }

    #[test]
    fn missing_id_is_none() {
        let html = Html::parse_fragment("<div><span id=\"a\">x</span></div>");
        assert!(find_by_id(html.root_element(), "b").unwrap().is_none());
    }

    #[test]
    fn element_text_joins_nested_text() {
        let html = Html::parse_fragment("<p id=\"p\">  Phase <b>II</b> trial\n</p>");
        let p = find_by_id(html.root_element(), "p").unwrap().unwrap();
        assert_eq!(element_text(p), "Phase II trial");
    }
}
