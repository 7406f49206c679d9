//! Single-value field extraction and portal value normalizers.
//!
//! Headline values on the portal's trial pages are rendered into elements
//! with stable identifiers. [`field_text`] reads one of them; the
//! normalizers turn the portal's encodings (`Yes`/`No` flags, `dd/mm/yyyy`
//! dates, bare counts) into typed values.

use chrono::NaiveDate;
use scraper::ElementRef;

use crate::{ExtractError, element_text, find_by_id};

/// Date format used throughout the portal, independent of the host locale.
pub const PORTAL_DATE_FORMAT: &str = "%d/%m/%Y";

/// Returns the trimmed text of the element with identifier `id`.
///
/// # Errors
///
/// Returns [`ExtractError::FieldNotFound`] if no element has that identifier.
pub fn field_text(root: ElementRef<'_>, id: &str) -> Result<String, ExtractError> {
    find_by_id(root, id)?
        .map(element_text)
        .ok_or_else(|| ExtractError::FieldNotFound {
            field: id.to_owned(),
        })
}

/// Reads a `Yes`/`No` field as a boolean.
///
/// # Errors
///
/// Returns [`ExtractError::FieldNotFound`] or
/// [`ExtractError::UnrecognizedBooleanText`].
pub fn flag_field(root: ElementRef<'_>, id: &str) -> Result<bool, ExtractError> {
    parse_yes_no(&field_text(root, id)?)
}

/// Reads a `dd/mm/yyyy` field as a calendar date.
///
/// # Errors
///
/// Returns [`ExtractError::FieldNotFound`] or [`ExtractError::UnparseableDate`].
pub fn date_field(root: ElementRef<'_>, id: &str) -> Result<NaiveDate, ExtractError> {
    parse_portal_date(&field_text(root, id)?)
}

/// Maps the portal's `"Yes"`/`"No"` to a boolean.
///
/// # Errors
///
/// Returns [`ExtractError::UnrecognizedBooleanText`] for any other value.
pub fn parse_yes_no(text: &str) -> Result<bool, ExtractError> {
    match text.trim() {
        "Yes" => Ok(true),
        "No" => Ok(false),
        _ => Err(ExtractError::UnrecognizedBooleanText {
            text: text.to_owned(),
        }),
    }
}

/// Parses a `dd/mm/yyyy` date.
///
/// # Errors
///
/// Returns [`ExtractError::UnparseableDate`] if the text is in any other
/// format or names an impossible date.
pub fn parse_portal_date(text: &str) -> Result<NaiveDate, ExtractError> {
    let trimmed = text.trim();
    let unparseable = || ExtractError::UnparseableDate {
        text: text.to_owned(),
    };

    // chrono accepts single-digit days and months; the portal never emits them.
    if trimmed.len() != 10 {
        return Err(unparseable());
    }

    NaiveDate::parse_from_str(trimmed, PORTAL_DATE_FORMAT).map_err(|_| unparseable())
}

/// Parses a non-negative count such as a planned number of subjects.
///
/// # Errors
///
/// Returns [`ExtractError::InvalidNumber`] if the text is not an integer.
pub fn parse_count(text: &str) -> Result<u64, ExtractError> {
    text.trim()
        .parse::<u64>()
        .map_err(|_| ExtractError::InvalidNumber {
            text: text.to_owned(),
        })
}
