//! Attached-documents table parser.
//!
//! Each row of a documents table has three cells: the document (a download
//! link wrapping a title span, or plain text when no download is offered),
//! the file type, and the document type.
//!
//! A missing table and a table whose body holds only the "no records"
//! placeholder both mean the trial has no documents and yield an empty list.
//! Any other deviation from the three-cell layout is reported as
//! [`ExtractError::MalformedDocumentRow`] so that portal changes surface
//! instead of silently producing zero documents.

use ctis_models::{DocumentDescriptor, DocumentType, FileType};
use scraper::ElementRef;

use crate::{ExtractError, element_text, find_by_id, first_table, has_class, parse_selector};

/// Number of cells in every documents table row.
pub const DOCUMENT_ROW_CELLS: usize = 3;

/// Class of the placeholder cell the portal renders in an empty table.
pub const EMPTY_MESSAGE_CLASS: &str = "ui-datatable-empty-message";

/// Number of element siblings between the Part I products anchor and the
/// block containing the Part I documents table.
pub const ANCHOR_DOCUMENTS_SIBLING_OFFSET: usize = 2;

/// Parses a documents table into descriptors, in row order.
///
/// `None` (no table on the page) yields an empty list.
///
/// # Errors
///
/// Returns [`ExtractError::MalformedDocumentRow`] if a row does not have
/// exactly [`DOCUMENT_ROW_CELLS`] cells, or if a linked document lacks its
/// `href` or title span.
pub fn parse_documents_table(
    table: Option<ElementRef<'_>>,
) -> Result<Vec<DocumentDescriptor>, ExtractError> {
    let Some(table) = table else {
        return Ok(Vec::new());
    };

    let Some(body) = child_elements(table).find(|el| el.value().name() == "tbody") else {
        return Ok(Vec::new());
    };

    let mut documents = Vec::new();

    for (index, row) in child_elements(body)
        .filter(|el| el.value().name() == "tr")
        .enumerate()
    {
        let cells: Vec<ElementRef<'_>> = child_elements(row).collect();

        if is_empty_placeholder(row, &cells) {
            log::debug!("Skipping empty-table placeholder row {index}");
            continue;
        }

        if cells.len() != DOCUMENT_ROW_CELLS {
            return Err(ExtractError::MalformedDocumentRow {
                row: index,
                message: format!(
                    "expected {DOCUMENT_ROW_CELLS} cells, found {}",
                    cells.len()
                ),
            });
        }

        let (url, title) = parse_title_cell(index, cells[0])?;

        documents.push(DocumentDescriptor {
            url,
            title,
            file_type: FileType::from(element_text(cells[1])),
            document_type: DocumentType::from(element_text(cells[2])),
        });
    }

    Ok(documents)
}

/// Parses the documents table that follows the element with identifier
/// `anchor_id`.
///
/// The table lives inside the element sibling
/// [`ANCHOR_DOCUMENTS_SIBLING_OFFSET`] positions after the anchor.
///
/// # Errors
///
/// Returns [`ExtractError::UnexpectedPageFormat`] if the anchor or its
/// sibling is missing, or any error of [`parse_documents_table`].
pub fn documents_after_anchor(
    root: ElementRef<'_>,
    anchor_id: &str,
) -> Result<Vec<DocumentDescriptor>, ExtractError> {
    let anchor = find_by_id(root, anchor_id)?.ok_or_else(|| {
        ExtractError::unexpected(format!("documents anchor '{anchor_id}' not found"))
    })?;

    let block = anchor
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .nth(ANCHOR_DOCUMENTS_SIBLING_OFFSET - 1)
        .ok_or_else(|| {
            ExtractError::unexpected(format!(
                "no documents block after anchor '{anchor_id}'"
            ))
        })?;

    parse_documents_table(first_table(block)?)
}

/// Parses the first documents table appearing after the text `label`
/// inside `section`.
///
/// # Errors
///
/// Returns [`ExtractError::SectionNotFound`] if `label` does not occur in
/// the section, or any error of [`parse_documents_table`].
pub fn documents_after_label(
    section: ElementRef<'_>,
    label: &str,
) -> Result<Vec<DocumentDescriptor>, ExtractError> {
    let mut seen_label = false;
    let mut table = None;

    for node in section.descendants() {
        if seen_label {
            if let Some(element) = ElementRef::wrap(node)
                && element.value().name() == "table"
            {
                table = Some(element);
                break;
            }
        } else if node.value().as_text().is_some_and(|t| t.trim() == label) {
            seen_label = true;
        }
    }

    if !seen_label {
        return Err(ExtractError::SectionNotFound {
            section: label.to_owned(),
        });
    }

    parse_documents_table(table)
}

fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

fn is_empty_placeholder(row: ElementRef<'_>, cells: &[ElementRef<'_>]) -> bool {
    has_class(row, EMPTY_MESSAGE_CLASS)
        || (cells.len() == 1 && has_class(cells[0], EMPTY_MESSAGE_CLASS))
}

fn parse_title_cell(
    index: usize,
    cell: ElementRef<'_>,
) -> Result<(Option<String>, String), ExtractError> {
    let link_selector = parse_selector("a")?;
    let Some(link) = cell.select(&link_selector).next() else {
        return Ok((None, element_text(cell)));
    };

    let href = link
        .value()
        .attr("href")
        .ok_or_else(|| ExtractError::MalformedDocumentRow {
            row: index,
            message: "document link has no href".to_owned(),
        })?;

    let span_selector = parse_selector("span")?;
    let title = link
        .select(&span_selector)
        .next()
        .map(element_text)
        .ok_or_else(|| ExtractError::MalformedDocumentRow {
            row: index,
            message: "document link has no title span".to_owned(),
        })?;

    Ok((Some(href.to_owned()), title))
}
