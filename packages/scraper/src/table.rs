//! Plain data table extraction.
//!
//! Converts a well-formed `<table>` into one record per body row, keyed by
//! column header. Tables with grouped headers (several `<thead>` rows joined
//! by `colspan`/`rowspan`) are keyed by their innermost header row, which is
//! the one whose cells sit directly above the data.

use std::collections::BTreeMap;

use scraper::ElementRef;

use crate::documents::EMPTY_MESSAGE_CLASS;
use crate::{ExtractError, element_text, has_class, parse_selector};

/// One table row keyed by column header.
pub type Record = BTreeMap<String, String>;

/// Extracts the body rows of `table` as records.
///
/// Missing trailing cells become empty strings; surplus cells are ignored.
/// The portal's "no records" placeholder row is skipped.
///
/// # Errors
///
/// Returns [`ExtractError::UnexpectedPageFormat`] if the table has no header
/// cells.
pub fn table_records(table: ElementRef<'_>) -> Result<Vec<Record>, ExtractError> {
    let headers = column_headers(table)?;

    if headers.is_empty() {
        return Err(ExtractError::unexpected("no header cells found in table"));
    }

    // ── Extract body rows ───────────────────────────────────────────
    let row_sel = parse_selector("tbody > tr")?;
    let cell_sel = parse_selector("td")?;

    let mut records = Vec::new();

    for row in table.select(&row_sel) {
        let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();

        if has_class(row, EMPTY_MESSAGE_CLASS)
            || cells.iter().any(|cell| has_class(*cell, EMPTY_MESSAGE_CLASS))
        {
            continue;
        }

        let mut record = Record::new();
        for (i, header) in headers.iter().enumerate() {
            let value = cells.get(i).map(|c| element_text(*c)).unwrap_or_default();
            record.insert(header.clone(), value);
        }
        records.push(record);
    }

    log::debug!(
        "Extracted {} records across {} columns",
        records.len(),
        headers.len()
    );

    Ok(records)
}

/// Returns all values of one column, in row order.
///
/// # Errors
///
/// Returns [`ExtractError::FieldNotFound`] if no column has that header, or
/// any error of [`table_records`].
pub fn column(table: ElementRef<'_>, header: &str) -> Result<Vec<String>, ExtractError> {
    let headers = column_headers(table)?;
    if !headers.iter().any(|h| h == header) {
        return Err(ExtractError::FieldNotFound {
            field: header.to_owned(),
        });
    }

    Ok(table_records(table)?
        .into_iter()
        .filter_map(|mut record| record.remove(header))
        .collect())
}

/// Resolves the innermost header row of `table`, expanding `colspan` and
/// `rowspan` so each data column gets a label.
fn column_headers(table: ElementRef<'_>) -> Result<Vec<String>, ExtractError> {
    let header_row_sel = parse_selector("thead > tr")?;
    let header_cell_sel = parse_selector("th, td")?;

    let rows: Vec<Vec<(String, usize, usize)>> = table
        .select(&header_row_sel)
        .map(|row| {
            row.select(&header_cell_sel)
                .map(|cell| {
                    (
                        element_text(cell),
                        span_attr(cell, "colspan", MAX_COLSPAN),
                        span_attr(cell, "rowspan", MAX_ROWSPAN),
                    )
                })
                .collect()
        })
        .collect();

    let mut grid: Vec<Vec<Option<String>>> = vec![Vec::new(); rows.len()];

    for (r, cells) in rows.iter().enumerate() {
        let mut col = 0;
        for (text, colspan, rowspan) in cells {
            while grid[r].get(col).is_some_and(Option::is_some) {
                col += 1;
            }
            for grid_row in grid.iter_mut().skip(r).take(*rowspan) {
                for c in col..col + colspan {
                    if grid_row.len() <= c {
                        grid_row.resize(c + 1, None);
                    }
                    grid_row[c] = Some(text.clone());
                }
            }
            col += colspan;
        }
    }

    Ok(grid
        .pop()
        .unwrap_or_default()
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect())
}

/// Upper bounds applied by HTML user agents to `colspan` and `rowspan`.
const MAX_COLSPAN: usize = 1000;
const MAX_ROWSPAN: usize = 65534;

/// Reads a span attribute, defaulting to 1 and clamping to `max`.
fn span_attr(cell: ElementRef<'_>, name: &str, max: usize) -> usize {
    cell.value()
        .attr(name)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|&n| n > 0)
        .map_or(1, |n| usize::try_from(n).map_or(max, |n| n.min(max)))
}
