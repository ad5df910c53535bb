//! Workbook and survey I/O.
//!
//! Peripheral glue around the core: [`workbook`] reads the persisted
//! scheduling workbook (roster, rotation key, track base sequences,
//! authoritative pathway recs, staffing envelope), [`survey`] maps the
//! preference-survey responses onto resident records, and [`writer`]
//! persists the finished grid. The core never touches files directly;
//! everything crosses these contracts as domain types.

pub mod survey;
pub mod workbook;
pub mod writer;

/// Normalizes a workbook cell for comparisons: trimmed, lowercased,
/// whitespace collapsed out.
pub(crate) fn normalize(cell: &str) -> String {
    cell.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Whether a cell is an "x"-style marker.
pub(crate) fn is_marked(cell: &str) -> bool {
    matches!(normalize(cell).as_str(), "x" | "yes" | "true" | "1")
}
