//! Finds the real column header below banner and metadata rows.

/// Rows examined when no explicit window is configured.
pub const DEFAULT_SCAN_ROWS: usize = 10;

/// Lowercased, comma-joined text of a row, as matched by signatures and rules.
pub fn header_line(row: &[String]) -> String {
    row.join(",").to_lowercase()
}

/// Index of the first row within `scan_rows` that contains every substring of
/// at least one signature combination. Scanning stops at the first hit.
pub fn locate_header(
    rows: &[Vec<String>],
    signatures: &[Vec<String>],
    scan_rows: usize,
) -> Option<usize> {
    rows.iter().take(scan_rows).position(|row| {
        let line = header_line(row);
        signatures.iter().any(|combo| {
            !combo.is_empty() && combo.iter().all(|token| line.contains(token.as_str()))
        })
    })
}
