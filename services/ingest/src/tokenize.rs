//! Splits raw report content into rows of trimmed fields.

use crate::error::{ImportError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate};
use std::path::Path;

/// Decode file bytes. DMS exports that are not UTF-8 are almost always
/// Windows-1252.
pub fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, had_errors) = encoding_rs::WINDOWS_1252.decode(bytes);
            if had_errors {
                log::warn!(
                    "input is neither UTF-8 nor clean Windows-1252; some characters were replaced"
                );
            }
            text.into_owned()
        }
    }
}

/// Tokenize comma-separated text.
///
/// Quoted fields keep embedded commas and line breaks, `""` inside quotes is a
/// literal quote, and blank or whitespace-only lines are dropped. Spaces
/// between a comma and an opening quote are ignored. A stray opening quote
/// only covers the line it is on. Row lengths may differ; pairing with the
/// header happens in `RawRow::new`.
pub fn tokenize(text: &str) -> Result<Vec<Vec<String>>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(false).flexible(true).trim(csv::Trim::All);

    let mut rows = Vec::new();
    let mut record = csv::StringRecord::new();
    for line in logical_rows(text) {
        if line.trim().is_empty() {
            continue;
        }
        let mut reader = builder.from_reader(line.as_bytes());
        if reader.read_record(&mut record)? {
            rows.push(record.iter().map(str::to_string).collect());
        }
    }

    Ok(rows)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteSeen,
}

/// Group physical lines into rows. Leading blanks before a field are dropped
/// so a quote after `, ` still opens a quoted field.
///
/// A quoted field may continue onto following lines only if it closes and is
/// followed by a delimiter or the line end. Otherwise the opening quote is
/// taken as stray and the row ends at its own line.
fn logical_rows(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    let mut rows = Vec::new();
    let mut start = 0;
    while start < lines.len() {
        let mut row = String::new();
        let mut end = start;
        let (mut state, mut well_formed) = scan_line(lines[start], Scan::FieldStart, &mut row);
        while state == Scan::Quoted && end + 1 < lines.len() {
            end += 1;
            row.push('\n');
            let (next, clean) = scan_line(lines[end], state, &mut row);
            state = next;
            well_formed &= clean;
        }

        if end > start && (state == Scan::Quoted || !well_formed) {
            log::warn!("unbalanced quote on line {}; reading it as one line", start + 1);
            let mut single = String::new();
            scan_line(lines[start], Scan::FieldStart, &mut single);
            rows.push(single);
            start += 1;
        } else {
            rows.push(row);
            start = end + 1;
        }
    }
    rows
}

/// Copy `line` into `out` without leading field blanks. Returns the state at
/// the line end and whether every closing quote was followed by a delimiter.
fn scan_line(line: &str, mut state: Scan, out: &mut String) -> (Scan, bool) {
    let mut well_formed = true;
    for c in line.chars() {
        state = match (state, c) {
            (Scan::FieldStart, ' ' | '\t') => continue,
            (Scan::FieldStart, '"') => Scan::Quoted,
            (Scan::FieldStart | Scan::Unquoted | Scan::QuoteSeen, ',') => Scan::FieldStart,
            (Scan::FieldStart | Scan::Unquoted, _) => Scan::Unquoted,
            (Scan::Quoted, '"') => Scan::QuoteSeen,
            (Scan::Quoted, _) => Scan::Quoted,
            (Scan::QuoteSeen, '"') => Scan::Quoted,
            (Scan::QuoteSeen, ' ' | '\t') => Scan::QuoteSeen,
            (Scan::QuoteSeen, _) => {
                well_formed = false;
                Scan::Unquoted
            }
        };
        out.push(c);
    }
    let state = match state {
        Scan::Quoted => Scan::Quoted,
        _ => Scan::FieldStart,
    };
    (state, well_formed)
}

/// Read the first sheet of a workbook (xls, xlsx, xlsb, ods) into the same
/// row shape `tokenize` produces.
pub fn read_workbook(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ImportError::Workbook(format!("{}: {}", path.display(), e)))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let sheet_name = sheet_names
        .first()
        .ok_or_else(|| ImportError::Workbook(format!("{} has no sheets", path.display())))?;

    log::info!(
        "reading sheet '{}' (first of {} sheets)",
        sheet_name,
        sheet_names.len()
    );

    let range = workbook
        .worksheet_range(sheet_name)
        .map_err(|e| ImportError::Workbook(e.to_string()))?;

    let rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>())
        .filter(|row| row.iter().any(|field| !field.is_empty()))
        .collect();

    Ok(rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        other => other.to_string().trim().to_string(),
    }
}

/// Excel day serials count from 1899-12-30 (the 1900 leap-year bug included).
fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}
