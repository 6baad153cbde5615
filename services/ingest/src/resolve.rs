//! Two-tier column lookup tolerant of header drift between DMS versions.

use crate::model::{RawRow, ReportType};
use crate::schema::Schema;

/// Lowercase and drop whitespace and `_().-`, so "Customer  Name",
/// "customer_name" and "CUSTOMER-NAME" compare equal.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '_' | '(' | ')' | '.' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// First non-empty value for `candidates`: exact header names in candidate
/// order first, then normalized comparison in header order. Empty if neither
/// tier finds a value.
pub fn resolve<'r, S: AsRef<str>>(row: &'r RawRow, candidates: &[S]) -> &'r str {
    for candidate in candidates {
        if let Some(value) = row.get(candidate.as_ref()) {
            if !value.is_empty() {
                return value;
            }
        }
    }

    let wanted: Vec<String> = candidates
        .iter()
        .map(|c| normalize_key(c.as_ref()))
        .filter(|c| !c.is_empty())
        .collect();

    row.iter()
        .find(|(key, value)| !value.is_empty() && wanted.contains(&normalize_key(key)))
        .map(|(_, value)| value)
        .unwrap_or("")
}

/// Resolves canonical fields of one report type through the alias table.
#[derive(Debug, Clone, Copy)]
pub struct FieldResolver<'s> {
    schema: &'s Schema,
    report: ReportType,
}

impl<'s> FieldResolver<'s> {
    pub fn new(schema: &'s Schema, report: ReportType) -> Self {
        Self { schema, report }
    }

    /// The canonical name is tried first, then its aliases.
    pub fn field<'r>(&self, row: &'r RawRow, field: &str) -> &'r str {
        let aliases = self.schema.candidates(self.report, field);
        let mut candidates: Vec<&str> = Vec::with_capacity(aliases.len() + 1);
        candidates.push(field);
        candidates.extend(aliases.iter().map(String::as_str));
        resolve(row, candidates.as_slice())
    }
}
