//! Canonical data model shared by every pipeline stage.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ageing beyond this many days marks a vehicle as aged stock.
pub const AGED_STOCK_DAYS: i64 = 90;

/// Which DMS export a file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Leads,
    Opportunities,
    Sales,
    Inventory,
    Unknown,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Leads => "leads",
            ReportType::Opportunities => "opportunities",
            ReportType::Sales => "sales",
            ReportType::Inventory => "inventory",
            ReportType::Unknown => "unknown",
        }
    }

    /// Destination table. `Unknown` never reaches the store.
    pub fn table(&self) -> Option<&'static str> {
        match self {
            ReportType::Unknown => None,
            other => Some(other.as_str()),
        }
    }

    /// Column declared as the upsert conflict target.
    pub fn conflict_key(&self) -> Option<&'static str> {
        match self {
            ReportType::Leads => Some("lead_id"),
            ReportType::Opportunities => Some("opportunity_id"),
            ReportType::Sales => Some("order_number"),
            ReportType::Inventory => Some("vin"),
            ReportType::Unknown => None,
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One data line keyed by the raw header names, in header order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    cells: Vec<(String, String)>,
}

impl RawRow {
    /// Pair header names with fields. Missing trailing fields become empty
    /// strings; fields beyond the header are dropped.
    pub fn new(headers: &[String], fields: &[String]) -> Self {
        let cells = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), fields.get(i).cloned().unwrap_or_default()))
            .collect();
        Self { cells }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadRecord {
    pub lead_id: String,
    pub name: String,
    pub phone: String,
    pub city: String,
    pub state: String,
    pub status: String,
    pub source: String,
    pub created_date: Option<NaiveDate>,
    pub year_month: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunityRecord {
    pub opportunity_id: String,
    pub test_drive_completed: bool,
    pub qualification: String,
    pub created_date: Option<NaiveDate>,
    pub year_month: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleRecord {
    pub order_number: String,
    pub vin: String,
    pub booking_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub finance_bank: String,
    pub insurance_company: String,
    /// Bucketed on the delivery date, not the booking date.
    pub year_month: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryRecord {
    pub vin: String,
    pub model_line: String,
    pub ageing_days: i64,
    pub status: String,
}

impl InventoryRecord {
    pub fn is_aged(&self) -> bool {
        self.ageing_days > AGED_STOCK_DAYS
    }
}

/// A persistable record. The natural key is never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CanonicalRecord {
    Lead(LeadRecord),
    Opportunity(OpportunityRecord),
    Sale(SaleRecord),
    Inventory(InventoryRecord),
}

impl CanonicalRecord {
    pub fn report_type(&self) -> ReportType {
        match self {
            CanonicalRecord::Lead(_) => ReportType::Leads,
            CanonicalRecord::Opportunity(_) => ReportType::Opportunities,
            CanonicalRecord::Sale(_) => ReportType::Sales,
            CanonicalRecord::Inventory(_) => ReportType::Inventory,
        }
    }

    pub fn natural_key(&self) -> &str {
        match self {
            CanonicalRecord::Lead(r) => &r.lead_id,
            CanonicalRecord::Opportunity(r) => &r.opportunity_id,
            CanonicalRecord::Sale(r) => &r.order_number,
            CanonicalRecord::Inventory(r) => &r.vin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_raw_row_pads_missing_trailing_fields() {
        let row = RawRow::new(&headers(&["VIN", "Model", "Status"]), &["ABC".to_string()]);
        assert_eq!(row.len(), 3);
        assert_eq!(row.get("VIN"), Some("ABC"));
        assert_eq!(row.get("Status"), Some(""));
    }

    #[test]
    fn test_raw_row_drops_extra_fields() {
        let fields: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let row = RawRow::new(&headers(&["One", "Two"]), &fields);
        assert_eq!(row.len(), 2);
        assert_eq!(row.iter().last(), Some(("Two", "b")));
    }

    #[test]
    fn test_raw_row_preserves_header_case() {
        let row = RawRow::new(&headers(&["Lead ID"]), &["L-1".to_string()]);
        assert_eq!(row.get("Lead ID"), Some("L-1"));
        assert_eq!(row.get("lead id"), None);
    }

    #[test]
    fn test_conflict_keys() {
        assert_eq!(ReportType::Leads.conflict_key(), Some("lead_id"));
        assert_eq!(ReportType::Sales.table(), Some("sales"));
        assert_eq!(ReportType::Unknown.table(), None);
    }

    #[test]
    fn test_aged_threshold_is_strict() {
        let mut record = InventoryRecord {
            vin: "V".into(),
            model_line: String::new(),
            ageing_days: 90,
            status: String::new(),
        };
        assert!(!record.is_aged());
        record.ageing_days = 91;
        assert!(record.is_aged());
    }
}
