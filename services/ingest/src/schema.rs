//! Versioned detection rules and column aliases.
//!
//! Everything the pipeline knows about vendor header naming lives here, as
//! data. `Schema::builtin()` is the compiled-in table; a JSON file with the
//! same shape can replace it at runtime (`--schema`).

use crate::error::SchemaError;
use crate::model::ReportType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const BUILTIN_SCHEMA_VERSION: &str = "dms-2024.2";

/// Canonical field name -> accepted raw header names, preferred first.
pub type FieldAliases = BTreeMap<String, Vec<String>>;

/// One classifier rule. Every group must match; a group matches when the
/// header line contains any of its substrings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub report: ReportType,
    pub all_of: Vec<Vec<String>>,
}

impl Rule {
    pub fn matches(&self, header_line: &str) -> bool {
        !self.all_of.is_empty()
            && self
                .all_of
                .iter()
                .all(|group| group.iter().any(|token| header_line.contains(token.as_str())))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Aliases {
    #[serde(default)]
    pub leads: FieldAliases,
    #[serde(default)]
    pub opportunities: FieldAliases,
    #[serde(default)]
    pub sales: FieldAliases,
    #[serde(default)]
    pub inventory: FieldAliases,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub version: String,
    /// Substring combinations that mark a header row. All substrings of one
    /// combination must be present.
    pub signatures: Vec<Vec<String>>,
    /// Ordered; first match wins.
    pub rules: Vec<Rule>,
    pub aliases: Aliases,
}

impl Schema {
    pub fn builtin() -> Self {
        Self {
            version: BUILTIN_SCHEMA_VERSION.to_string(),
            signatures: strings2(&[
                &["lead id"],
                &["opportunity", "customer"],
                &["opportunity id"],
                &["test drive", "customer"],
                &["order number"],
                &["vin", "delivery date"],
                &["booking to delivery"],
                &["ageing", "vin"],
                &["vehicle identification number"],
            ]),
            rules: vec![
                rule(
                    ReportType::Leads,
                    &[&["lead id"], &["qualification", "score", "source"]],
                ),
                rule(
                    ReportType::Opportunities,
                    &[&["opportunity", "test drive"], &["customer"]],
                ),
                rule(
                    ReportType::Opportunities,
                    &[&["opportunity id", "opportunity offline score"]],
                ),
                rule(ReportType::Sales, &[&["order number"]]),
                rule(ReportType::Sales, &[&["vin"], &["delivery date"]]),
                rule(ReportType::Sales, &[&["booking to delivery"]]),
                rule(ReportType::Inventory, &[&["ageing"], &["vin"]]),
                rule(ReportType::Inventory, &[&["vehicle identification number"]]),
            ],
            aliases: Aliases {
                leads: field_aliases(&[
                    ("lead_id", &["Lead ID", "Lead Id", "Enquiry ID", "Enquiry No"]),
                    ("name", &["Customer Name", "Name", "Lead Name", "First Name"]),
                    ("phone", &["Mobile", "Mobile Number", "Phone", "Contact Number"]),
                    ("city", &["City", "Customer City"]),
                    ("state", &["State", "Customer State"]),
                    ("status", &["Status", "Lead Status", "Lead Stage"]),
                    ("source", &["Source", "Lead Source", "Source Of Enquiry"]),
                    (
                        "created_date",
                        &[
                            "Created Date",
                            "Lead Created Date",
                            "Created On",
                            "Enquiry Date",
                            "Date",
                        ],
                    ),
                ]),
                opportunities: field_aliases(&[
                    ("opportunity_id", &["Opportunity ID", "Opportunity Id", "Opty ID", "ID"]),
                    (
                        "test_drive",
                        &["Test Drive Completed", "Test Drive", "Test Drive Status", "TD Done"],
                    ),
                    (
                        "qualification",
                        &[
                            "Qualification",
                            "Qualification Rating",
                            "Opportunity Offline Score",
                            "Score",
                            "Rating",
                        ],
                    ),
                    (
                        "created_date",
                        &["Created Date", "Opportunity Created Date", "Created On", "Date"],
                    ),
                ]),
                sales: field_aliases(&[
                    (
                        "order_number",
                        &["Order Number", "Order No", "Order ID", "Booking Number", "Booking ID"],
                    ),
                    (
                        "vin",
                        &["VIN", "VIN Number", "Vehicle Identification Number", "Chassis Number"],
                    ),
                    ("booking_date", &["Booking Date", "Order Date", "Booked On"]),
                    ("delivery_date", &["Delivery Date", "Invoice Date", "Delivered On"]),
                    (
                        "finance_bank",
                        &[
                            "Finance Bank",
                            "Financier",
                            "Financier Name",
                            "Bank Name",
                            "Finance Company",
                        ],
                    ),
                    (
                        "insurance_company",
                        &["Insurance Company", "Insurer", "Insurance Provider"],
                    ),
                ]),
                inventory: field_aliases(&[
                    (
                        "vin",
                        &["VIN", "VIN Number", "Vehicle Identification Number", "Chassis Number"],
                    ),
                    ("model_line", &["Model Line", "Model", "Model Name", "Variant"]),
                    (
                        "ageing_days",
                        &["Ageing Days", "Ageing", "Age (Days)", "Stock Age", "Days In Stock"],
                    ),
                    ("status", &["Primary Status", "Status", "Stock Status", "Vehicle Status"]),
                ]),
            },
        }
    }

    /// Load a schema from JSON. Every natural-key field must have aliases.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        let schema: Schema = serde_json::from_str(&content)?;
        schema.validate()?;
        log::info!("loaded schema {} from {}", schema.version, path.display());
        Ok(schema)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        for report in [
            ReportType::Leads,
            ReportType::Opportunities,
            ReportType::Sales,
            ReportType::Inventory,
        ] {
            let Some(key) = report.conflict_key() else {
                continue;
            };
            if self.candidates(report, key).is_empty() {
                return Err(SchemaError::MissingKeyAliases {
                    version: self.version.clone(),
                    field: format!("{}.{}", report, key),
                });
            }
        }
        Ok(())
    }

    fn fields(&self, report: ReportType) -> Option<&FieldAliases> {
        match report {
            ReportType::Leads => Some(&self.aliases.leads),
            ReportType::Opportunities => Some(&self.aliases.opportunities),
            ReportType::Sales => Some(&self.aliases.sales),
            ReportType::Inventory => Some(&self.aliases.inventory),
            ReportType::Unknown => None,
        }
    }

    /// Ordered header candidates for a canonical field; empty when unknown.
    pub fn candidates(&self, report: ReportType, field: &str) -> &[String] {
        self.fields(report)
            .and_then(|fields| fields.get(field))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::builtin()
    }
}

fn strings2(groups: &[&[&str]]) -> Vec<Vec<String>> {
    groups
        .iter()
        .map(|group| group.iter().map(|s| s.to_string()).collect())
        .collect()
}

fn rule(report: ReportType, all_of: &[&[&str]]) -> Rule {
    Rule {
        report,
        all_of: strings2(all_of),
    }
}

fn field_aliases(entries: &[(&str, &[&str])]) -> FieldAliases {
    entries
        .iter()
        .map(|(field, names)| {
            (
                field.to_string(),
                names.iter().map(|s| s.to_string()).collect(),
            )
        })
        .collect()
}
