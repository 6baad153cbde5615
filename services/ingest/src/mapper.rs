//! Raw row -> canonical record, one mapping per report type.
//!
//! A row whose natural key resolves empty yields `None`. That is a filter,
//! never an error.

use crate::dates::{normalize_date, year_month, DateOrder};
use crate::model::{
    CanonicalRecord, InventoryRecord, LeadRecord, OpportunityRecord, RawRow, ReportType,
    SaleRecord,
};
use crate::resolve::FieldResolver;
use crate::schema::Schema;

const DEFAULT_LEAD_SOURCE: &str = "Unknown";
const TEST_DRIVE_DONE: &[&str] = &["yes", "done", "completed"];

pub struct RecordMapper<'s> {
    report: ReportType,
    fields: FieldResolver<'s>,
    date_order: DateOrder,
}

impl<'s> RecordMapper<'s> {
    pub fn new(schema: &'s Schema, report: ReportType, date_order: DateOrder) -> Self {
        Self {
            report,
            fields: FieldResolver::new(schema, report),
            date_order,
        }
    }

    /// Field name holding the natural key for this mapper's report type.
    pub fn key_field(&self) -> &'static str {
        self.report.conflict_key().unwrap_or("natural key")
    }

    pub fn map(&self, row: &RawRow) -> Option<CanonicalRecord> {
        match self.report {
            ReportType::Leads => self.lead(row),
            ReportType::Opportunities => self.opportunity(row),
            ReportType::Sales => self.sale(row),
            ReportType::Inventory => self.inventory(row),
            ReportType::Unknown => None,
        }
    }

    fn text(&self, row: &RawRow, field: &str) -> String {
        self.fields.field(row, field).to_string()
    }

    fn lead(&self, row: &RawRow) -> Option<CanonicalRecord> {
        let lead_id = self.text(row, "lead_id");
        if lead_id.is_empty() {
            return None;
        }

        let created_date = normalize_date(self.fields.field(row, "created_date"), self.date_order);
        let source = match self.fields.field(row, "source") {
            "" => DEFAULT_LEAD_SOURCE.to_string(),
            s => s.to_string(),
        };

        Some(CanonicalRecord::Lead(LeadRecord {
            lead_id,
            name: self.text(row, "name"),
            phone: self.text(row, "phone"),
            city: self.text(row, "city"),
            state: self.text(row, "state"),
            status: self.text(row, "status"),
            source,
            created_date,
            year_month: created_date.map(year_month),
        }))
    }

    fn opportunity(&self, row: &RawRow) -> Option<CanonicalRecord> {
        let opportunity_id = self.text(row, "opportunity_id");
        if opportunity_id.is_empty() {
            return None;
        }

        let created_date = normalize_date(self.fields.field(row, "created_date"), self.date_order);

        Some(CanonicalRecord::Opportunity(OpportunityRecord {
            opportunity_id,
            test_drive_completed: is_done(self.fields.field(row, "test_drive")),
            qualification: self.text(row, "qualification"),
            created_date,
            year_month: created_date.map(year_month),
        }))
    }

    fn sale(&self, row: &RawRow) -> Option<CanonicalRecord> {
        let vin = self.text(row, "vin");
        let order_number = match self.fields.field(row, "order_number") {
            "" if vin.is_empty() => return None,
            "" => vin.clone(),
            order => order.to_string(),
        };

        let delivery_date =
            normalize_date(self.fields.field(row, "delivery_date"), self.date_order);

        Some(CanonicalRecord::Sale(SaleRecord {
            order_number,
            vin,
            booking_date: normalize_date(self.fields.field(row, "booking_date"), self.date_order),
            delivery_date,
            finance_bank: self.text(row, "finance_bank"),
            insurance_company: self.text(row, "insurance_company"),
            year_month: delivery_date.map(year_month),
        }))
    }

    fn inventory(&self, row: &RawRow) -> Option<CanonicalRecord> {
        let vin = self.text(row, "vin");
        if vin.is_empty() {
            return None;
        }

        Some(CanonicalRecord::Inventory(InventoryRecord {
            vin,
            model_line: self.text(row, "model_line"),
            ageing_days: parse_days(self.fields.field(row, "ageing_days")),
            status: self.text(row, "status"),
        }))
    }
}

fn is_done(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    TEST_DRIVE_DONE.contains(&value.as_str())
}

/// Leading integer of a day count ("120", "1,204", "45 days"); 0 otherwise.
fn parse_days(value: &str) -> i64 {
    let digits: String = value
        .trim()
        .chars()
        .filter(|c| *c != ',')
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        let headers: Vec<String> = pairs.iter().map(|(k, _)| k.to_string()).collect();
        let fields: Vec<String> = pairs.iter().map(|(_, v)| v.to_string()).collect();
        RawRow::new(&headers, &fields)
    }

    fn map(report: ReportType, pairs: &[(&str, &str)]) -> Option<CanonicalRecord> {
        let schema = Schema::builtin();
        RecordMapper::new(&schema, report, DateOrder::MonthFirst).map(&row(pairs))
    }

    #[test]
    fn test_lead_mapping() {
        let record = map(
            ReportType::Leads,
            &[
                ("Lead ID", "L-100"),
                ("Customer Name", "Asha Rao"),
                ("Mobile Number", "98450 00000"),
                ("City", "Pune"),
                ("State", "MH"),
                ("Lead Status", "Open"),
                ("Created Date", "03/15/2024 09:10"),
            ],
        );
        let Some(CanonicalRecord::Lead(lead)) = record else {
            panic!("expected lead");
        };
        assert_eq!(lead.lead_id, "L-100");
        assert_eq!(lead.name, "Asha Rao");
        assert_eq!(lead.phone, "98450 00000");
        assert_eq!(lead.status, "Open");
        assert_eq!(lead.source, "Unknown");
        assert_eq!(lead.created_date, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(lead.year_month.as_deref(), Some("2024-03"));
    }

    #[test]
    fn test_lead_without_id_dropped() {
        assert_eq!(map(ReportType::Leads, &[("Lead ID", ""), ("Source", "Web")]), None);
    }

    #[test]
    fn test_lead_bad_date_has_no_bucket() {
        let Some(CanonicalRecord::Lead(lead)) =
            map(ReportType::Leads, &[("Lead ID", "L-1"), ("Created Date", "n/a")])
        else {
            panic!("expected lead");
        };
        assert_eq!(lead.created_date, None);
        assert_eq!(lead.year_month, None);
    }

    #[test]
    fn test_opportunity_test_drive_flag() {
        for (value, expected) in [
            ("Yes", true),
            ("DONE", true),
            (" completed ", true),
            ("No", false),
            ("Not done", false),
            ("", false),
        ] {
            let Some(CanonicalRecord::Opportunity(opp)) = map(
                ReportType::Opportunities,
                &[("Opportunity ID", "O-1"), ("Test Drive Completed", value)],
            ) else {
                panic!("expected opportunity");
            };
            assert_eq!(opp.test_drive_completed, expected, "value {:?}", value);
        }
    }

    #[test]
    fn test_opportunity_plain_id_column() {
        let Some(CanonicalRecord::Opportunity(opp)) = map(
            ReportType::Opportunities,
            &[
                ("ID", "OPP-9"),
                ("Opportunity Offline Score", "Hot"),
                ("Created Date", "2024-01-31"),
            ],
        ) else {
            panic!("expected opportunity");
        };
        assert_eq!(opp.opportunity_id, "OPP-9");
        assert_eq!(opp.qualification, "Hot");
        assert_eq!(opp.year_month.as_deref(), Some("2024-01"));
    }

    #[test]
    fn test_sale_bucket_uses_delivery_date() {
        let Some(CanonicalRecord::Sale(sale)) = map(
            ReportType::Sales,
            &[
                ("Order Number", "SO-1"),
                ("VIN", "MA3XYZ"),
                ("Booking Date", "01/28/2024"),
                ("Delivery Date", "02/03/2024"),
                ("Financier", "SBI"),
                ("Insurance Company", "ICICI Lombard"),
            ],
        ) else {
            panic!("expected sale");
        };
        assert_eq!(sale.order_number, "SO-1");
        assert_eq!(sale.booking_date, NaiveDate::from_ymd_opt(2024, 1, 28));
        assert_eq!(sale.year_month.as_deref(), Some("2024-02"));
        assert_eq!(sale.finance_bank, "SBI");
        assert_eq!(sale.insurance_company, "ICICI Lombard");
    }

    #[test]
    fn test_sale_falls_back_to_vin() {
        let record = map(ReportType::Sales, &[("Order Number", ""), ("VIN", "MA3XYZ")]);
        assert_eq!(record.map(|r| r.natural_key().to_string()).as_deref(), Some("MA3XYZ"));
    }

    #[test]
    fn test_sale_without_order_or_vin_dropped() {
        assert_eq!(
            map(ReportType::Sales, &[("Order Number", ""), ("VIN", ""), ("Financier", "SBI")]),
            None
        );
    }

    #[test]
    fn test_inventory_mapping() {
        let Some(CanonicalRecord::Inventory(car)) = map(
            ReportType::Inventory,
            &[
                ("VIN", "XYZ999"),
                ("Model Line", "Compact SUV"),
                ("Ageing Days", "120"),
                ("Primary Status", "In Stock"),
            ],
        ) else {
            panic!("expected inventory");
        };
        assert_eq!(car.ageing_days, 120);
        assert!(car.is_aged());
        assert_eq!(car.status, "In Stock");
    }

    #[test]
    fn test_parse_days() {
        assert_eq!(parse_days("45"), 45);
        assert_eq!(parse_days(" 45 days"), 45);
        assert_eq!(parse_days("1,204"), 1204);
        assert_eq!(parse_days("unknown"), 0);
        assert_eq!(parse_days(""), 0);
        assert_eq!(parse_days("-3"), 0);
    }

    #[test]
    fn test_unknown_maps_nothing() {
        assert_eq!(map(ReportType::Unknown, &[("VIN", "A")]), None);
    }
}
