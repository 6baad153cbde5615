use chrono::NaiveDate;
use ingest::model::CanonicalRecord;
use ingest::{import_file, import_text, ImportError, ImportOptions, MemoryStore, ReportType};
use rust_xlsxwriter::{Format, Workbook};
use std::io::Write;

const INVENTORY_CSV: &str = "VIN,Model Line,Ageing Days,Primary Status\n\
                             ABC123,Hatch,45,In Stock\n\
                             ,Sedan,30,In Stock\n\
                             XYZ999,Compact SUV,120,In Stock\n";

const LEADS_EXPORT: &str = "\
Dealer Lead Register\r\n\
Outlet: Andheri West\r\n\
Period: 01-Mar-2024 to 31-Mar-2024\r\n\
Lead ID,Customer  Name,Mobile,City,State,Lead Status,Source,Created Date\r\n\
L-001,\"Rao, Asha\",9845000001,Mumbai,MH,Open,Walk-in,03/02/2024 10:15\r\n\
L-002,Ravi Kumar,9845000002,Thane,MH,Lost,,03/09/2024\r\n\
\r\n\
,No Id,9845000003,Pune,MH,Open,Web,03/10/2024\r\n\
L-001,\"Rao, Asha\",9845000001,Mumbai,MH,Converted,Walk-in,03/02/2024\r\n";

fn inventory(store: &MemoryStore) -> Vec<ingest::model::InventoryRecord> {
    store
        .records("inventory")
        .into_iter()
        .filter_map(|r| match r {
            CanonicalRecord::Inventory(car) => Some(car),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_inventory_end_to_end() {
    let store = MemoryStore::new();
    let report = import_text(&store, INVENTORY_CSV, &ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(report.report_type, ReportType::Inventory);
    assert_eq!(report.records_upserted, 2);
    assert_eq!(report.rows_dropped, 1);

    let cars = inventory(&store);
    assert_eq!(cars.len(), 2);
    let aged: Vec<_> = cars.iter().filter(|c| c.is_aged()).collect();
    assert_eq!(aged.len(), 1);
    assert_eq!(aged[0].vin, "XYZ999");
    assert_eq!(aged[0].ageing_days, 120);
}

#[tokio::test]
async fn test_reimport_is_idempotent() {
    let store = MemoryStore::new();
    let options = ImportOptions::default();

    import_text(&store, INVENTORY_CSV, &options).await.unwrap();
    let first = store.records("inventory");
    import_text(&store, INVENTORY_CSV, &options).await.unwrap();
    let second = store.records("inventory");

    assert_eq!(first, second);
    assert_eq!(second.len(), 2);
    assert_eq!(store.calls(), 2);
}

#[tokio::test]
async fn test_unrecognized_file_never_reaches_store() {
    let store = MemoryStore::new();
    let err = import_text(&store, "Colour,Size,Weight\nred,L,3\n", &ImportOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::UnrecognizedFormat(_)));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_empty_payload_never_reaches_store() {
    let store = MemoryStore::new();
    let text = "Order Number,VIN,Delivery Date\n,,03/01/2024\n";
    let err = import_text(&store, text, &ImportOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::EmptyPayload { .. }));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_leads_export_with_banner() {
    let store = MemoryStore::new();
    let report = import_text(&store, LEADS_EXPORT, &ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(report.report_type, ReportType::Leads);
    assert_eq!(report.header_row, 3);
    assert_eq!(report.rows_seen, 4);
    assert_eq!(report.rows_dropped, 1);
    assert_eq!(report.duplicates, 1);

    let leads: Vec<_> = store
        .records("leads")
        .into_iter()
        .filter_map(|r| match r {
            CanonicalRecord::Lead(lead) => Some(lead),
            _ => None,
        })
        .collect();
    assert_eq!(leads.len(), 2);

    // last occurrence of L-001 wins
    assert_eq!(leads[0].lead_id, "L-001");
    assert_eq!(leads[0].name, "Rao, Asha");
    assert_eq!(leads[0].status, "Converted");
    assert_eq!(leads[0].year_month.as_deref(), Some("2024-03"));

    // blank source falls back to Unknown; double-spaced header still resolves
    assert_eq!(leads[1].lead_id, "L-002");
    assert_eq!(leads[1].source, "Unknown");
    assert_eq!(leads[1].name, "Ravi Kumar");
}

#[tokio::test]
async fn test_import_file_windows_1252() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(b"Order Number,VIN,Delivery Date,Financier,Insurer\n").unwrap();
    file.write_all(b"SO-77,MA1AB,04/18/2024,Caja Espa\xf1a,Mapfre\n").unwrap();
    file.flush().unwrap();

    let store = MemoryStore::new();
    let report = import_file(&store, file.path(), &ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(report.report_type, ReportType::Sales);

    let sales = store.records("sales");
    let CanonicalRecord::Sale(sale) = &sales[0] else {
        panic!("expected sale");
    };
    assert_eq!(sale.finance_bank, "Caja España");
    assert_eq!(sale.insurance_company, "Mapfre");
    assert_eq!(sale.year_month.as_deref(), Some("2024-04"));
}

#[tokio::test]
async fn test_missing_file_is_read_error() {
    let store = MemoryStore::new();
    let err = import_file(
        &store,
        std::path::Path::new("/nonexistent/report.csv"),
        &ImportOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ImportError::Read(_)));
}

#[tokio::test]
async fn test_import_inventory_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stock.xlsx");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Stock Ageing Report").unwrap();
    sheet.write_string(1, 0, "VIN").unwrap();
    sheet.write_string(1, 1, "Model Line").unwrap();
    sheet.write_string(1, 2, "Ageing Days").unwrap();
    sheet.write_string(1, 3, "Primary Status").unwrap();
    sheet.write_string(2, 0, "ABC123").unwrap();
    sheet.write_string(2, 1, "Hatch").unwrap();
    sheet.write_number(2, 2, 45.0).unwrap();
    sheet.write_string(2, 3, "In Stock").unwrap();
    sheet.write_string(3, 0, "XYZ999").unwrap();
    sheet.write_string(3, 1, "Compact SUV").unwrap();
    sheet.write_number(3, 2, 120.0).unwrap();
    sheet.write_string(3, 3, "In Stock").unwrap();
    workbook.save(&path).unwrap();

    let store = MemoryStore::new();
    let report = import_file(&store, &path, &ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(report.report_type, ReportType::Inventory);
    assert_eq!(report.header_row, 1);
    assert_eq!(report.records_upserted, 2);

    let cars = inventory(&store);
    assert_eq!(cars[0].vin, "ABC123");
    assert_eq!(cars[0].ageing_days, 45);
    assert_eq!(cars[1].ageing_days, 120);
    assert!(cars[1].is_aged());
}

#[tokio::test]
async fn test_import_sales_workbook_with_date_cells() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sales.xlsx");
    let date = Format::new().set_num_format("yyyy-mm-dd");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Retail Register").unwrap();
    sheet.write_string(1, 0, "Order Number").unwrap();
    sheet.write_string(1, 1, "VIN").unwrap();
    sheet.write_string(1, 2, "Delivery Date").unwrap();
    sheet.write_string(1, 3, "Financier").unwrap();
    sheet.write_string(2, 0, "SO-9").unwrap();
    sheet.write_string(2, 1, "MA1XY").unwrap();
    // 45366 is 2024-03-15
    sheet.write_number_with_format(2, 2, 45366.0, &date).unwrap();
    sheet.write_string(2, 3, "HDFC Bank").unwrap();
    workbook.save(&path).unwrap();

    let store = MemoryStore::new();
    let report = import_file(&store, &path, &ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(report.report_type, ReportType::Sales);
    assert_eq!(report.header_row, 1);

    let sales = store.records("sales");
    let CanonicalRecord::Sale(sale) = &sales[0] else {
        panic!("expected sale");
    };
    assert_eq!(sale.order_number, "SO-9");
    assert_eq!(sale.delivery_date, NaiveDate::from_ymd_opt(2024, 3, 15));
    assert_eq!(sale.year_month.as_deref(), Some("2024-03"));
    assert_eq!(sale.finance_bank, "HDFC Bank");
}
