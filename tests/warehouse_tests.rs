// tests/warehouse_tests.rs

use async_trait::async_trait;
use polars::prelude::*;
use std::fs;
use std::sync::Arc;
use stockflow::{
    CsvWarehouse, Destination, Loader, MemoryWarehouse, TabularRecords, Warehouse, WarehouseError,
};
use tokio_test::{assert_err, assert_ok};

fn prices(dates: &[&str], volumes: &[i64]) -> DataFrame {
    df!("date" => dates, "volume" => volumes).unwrap()
}

#[tokio::test]
async fn test_memory_warehouse_appends() {
    let warehouse = MemoryWarehouse::new();
    let destination = Destination::new("raw_stock_price");

    assert_ok!(warehouse.append(&prices(&["2024-01-01"], &[10]), &destination).await);
    assert_ok!(
        warehouse
            .append(&prices(&["2024-01-02", "2024-01-03"], &[20, 30]), &destination)
            .await
    );

    let table = warehouse.table("raw_stock_price").await.unwrap();
    assert_eq!(table.height(), 3);
    assert!(warehouse.table("other").await.is_none());
}

#[tokio::test]
async fn test_append_preconditions() {
    let warehouse = MemoryWarehouse::new();

    let empty = prices(&[], &[]);
    let result = warehouse.append(&empty, &Destination::new("t")).await;
    assert!(matches!(result, Err(WarehouseError::EmptyInput)));

    let result = warehouse.append(&prices(&["2024-01-01"], &[1]), &Destination::new("  ")).await;
    assert!(matches!(result, Err(WarehouseError::DestinationMissing)));
}

#[tokio::test]
async fn test_memory_warehouse_rejects_schema_change() {
    let warehouse = MemoryWarehouse::new();
    let destination = Destination::new("t");
    assert_ok!(warehouse.append(&prices(&["2024-01-01"], &[1]), &destination).await);

    let other = df!("date" => &["2024-01-02"], "close" => &[1.5]).unwrap();
    let result = warehouse.append(&other, &destination).await;
    assert!(matches!(result, Err(WarehouseError::SchemaMismatch { .. })));
}

#[tokio::test]
async fn test_csv_warehouse_writes_header_once() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = CsvWarehouse::new(dir.path().join("tables"));
    let destination = Destination::new("raw_stock_price");

    assert_ok!(warehouse.append(&prices(&["2024-01-01"], &[10]), &destination).await);
    assert_ok!(warehouse.append(&prices(&["2024-01-02"], &[20]), &destination).await);

    let contents = fs::read_to_string(warehouse.table_path(&destination)).unwrap();
    let lines: Vec<_> = contents.lines().collect();
    assert_eq!(lines, vec!["date,volume", "2024-01-01,10", "2024-01-02,20"]);
}

#[tokio::test]
async fn test_csv_warehouse_rejects_schema_change() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = CsvWarehouse::new(dir.path());
    let destination = Destination::new("t");

    assert_ok!(warehouse.append(&prices(&["2024-01-01"], &[10]), &destination).await);
    let other = df!("volume" => &[1i64], "date" => &["2024-01-02"]).unwrap();
    assert_err!(warehouse.append(&other, &destination).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_csv_warehouse_concurrent_tables() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = Arc::new(CsvWarehouse::new(dir.path()));
    let daily = Destination::new("daily");
    let quotes = Destination::new("quotes");

    let daily_prices = prices(&["2024-01-01", "2024-01-02"], &[1, 2]);
    let quote_prices = prices(&["2024-01-03"], &[3]);
    let (a, b) = tokio::join!(
        warehouse.append(&daily_prices, &daily),
        warehouse.append(&quote_prices, &quotes),
    );
    assert_ok!(a);
    assert_ok!(b);

    let daily_rows = fs::read_to_string(warehouse.table_path(&daily)).unwrap();
    let quote_rows = fs::read_to_string(warehouse.table_path(&quotes)).unwrap();
    assert_eq!(daily_rows.lines().count(), 3);
    assert_eq!(quote_rows.lines().collect::<Vec<_>>(), vec!["date,volume", "2024-01-03,3"]);
}

struct UnavailableWarehouse;

#[async_trait]
impl Warehouse for UnavailableWarehouse {
    async fn append(&self, _: &DataFrame, _: &Destination) -> Result<(), WarehouseError> {
        Err(WarehouseError::Backend("service unavailable".into()))
    }
}

#[tokio::test]
async fn test_loader_reports_rows_and_propagates_failures() {
    let records = TabularRecords {
        frame: prices(&["2024-01-01", "2024-01-02"], &[1, 2]),
        rejected_rows: 0,
    };
    let destination = Destination::new("raw_stock_price");

    let loader = Loader::new(Arc::new(MemoryWarehouse::new()));
    assert_eq!(loader.load(&records, &destination).await.unwrap(), 2);

    let loader = Loader::new(Arc::new(UnavailableWarehouse));
    let result = loader.load(&records, &destination).await;
    assert!(matches!(result, Err(WarehouseError::Backend(_))));
}
