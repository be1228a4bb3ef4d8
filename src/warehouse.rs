// src/warehouse.rs

use async_trait::async_trait;
use polars::prelude::*;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::WarehouseError;
use crate::model::Destination;

/// Append-only sink for transformed rows.
///
/// Implementations never create schemas on the caller's behalf beyond what
/// appending to a fresh table implies.
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn append(&self, frame: &DataFrame, destination: &Destination) -> Result<(), WarehouseError>;
}

fn check_request(frame: &DataFrame, destination: &Destination) -> Result<(), WarehouseError> {
    if frame.height() == 0 {
        return Err(WarehouseError::EmptyInput);
    }
    if destination.is_empty() {
        return Err(WarehouseError::DestinationMissing);
    }
    Ok(())
}

/// Keeps each destination as a `DataFrame` in memory.
#[derive(Default)]
pub struct MemoryWarehouse {
    tables: Mutex<HashMap<String, DataFrame>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn table(&self, destination: &str) -> Option<DataFrame> {
        self.tables.lock().await.get(destination).cloned()
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn append(&self, frame: &DataFrame, destination: &Destination) -> Result<(), WarehouseError> {
        check_request(frame, destination)?;

        let mut tables = self.tables.lock().await;
        match tables.get_mut(destination.as_str()) {
            Some(table) => {
                if table.get_column_names() != frame.get_column_names() {
                    return Err(WarehouseError::SchemaMismatch {
                        destination: destination.to_string(),
                        expected: table.get_column_names().join(","),
                        actual: frame.get_column_names().join(","),
                    });
                }
                table.vstack_mut(frame)?;
            }
            None => {
                tables.insert(destination.to_string(), frame.clone());
            }
        }
        Ok(())
    }
}

/// One CSV file per destination under a root directory.
pub struct CsvWarehouse {
    root: PathBuf,
}

impl CsvWarehouse {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CsvWarehouse { root: root.into() }
    }

    pub fn table_path(&self, destination: &Destination) -> PathBuf {
        self.root.join(format!("{}.csv", destination.as_str()))
    }
}

fn append_blocking(
    root: &Path,
    path: &Path,
    mut frame: DataFrame,
    destination: &Destination,
) -> Result<(), WarehouseError> {
    let header = frame.get_column_names().join(",");

    let existing = read_header(path)?;
    if let Some(expected) = &existing {
        if *expected != header {
            return Err(WarehouseError::SchemaMismatch {
                destination: destination.to_string(),
                expected: expected.clone(),
                actual: header,
            });
        }
    }

    fs::create_dir_all(root)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    CsvWriter::new(&mut file)
        .include_header(existing.is_none())
        .finish(&mut frame)?;

    debug!(path = %path.display(), rows = frame.height(), "appended csv rows");
    Ok(())
}

fn read_header(path: &Path) -> Result<Option<String>, WarehouseError> {
    if !path.exists() {
        return Ok(None);
    }
    let mut line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut line)?;
    let line = line.trim_end();
    Ok((!line.is_empty()).then(|| line.to_string()))
}

#[async_trait]
impl Warehouse for CsvWarehouse {
    async fn append(&self, frame: &DataFrame, destination: &Destination) -> Result<(), WarehouseError> {
        check_request(frame, destination)?;
        let root = self.root.clone();
        let path = self.table_path(destination);
        let frame = frame.clone();
        let destination = destination.clone();

        tokio::task::spawn_blocking(move || append_blocking(&root, &path, frame, &destination))
            .await
            .map_err(|e| WarehouseError::Backend(format!("csv append task failed: {e}")))?
    }
}
