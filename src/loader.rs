// src/loader.rs

use std::sync::Arc;
use tracing::{error, info};

use crate::error::WarehouseError;
use crate::model::Destination;
use crate::transformer::TabularRecords;
use crate::warehouse::Warehouse;

/// Appends transformed rows to a warehouse table. No retries.
pub struct Loader {
    warehouse: Arc<dyn Warehouse>,
}

impl Loader {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Loader { warehouse }
    }

    /// Returns the number of rows appended.
    pub async fn load(
        &self,
        records: &TabularRecords,
        destination: &Destination,
    ) -> Result<usize, WarehouseError> {
        match self.warehouse.append(&records.frame, destination).await {
            Ok(()) => {
                info!(%destination, rows = records.height(), "rows appended");
                Ok(records.height())
            }
            Err(err) => {
                error!(%destination, rows = records.height(), error = %err, "append failed");
                Err(err)
            }
        }
    }
}
