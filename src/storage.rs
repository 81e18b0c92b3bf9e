use crate::errors::AppError;
use crate::models::InventoryData;
use std::{env, path::Path, path::PathBuf};
use tokio::fs;
use tracing::{error, info};

pub fn resolve_data_path() -> Result<PathBuf, std::io::Error> {
    if let Ok(path) = env::var("APP_DATA_PATH") {
        return Ok(PathBuf::from(path));
    }

    Ok(PathBuf::from("data/inventory.json"))
}

pub async fn load_data(path: &Path) -> InventoryData {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice::<InventoryData>(&bytes) {
            Ok(data) => {
                info!(
                    lots = data.warehouse.len(),
                    kits = data.kits.len(),
                    "inventory loaded"
                );
                data
            }
            Err(err) => {
                error!("failed to parse data file: {err}");
                InventoryData::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => InventoryData::default(),
        Err(err) => {
            error!("failed to read data file: {err}");
            InventoryData::default()
        }
    }
}

pub async fn persist_data(path: &Path, data: &InventoryData) -> Result<(), AppError> {
    let payload = serde_json::to_vec_pretty(data).map_err(AppError::internal)?;
    fs::write(path, payload).await.map_err(AppError::internal)?;
    Ok(())
}
