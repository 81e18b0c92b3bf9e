use crate::backend::BackendClient;
use crate::config::AppConfig;
use crate::models::InventoryData;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub data: Arc<Mutex<InventoryData>>,
    pub backend: Arc<BackendClient>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(data_path: PathBuf, data: InventoryData, config: AppConfig) -> Self {
        let backend = BackendClient::new(&config);
        Self::with_backend(data_path, data, config, backend)
    }

    pub fn with_backend(
        data_path: PathBuf,
        data: InventoryData,
        config: AppConfig,
        backend: BackendClient,
    ) -> Self {
        Self {
            data_path,
            data: Arc::new(Mutex::new(data)),
            backend: Arc::new(backend),
            config: Arc::new(config),
        }
    }
}
