pub mod alerts;
pub mod app;
pub mod audit;
pub mod backend;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod inventory;
pub mod materials;
pub mod models;
pub mod notify;
pub mod orders;
pub mod query;
pub mod report;
pub mod settings;
pub mod state;
pub mod storage;

pub use app::router;
pub use config::AppConfig;
pub use state::AppState;
pub use storage::{load_data, resolve_data_path};
