use axum::http::StatusCode;
use thiserror::Error;

use crate::backend::BackendError;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        let message = err.to_string();
        match err {
            InventoryError::KitNotFound(_)
            | InventoryError::ItemNotFound { .. }
            | InventoryError::LotNotFound(_)
            | InventoryError::UserNotFound(_)
            | InventoryError::ReportNotFound(_) => Self::not_found(message),
            InventoryError::DuplicateKitName(_)
            | InventoryError::DuplicateKitItem(_)
            | InventoryError::DuplicateMaterialId(_) => Self::conflict(message),
            InventoryError::Invalid(_) | InventoryError::QualityCheck(_) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message,
            },
        }
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Timeout { .. } => Self {
                status: StatusCode::GATEWAY_TIMEOUT,
                message: err.to_string(),
            },
            BackendError::Status { status: 404, .. } => Self::not_found(err.to_string()),
            _ => Self::bad_gateway(err.to_string()),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InventoryError {
    #[error("kit '{0}' not found")]
    KitNotFound(String),

    #[error("item '{code}' not found in kit '{kit_id}'")]
    ItemNotFound { kit_id: String, code: String },

    #[error("warehouse lot '{0}' not found")]
    LotNotFound(String),

    #[error("user '{0}' not found")]
    UserNotFound(String),

    #[error("report '{0}' not found")]
    ReportNotFound(String),

    #[error("a kit named '{0}' already exists")]
    DuplicateKitName(String),

    #[error("material '{0}' is already in this kit")]
    DuplicateKitItem(String),

    #[error("material id {0} is already taken")]
    DuplicateMaterialId(i64),

    #[error("{0}")]
    Invalid(String),

    #[error("quality check failed: {}", .0.join("; "))]
    QualityCheck(Vec<String>),
}
