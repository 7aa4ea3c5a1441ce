use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RollcallError {
    #[error("Invalid database version {0}: versions start at 1")]
    InvalidVersion(u32),

    #[error("Database {name} is at version {existing}, cannot open at version {requested}")]
    VersionMismatch {
        name: String,
        requested: u32,
        existing: u32,
    },

    #[error("Database {name} version {version} was closed by an upgrade")]
    DatabaseClosed { name: String, version: u32 },

    #[error("Object store not found: {0}")]
    ObjectStoreNotFound(String),

    #[error("Transaction on {0} is readonly")]
    ReadOnlyTransaction(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("{date} is a holiday without an extra class")]
    HolidayWithoutClass { date: String },

    #[error("Invalid geolocation ({lat}, {lon})")]
    InvalidGeolocation { lat: f64, lon: f64 },

    #[error("Store lock poisoned: {0}")]
    Poisoned(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RollcallError>;

impl From<std::io::Error> for RollcallError {
    fn from(e: std::io::Error) -> Self {
        RollcallError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for RollcallError {
    fn from(e: serde_json::Error) -> Self {
        RollcallError::Json(e.to_string())
    }
}

impl RollcallError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RollcallError::InvalidVersion(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RollcallError::VersionMismatch { .. } => StatusCode::CONFLICT,
            RollcallError::DatabaseClosed { .. } => StatusCode::CONFLICT,
            RollcallError::ObjectStoreNotFound(_) => StatusCode::NOT_FOUND,
            RollcallError::ReadOnlyTransaction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RollcallError::InvalidRecord(_) => StatusCode::BAD_REQUEST,
            RollcallError::InvalidGeolocation { .. } => StatusCode::BAD_REQUEST,
            RollcallError::HolidayWithoutClass { .. } => StatusCode::BAD_REQUEST,
            RollcallError::Poisoned(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RollcallError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RollcallError::Json(_) => StatusCode::BAD_REQUEST,
            RollcallError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            RollcallError::InvalidVersion(_) => "invalid_version",
            RollcallError::VersionMismatch { .. } => "version_mismatch",
            RollcallError::DatabaseClosed { .. } => "database_closed",
            RollcallError::ObjectStoreNotFound(_) => "object_store_not_found",
            RollcallError::ReadOnlyTransaction(_) => "readonly_transaction",
            RollcallError::InvalidRecord(_) => "invalid_record",
            RollcallError::InvalidGeolocation { .. } => "invalid_geolocation",
            RollcallError::HolidayWithoutClass { .. } => "holiday",
            RollcallError::Poisoned(_) => "internal_error",
            RollcallError::Io(_) => "io_error",
            RollcallError::Json(_) => "json_error",
            RollcallError::Config(_) => "config_error",
        }
    }
}

// Axum IntoResponse implementation (feature-gated)
#[cfg(feature = "axum-support")]
use axum::response::{IntoResponse, Json, Response};
#[cfg(feature = "axum-support")]
use serde::Serialize;

#[cfg(feature = "axum-support")]
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[cfg(feature = "axum-support")]
impl IntoResponse for RollcallError {
    fn into_response(self) -> Response {
        let suggestion = match &self {
            RollcallError::InvalidGeolocation { .. } => Some(
                "Latitude must be within [-90, 90] and longitude within [-180, 180]".to_string(),
            ),
            RollcallError::VersionMismatch { .. } => {
                Some("Open the database at its current version or newer".to_string())
            }
            _ => None,
        };

        let error_response = ErrorResponse {
            error: self.error_code().to_string(),
            message: self.to_string(),
            request_id: format!("req_rc_{}", uuid::Uuid::new_v4()),
            suggestion,
        };

        (self.status_code(), Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            RollcallError::InvalidGeolocation { lat: 91.0, lon: 0.0 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RollcallError::ObjectStoreNotFound("records".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RollcallError::Io("disk full".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: RollcallError = io.into();
        assert!(matches!(err, RollcallError::Io(ref m) if m.contains("gone")));
    }
}
