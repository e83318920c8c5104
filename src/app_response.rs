use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

#[derive(Debug, Serialize, Deserialize)]
pub enum AppResponse {
    DatabaseError(String),
    SerializationError(String),
    NetworkError(String),
    NotFound(String),
    ValidationError(String),
    BadRequest(String),
    Ok(String),
}

impl Display for AppResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppResponse::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppResponse::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppResponse::NetworkError(msg) => write!(f, "Network error: {}", msg),
            AppResponse::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppResponse::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppResponse::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppResponse::Ok(msg) => write!(f, "Ok: {}", msg),
        }
    }
}

impl From<sled::Error> for AppResponse {
    fn from(err: sled::Error) -> Self {
        match err {
            sled::Error::Io(io_err) =>
                AppResponse::DatabaseError(format!("IO error: {}", io_err)),
            sled::Error::CollectionNotFound(name) =>
                AppResponse::NotFound(format!("Store tree not found: {:?}", name)),
            sled::Error::Unsupported(msg) =>
                AppResponse::DatabaseError(format!("Unsupported store operation: {}", msg)),
            sled::Error::ReportableBug(msg) =>
                AppResponse::DatabaseError(format!("Store invariant violated: {}", msg)),
            other => AppResponse::DatabaseError(format!("Store error: {:?}", other)),
        }
    }
}

impl From<SerdeError> for AppResponse {
    fn from(err: SerdeError) -> Self {
        AppResponse::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl From<reqwest::Error> for AppResponse {
    fn from(err: reqwest::Error) -> Self {
        AppResponse::NetworkError(format!("HTTP request error: {}", err))
    }
}

impl AppResponse {
    pub fn success(msg: impl Into<String>) -> Self {
        AppResponse::Ok(msg.into())
    }
}
