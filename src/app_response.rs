use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppResponse {
    DatabaseError(String),
    SerializationError(String),
    NotFound(String),
    ValidationError(String),
    BadRequest(String),
    Unauthorized(String),
    RemoteError(String),
    SecurityError(String),
    DeliveryError(String),
    Ok(String),
}

impl Display for AppResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppResponse::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppResponse::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppResponse::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppResponse::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppResponse::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppResponse::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppResponse::RemoteError(msg) => write!(f, "Remote error: {}", msg),
            AppResponse::SecurityError(msg) => write!(f, "Security error: {}", msg),
            AppResponse::DeliveryError(msg) => write!(f, "Delivery error: {}", msg),
            AppResponse::Ok(msg) => write!(f, "Ok: {}", msg),
        }
    }
}

impl std::error::Error for AppResponse {}

impl From<lmdb::Error> for AppResponse {
    fn from(err: lmdb::Error) -> Self {
        match err {
            lmdb::Error::NotFound => AppResponse::NotFound("Key not found in LMDB".to_string()),
            lmdb::Error::MapFull => {
                AppResponse::DatabaseError("LMDB map is full, increase map_size".to_string())
            }
            lmdb::Error::DbsFull => AppResponse::DatabaseError(
                "Too many collections, increase max_collections".to_string(),
            ),
            lmdb::Error::Corrupted => {
                AppResponse::DatabaseError("Database is corrupted".to_string())
            }
            _ => AppResponse::DatabaseError(format!("LMDB error: {}", err)),
        }
    }
}

impl From<SerdeError> for AppResponse {
    fn from(err: SerdeError) -> Self {
        AppResponse::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl From<bcrypt::BcryptError> for AppResponse {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppResponse::SecurityError(format!("Password hashing failed: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for AppResponse {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppResponse::SecurityError(format!("Token error: {}", err))
    }
}

impl AppResponse {
    pub fn success(msg: impl Into<String>) -> Self {
        AppResponse::Ok(msg.into())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, AppResponse::Ok(_))
    }
}
