//! Record model shared by every collection in the store.
//!
//! Anything stored implements [`Document`]: it serializes to JSON and exposes
//! an identity under the `_id` key. [`LocalDbModel`] is the untyped envelope
//! handed back by collection scans and the FFI surface.
//!
//! # Examples
//!
//! ```rust
//! use themestore_core::local_db_model::{Document, LocalDbModel};
//! use serde_json::json;
//!
//! let doc = json!({"_id": "theme_1", "title": "Midnight"});
//! assert_eq!(doc.identity(), Some("theme_1"));
//!
//! let model = LocalDbModel::from_document(&doc)?;
//! assert_eq!(model.id, "theme_1");
//! # Ok::<(), themestore_core::AppResponse>(())
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::app_response::AppResponse;

/// JSON key holding a document's identity.
pub const IDENTITY_FIELD: &str = "_id";

/// Longest identity accepted, in bytes. LMDB's default maximum key size.
pub const MAX_IDENTITY_LEN: usize = 511;

/// An entity with a stable identity within its collection.
///
/// `identity` returns `None` for documents that cannot be stored; an empty
/// string counts as missing.
pub trait Document: Serialize {
    fn identity(&self) -> Option<&str>;
}

impl Document for JsonValue {
    fn identity(&self) -> Option<&str> {
        self.get(IDENTITY_FIELD)
            .and_then(JsonValue::as_str)
            .filter(|id| !id.is_empty())
    }
}

/// A stored document together with the identity it is keyed by.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LocalDbModel {
    /// Identity used as the collection key.
    pub id: String,

    /// The full document as JSON, including its `_id`.
    pub data: JsonValue,
}

impl LocalDbModel {
    /// Serializes `document` and pairs it with its identity.
    ///
    /// Fails with [`AppResponse::ValidationError`] when the document has no
    /// identity or its identity is longer than [`MAX_IDENTITY_LEN`] bytes.
    pub fn from_document<D: Document + ?Sized>(document: &D) -> Result<Self, AppResponse> {
        let id = document
            .identity()
            .ok_or_else(|| AppResponse::ValidationError("Document has no _id".to_string()))?
            .to_string();
        if id.len() > MAX_IDENTITY_LEN {
            return Err(AppResponse::ValidationError(format!(
                "_id is {} bytes, the limit is {MAX_IDENTITY_LEN}",
                id.len()
            )));
        }
        let data = serde_json::to_value(document)?;
        Ok(Self { id, data })
    }
}
