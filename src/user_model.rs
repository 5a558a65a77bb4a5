//! User and theme documents, in both their embedded and normalized shapes.
//!
//! The remote profile query returns a [`FullUser`]: a [`User`] whose `themes`
//! are full [`EmbeddedTheme`] documents (entries may be null). After
//! normalization the user becomes a [`NormalizedUser`] holding only
//! [`ThemeRef`]s, and each theme becomes an [`OwnedTheme`] pointing back at
//! its user.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::local_db_model::Document;

pub const USERS_COLLECTION: &str = "users";
pub const THEMES_COLLECTION: &str = "themes";

/// Identity-only stand-in for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(rename = "_id")]
    pub id: String,
}

/// Identity-only stand-in for a theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeRef {
    #[serde(rename = "_id")]
    pub id: String,
}

/// A user profile with its themes in shape `T`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct User<T> {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub themes: Vec<T>,

    /// Remaining profile fields (display name, bio, ...).
    #[serde(flatten)]
    pub profile: Map<String, JsonValue>,
}

/// User as delivered by the remote query.
pub type FullUser = User<Option<EmbeddedTheme>>;

/// User as stored locally and returned to callers.
pub type NormalizedUser = User<ThemeRef>;

impl<T: Serialize> Document for User<T> {
    fn identity(&self) -> Option<&str> {
        Some(self.id.as_str()).filter(|id| !id.is_empty())
    }
}

/// A theme embedded in a remote user payload.
///
/// Identity is optional here; the `user` back-reference, if any, is kept
/// in `fields` untouched and gets overwritten during normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedTheme {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(flatten)]
    pub fields: Map<String, JsonValue>,
}

impl EmbeddedTheme {
    /// Identity, treating an empty string as missing.
    pub fn identity(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// A theme as stored in the `themes` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedTheme {
    #[serde(rename = "_id")]
    pub id: String,

    pub user: UserRef,

    #[serde(flatten)]
    pub fields: Map<String, JsonValue>,
}

impl OwnedTheme {
    /// Copies `theme` with its owner set to `owner`. Returns `None` for a
    /// theme without identity.
    pub fn from_embedded(theme: &EmbeddedTheme, owner: &str) -> Option<Self> {
        let id = theme.identity()?.to_string();
        let mut fields = theme.fields.clone();
        fields.remove("user");

        Some(Self {
            id,
            user: UserRef {
                id: owner.to_string(),
            },
            fields,
        })
    }

    pub fn to_ref(&self) -> ThemeRef {
        ThemeRef {
            id: self.id.clone(),
        }
    }
}

impl Document for OwnedTheme {
    fn identity(&self) -> Option<&str> {
        Some(self.id.as_str()).filter(|id| !id.is_empty())
    }
}

/// `data` part of the remote response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullUserData {
    pub user: FullUser,
}

/// Envelope returned by the remote `getFullUser` query: `{data: {user}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullUserResponse {
    pub data: FullUserData,
}
