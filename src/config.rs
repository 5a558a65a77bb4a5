//! Runtime configuration for the store and the account service.
//!
//! Both configs have sensible defaults for tests and embedding, and a
//! `from_env()` constructor for deployed builds.

use std::env;
use std::str::FromStr;

use crate::app_response::AppResponse;

const DEFAULT_DB_NAME: &str = "themestore";
const DEFAULT_MAP_SIZE: usize = 64 * 1024 * 1024;
const DEFAULT_MAX_COLLECTIONS: u32 = 16;
const DEFAULT_SALT_ROUNDS: u32 = 10;
const DEFAULT_DOMAIN: &str = "openusercss.org";

/// LMDB environment settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database name; the environment lives in `<name>.lmdb`.
    pub name: String,
    /// Maximum size of the memory map in bytes.
    pub map_size: usize,
    /// Maximum number of named collections.
    pub max_collections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DB_NAME.to_string(),
            map_size: DEFAULT_MAP_SIZE,
            max_collections: DEFAULT_MAX_COLLECTIONS,
        }
    }
}

impl StoreConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Load from `THEMESTORE_DB_NAME`, `THEMESTORE_DB_MAP_SIZE` and
    /// `THEMESTORE_DB_MAX_COLLECTIONS`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, AppResponse> {
        let defaults = Self::default();
        Ok(Self {
            name: env::var("THEMESTORE_DB_NAME").unwrap_or(defaults.name),
            map_size: parse_var("THEMESTORE_DB_MAP_SIZE")?.unwrap_or(defaults.map_size),
            max_collections: parse_var("THEMESTORE_DB_MAX_COLLECTIONS")?
                .unwrap_or(defaults.max_collections),
        })
    }

    /// Directory holding the LMDB environment.
    pub fn lmdb_dir(&self) -> String {
        format!("{}.lmdb", self.name)
    }
}

/// Settings for account mutations and verification e-mails.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// Issuer of verification tokens.
    pub domain: String,
    /// HMAC secret used to sign verification tokens.
    pub client_private_key: String,
    /// bcrypt cost factor.
    pub salt_rounds: u32,
    /// Links point at the local dev server instead of the public site.
    pub development: bool,
}

impl AccountConfig {
    pub fn new(client_private_key: impl Into<String>) -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            client_private_key: client_private_key.into(),
            salt_rounds: DEFAULT_SALT_ROUNDS,
            development: false,
        }
    }

    /// Load from `THEMESTORE_CLIENT_PRIVATE_KEY` (required),
    /// `THEMESTORE_DOMAIN`, `THEMESTORE_SALT_ROUNDS` and `THEMESTORE_ENV`.
    pub fn from_env() -> Result<Self, AppResponse> {
        let key = env::var("THEMESTORE_CLIENT_PRIVATE_KEY").map_err(|_| {
            AppResponse::ValidationError(
                "THEMESTORE_CLIENT_PRIVATE_KEY environment variable not set".to_string(),
            )
        })?;

        let mut config = Self::new(key);
        if let Ok(domain) = env::var("THEMESTORE_DOMAIN") {
            config.domain = domain;
        }
        if let Some(rounds) = parse_var("THEMESTORE_SALT_ROUNDS")? {
            config.salt_rounds = rounds;
        }
        config.development = env::var("THEMESTORE_ENV")
            .map(|v| v.eq_ignore_ascii_case("development"))
            .unwrap_or(false);

        Ok(config)
    }

    /// Base URL that verification links are built on.
    pub fn public_url(&self) -> &'static str {
        if self.development {
            "http://localhost:5010"
        } else {
            "https://openusercss.org"
        }
    }
}

pub(crate) fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>, AppResponse> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppResponse::ValidationError(format!("Invalid value for {key}: {raw}"))),
        Err(_) => Ok(None),
    }
}
