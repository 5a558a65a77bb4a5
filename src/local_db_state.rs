//! Collection-based document store.
//!
//! Collections live in memory as identity-ordered maps. When opened with
//! [`LocalDbState::init`] every collection is mirrored to its own named LMDB
//! database inside `<name>.lmdb`, written through on each upsert and hydrated
//! lazily the first time the collection is requested.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use lmdb::{Cursor, Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::app_response::AppResponse;
use crate::config::StoreConfig;
use crate::local_db_model::{Document, LocalDbModel};

type Records = BTreeMap<String, JsonValue>;

/// Handle to a named collection inside a [`LocalDbState`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Collection {
    name: String,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }
}

struct LmdbPersistence {
    env: Environment,
    databases: RwLock<HashMap<String, Database>>,
    path: String,
}

impl LmdbPersistence {
    fn open(config: &StoreConfig) -> Result<Self, AppResponse> {
        let path = config.lmdb_dir();
        fs::create_dir_all(&path).map_err(|e| {
            AppResponse::DatabaseError(format!("Could not create directory {path}: {e}"))
        })?;

        let env = Environment::new()
            .set_max_dbs(config.max_collections)
            .set_map_size(config.map_size)
            .open(Path::new(&path))?;

        Ok(Self {
            env,
            databases: RwLock::new(HashMap::new()),
            path,
        })
    }

    fn cached(&self, name: &str) -> Option<Database> {
        self.databases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    fn remember(&self, name: &str, db: Database) {
        self.databases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), db);
    }

    /// Opens the named database, creating it on first write.
    fn database(&self, name: &str) -> Result<Database, AppResponse> {
        if let Some(db) = self.cached(name) {
            return Ok(db);
        }
        let db = self.env.create_db(Some(name), DatabaseFlags::empty())?;
        self.remember(name, db);
        Ok(db)
    }

    fn existing_database(&self, name: &str) -> Result<Option<Database>, AppResponse> {
        if let Some(db) = self.cached(name) {
            return Ok(Some(db));
        }
        match self.env.open_db(Some(name)) {
            Ok(db) => {
                self.remember(name, db);
                Ok(Some(db))
            }
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn load(&self, name: &str) -> Result<Records, AppResponse> {
        let mut records = Records::new();
        let db = match self.existing_database(name)? {
            Some(db) => db,
            None => return Ok(records),
        };

        let txn = self.env.begin_ro_txn()?;
        {
            let mut cursor = txn.open_ro_cursor(db)?;
            for (key, value) in cursor.iter_start() {
                let id = String::from_utf8(key.to_vec()).map_err(|e| {
                    AppResponse::SerializationError(format!("Invalid UTF-8 key in {name}: {e}"))
                })?;
                let document: JsonValue = serde_json::from_slice(value)?;
                records.insert(id, document);
            }
        }
        txn.abort();

        Ok(records)
    }

    fn put(&self, name: &str, id: &str, document: &JsonValue) -> Result<(), AppResponse> {
        let db = self.database(name)?;
        let bytes = serde_json::to_vec(document)?;

        let mut txn = self.env.begin_rw_txn()?;
        txn.put(db, &id, &bytes, WriteFlags::empty())?;
        txn.commit()?;
        Ok(())
    }

    fn sync(&self) -> Result<(), AppResponse> {
        self.env.sync(true)?;
        Ok(())
    }
}

/// The local document store.
///
/// Safe to share between threads behind an `Arc`; every operation takes
/// `&self` except [`close_database`](LocalDbState::close_database).
pub struct LocalDbState {
    pub name: String,
    collections: RwLock<HashMap<String, Records>>,
    persistence: Option<LmdbPersistence>,
}

impl LocalDbState {
    /// Creates a store that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            name: "memory".to_string(),
            collections: RwLock::new(HashMap::new()),
            persistence: None,
        }
    }

    /// Opens (or creates) a persisted store as described by `config`.
    pub fn init(config: &StoreConfig) -> Result<Self, AppResponse> {
        let persistence = LmdbPersistence::open(config)?;
        info!("Opened LMDB environment at {}", persistence.path);

        Ok(Self {
            name: config.name.clone(),
            collections: RwLock::new(HashMap::new()),
            persistence: Some(persistence),
        })
    }

    pub fn is_persistent(&self) -> bool {
        self.persistence.is_some()
    }

    /// Returns the named collection, creating it empty if absent.
    ///
    /// A hydration failure is logged and the collection reads as empty; the
    /// load is retried the next time the collection is touched.
    pub fn get_collection(&self, name: &str) -> Collection {
        if let Err(e) = self.ensure_loaded(name) {
            warn!("Could not hydrate collection '{name}': {e}");
        }
        Collection {
            name: name.to_string(),
        }
    }

    /// Loads `name` from LMDB unless already in memory. Nothing is cached
    /// when the load fails.
    fn ensure_loaded(&self, name: &str) -> Result<(), AppResponse> {
        let present = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name);
        if present {
            return Ok(());
        }

        let records = match &self.persistence {
            Some(persistence) => persistence.load(name)?,
            None => Records::new(),
        };

        if !records.is_empty() {
            debug!("Hydrated {} documents into '{name}'", records.len());
        }

        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert(records);
        Ok(())
    }

    /// Inserts `document`, replacing any document with the same identity.
    ///
    /// The persisted copy is written first, so a storage failure leaves the
    /// in-memory collection untouched. The collections lock is held across
    /// both writes so memory commits in the same order as LMDB.
    ///
    /// Refuses to write into a collection that could not be hydrated.
    pub fn upsert<D: Document + ?Sized>(
        &self,
        collection: &Collection,
        document: &D,
    ) -> Result<(), AppResponse> {
        let model = LocalDbModel::from_document(document)?;
        self.ensure_loaded(collection.name())?;

        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(persistence) = &self.persistence {
            persistence.put(collection.name(), &model.id, &model.data)?;
        }

        let records = collections.entry(collection.name.clone()).or_default();
        let replaced = records.insert(model.id.clone(), model.data).is_some();

        debug!(
            "{} '{}' in '{}'",
            if replaced { "Replaced" } else { "Inserted" },
            model.id,
            collection.name()
        );
        Ok(())
    }

    fn with_records<R>(&self, collection: &Collection, f: impl FnOnce(&Records) -> R) -> R {
        if let Err(e) = self.ensure_loaded(collection.name()) {
            warn!("Could not hydrate collection '{}': {e}", collection.name());
        }
        let collections = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match collections.get(collection.name()) {
            Some(records) => f(records),
            None => f(&Records::new()),
        }
    }

    pub fn get_by_id<T: DeserializeOwned>(
        &self,
        collection: &Collection,
        id: &str,
    ) -> Result<Option<T>, AppResponse> {
        let raw = self.with_records(collection, |records| records.get(id).cloned());
        match raw {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// All documents of a collection, ordered by identity.
    pub fn get_all<T: DeserializeOwned>(&self, collection: &Collection) -> Result<Vec<T>, AppResponse> {
        let values: Vec<JsonValue> =
            self.with_records(collection, |records| records.values().cloned().collect());
        values
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(AppResponse::from))
            .collect()
    }

    pub fn get_records(&self, collection: &Collection) -> Vec<LocalDbModel> {
        self.with_records(collection, |records| {
            records
                .iter()
                .map(|(id, data)| LocalDbModel {
                    id: id.clone(),
                    data: data.clone(),
                })
                .collect()
        })
    }

    pub fn count(&self, collection: &Collection) -> usize {
        self.with_records(collection, |records| records.len())
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Flushes and detaches the LMDB environment.
    ///
    /// Documents already loaded stay readable in memory; later upserts are
    /// no longer persisted.
    pub fn close_database(&mut self) -> Result<(), AppResponse> {
        if let Some(persistence) = self.persistence.take() {
            persistence.sync()?;
            info!("Closed LMDB environment at {}", persistence.path);
        }
        Ok(())
    }
}
