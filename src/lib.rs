//! # Theme Store Core
//!
//! Offline-first data core for a theme marketplace. Profiles and themes
//! fetched from the remote API are normalized into local document
//! collections backed by LMDB (Lightning Memory-Mapped Database), so the UI
//! can render cached data without a network round trip.
//!
//! ## Features
//!
//! - **Document collections**: identity-keyed JSON documents with upsert semantics
//! - **LMDB persistence**: optional write-through storage, hydrated lazily
//! - **Profile normalization**: embedded themes split into their own collection
//! - **Account mutations**: password, e-mail, username and bio changes with notifications
//! - **FFI surface**: C-compatible functions for native UI shells
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use themestore_core::{LocalDbState, StoreConfig, UiState, FullUserSync};
//! # use themestore_core::remote::UserQueries;
//! # async fn run(queries: impl UserQueries) -> Result<(), themestore_core::AppResponse> {
//!
//! let store = Arc::new(LocalDbState::init(&StoreConfig::named("my_store"))?);
//! let ui = UiState::new();
//!
//! let action = FullUserSync::new(store, queries);
//! if let Some(user) = action.sync_full_user(&ui, "user_1").await {
//!     println!("{} themes cached", user.themes.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## FFI Functions
//!
//! - [`create_db`] - Open or create a persisted store
//! - [`upsert_data`] - Insert or replace a document in a collection
//! - [`get_by_id`] - Retrieve a document by identity
//! - [`get_all`] - Retrieve every document of a collection
//! - [`close_database`] - Flush and detach persistence
//! - [`free_response`] - Release a string returned by any of the above

pub mod account;
pub mod action_state;
pub mod app_response;
pub mod config;
pub mod full_user_sync;
pub mod local_db_model;
pub mod local_db_state;
pub mod remote;
pub mod user_model;

pub use crate::action_state::{ActionSignal, StateSink, UiState};
pub use crate::app_response::AppResponse;
pub use crate::config::{AccountConfig, StoreConfig};
pub use crate::full_user_sync::{normalize_full_user, FullUserSync, NormalizedProfile};
pub use crate::local_db_state::{Collection, LocalDbState};

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use log::{info, warn};
use serde_json::Value as JsonValue;

/// Opens (or creates) a persisted store named `name`.
///
/// The LMDB environment lives in the directory `<name>.lmdb`.
///
/// # Returns
///
/// A pointer to the [`LocalDbState`], or null on failure.
/// The caller is responsible for managing the returned pointer's lifetime.
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use themestore_core::create_db;
///
/// let name = CString::new("theme_cache").unwrap();
/// let state = create_db(name.as_ptr());
/// assert!(!state.is_null());
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_db(name: *const c_char) -> *mut LocalDbState {
    if name.is_null() {
        warn!("Null name pointer passed to create_db");
        return std::ptr::null_mut();
    }

    let name_str = match unsafe { CStr::from_ptr(name).to_str() } {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid UTF-8 in name parameter: {e}");
            return std::ptr::null_mut();
        }
    };

    let config = StoreConfig::named(name_str);
    info!("Attempting to open store at: {}", config.lmdb_dir());

    match LocalDbState::init(&config) {
        Ok(state) => Box::into_raw(Box::new(state)),
        Err(e) => {
            warn!("Failed to initialize store: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Inserts or replaces a document in `collection`.
///
/// The JSON must be an object carrying a non-empty `_id`.
///
/// ```no_run
/// use std::ffi::CString;
/// use themestore_core::{create_db, upsert_data};
///
/// let name = CString::new("theme_cache").unwrap();
/// let state = create_db(name.as_ptr());
/// let collection = CString::new("themes").unwrap();
/// let json = CString::new(r#"{"_id":"t1","title":"Midnight"}"#).unwrap();
/// let result = upsert_data(state, collection.as_ptr(), json.as_ptr());
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn upsert_data(
    state: *mut LocalDbState,
    collection: *const c_char,
    json_ptr: *const c_char,
) -> *const c_char {
    let state = match unsafe { state.as_ref() } {
        Some(s) => s,
        None => {
            let error = AppResponse::BadRequest("Null state pointer".to_string());
            return response_to_c_string(&error);
        }
    };

    let collection_name = match c_ptr_to_string(collection, "collection") {
        Ok(name) => name,
        Err(err) => return err,
    };

    let json_str = match c_ptr_to_string(json_ptr, "JSON") {
        Ok(json) => json,
        Err(err) => return err,
    };

    let document: JsonValue = match serde_json::from_str(&json_str) {
        Ok(d) => d,
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Invalid JSON: {e}"));
            return response_to_c_string(&error);
        }
    };

    let collection = state.get_collection(&collection_name);
    match state.upsert(&collection, &document) {
        Ok(()) => response_to_c_string(&AppResponse::Ok(json_str)),
        Err(e) => response_to_c_string(&e),
    }
}

/// Retrieves a document from `collection` by identity.
///
/// Returns `Ok` with the document JSON, or `NotFound`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_by_id(
    state: *mut LocalDbState,
    collection: *const c_char,
    id: *const c_char,
) -> *const c_char {
    if state.is_null() {
        let error = AppResponse::BadRequest("Null state pointer passed to get_by_id".to_string());
        return response_to_c_string(&error);
    }

    let state = unsafe { &*state };

    let collection_name = match c_ptr_to_string(collection, "collection") {
        Ok(name) => name,
        Err(err) => return err,
    };

    let id_str = match c_ptr_to_string(id, "id") {
        Ok(id) => id,
        Err(err) => return err,
    };

    let collection = state.get_collection(&collection_name);
    match state.get_by_id::<JsonValue>(&collection, &id_str) {
        Ok(Some(document)) => match serde_json::to_string(&document) {
            Ok(json) => response_to_c_string(&AppResponse::Ok(json)),
            Err(e) => response_to_c_string(&AppResponse::from(e)),
        },
        Ok(None) => {
            let error = AppResponse::NotFound(format!(
                "No document with id {id_str} in {collection_name}"
            ));
            response_to_c_string(&error)
        }
        Err(e) => response_to_c_string(&e),
    }
}

/// Retrieves every document of `collection` as a JSON array of
/// `{id, data}` records, ordered by identity.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_all(state: *mut LocalDbState, collection: *const c_char) -> *const c_char {
    if state.is_null() {
        let error = AppResponse::BadRequest("Null state pointer passed to get_all".to_string());
        return response_to_c_string(&error);
    }

    let state = unsafe { &*state };

    let collection_name = match c_ptr_to_string(collection, "collection") {
        Ok(name) => name,
        Err(err) => return err,
    };

    let collection = state.get_collection(&collection_name);
    match serde_json::to_string(&state.get_records(&collection)) {
        Ok(json) => response_to_c_string(&AppResponse::Ok(json)),
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Error serializing records: {e:?}"));
            response_to_c_string(&error)
        }
    }
}

/// Flushes the LMDB environment and stops persisting further writes.
///
/// Useful before hot restarts, where the host reopens the same store.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_database(state: *mut LocalDbState) -> *const c_char {
    if state.is_null() {
        let error = AppResponse::BadRequest("Null state pointer passed to close_database".to_string());
        return response_to_c_string(&error);
    }

    let state = unsafe { &mut *state };

    match state.close_database() {
        Ok(()) => {
            let success = AppResponse::Ok("Database connection closed successfully".to_string());
            response_to_c_string(&success)
        }
        Err(e) => response_to_c_string(&e),
    }
}

/// Releases a string previously returned by this library.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(ptr: *const c_char) {
    if ptr.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(ptr as *mut c_char) });
}

fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

/// Converts a C string pointer into an owned `String`, or an error response
/// already encoded for the caller.
fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, *const c_char> {
    if ptr.is_null() {
        let error = AppResponse::BadRequest(format!("Null {field_name} pointer"));
        return Err(response_to_c_string(&error));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            let error = AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}"));
            Err(response_to_c_string(&error))
        }
    }
}
