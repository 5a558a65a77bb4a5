//! UI-facing signals emitted by store actions.

use std::sync::{Mutex, PoisonError};

use log::debug;

use crate::app_response::AppResponse;

/// A state change an action reports while it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionSignal {
    Loading(bool),
    ActionError(Option<AppResponse>),
}

/// Receiver of [`ActionSignal`]s, owned by the caller.
pub trait StateSink: Send + Sync {
    fn commit(&self, signal: ActionSignal);
}

/// Snapshot of the UI state driven by actions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiSnapshot {
    pub loading: bool,
    pub action_error: Option<AppResponse>,
}

/// Default sink: keeps the latest `loading` flag and pending error.
///
/// Concurrent actions overwrite each other; the last commit wins.
#[derive(Debug, Default)]
pub struct UiState {
    inner: Mutex<UiSnapshot>,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> UiSnapshot {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot().loading
    }

    pub fn action_error(&self) -> Option<AppResponse> {
        self.snapshot().action_error
    }
}

impl StateSink for UiState {
    fn commit(&self, signal: ActionSignal) {
        debug!("commit {signal:?}");
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match signal {
            ActionSignal::Loading(loading) => state.loading = loading,
            ActionSignal::ActionError(error) => state.action_error = error,
        }
    }
}
