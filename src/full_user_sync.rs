//! Fetches a full user profile and normalizes it into the local store.
//!
//! Embedded themes are split out into the `themes` collection, each pointing
//! back at its owner, and the user is stored in `users` with theme
//! references only:
//!
//! ```text
//! {_id: u1, themes: [{_id: t1, title}]}
//!     -> users:  {_id: u1, themes: [{_id: t1}]}
//!     -> themes: {_id: t1, title, user: {_id: u1}}
//! ```

use std::sync::Arc;

use log::{debug, warn};

use crate::action_state::{ActionSignal, StateSink};
use crate::app_response::AppResponse;
use crate::local_db_state::LocalDbState;
use crate::remote::UserQueries;
use crate::user_model::{
    FullUser, NormalizedUser, OwnedTheme, User, THEMES_COLLECTION, USERS_COLLECTION,
};

/// Result of splitting a [`FullUser`] into flat documents.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedProfile {
    pub user: NormalizedUser,
    pub themes: Vec<OwnedTheme>,
}

/// Splits embedded themes out of `user`.
///
/// Themes without identity, and null entries, are dropped from both the
/// theme list and the user's references. Order is preserved.
pub fn normalize_full_user(user: FullUser) -> NormalizedProfile {
    let User {
        id,
        themes: embedded,
        profile,
    } = user;

    let themes: Vec<OwnedTheme> = embedded
        .iter()
        .flatten()
        .filter_map(|theme| OwnedTheme::from_embedded(theme, &id))
        .collect();

    let skipped = embedded.len() - themes.len();
    if skipped > 0 {
        debug!("Skipped {skipped} themes without identity for user {id}");
    }

    let references = themes.iter().map(OwnedTheme::to_ref).collect();

    NormalizedProfile {
        user: User {
            id,
            themes: references,
            profile,
        },
        themes,
    }
}

/// The "get full user" store action.
pub struct FullUserSync<Q> {
    store: Arc<LocalDbState>,
    queries: Q,
}

impl<Q: UserQueries> FullUserSync<Q> {
    pub fn new(store: Arc<LocalDbState>, queries: Q) -> Self {
        Self { store, queries }
    }

    pub fn store(&self) -> &Arc<LocalDbState> {
        &self.store
    }

    /// Fetches, normalizes and stores the user, returning the normalized
    /// view. Any fetch or write failure aborts the remaining steps.
    pub async fn fetch_normalized(&self, user_id: &str) -> Result<NormalizedUser, AppResponse> {
        let themes = self.store.get_collection(THEMES_COLLECTION);
        let users = self.store.get_collection(USERS_COLLECTION);

        let response = self.queries.get_full_user(user_id).await?;
        // The response may be shared with a query cache.
        let user = response.data.user.clone();

        let profile = normalize_full_user(user);
        for theme in &profile.themes {
            self.store.upsert(&themes, theme)?;
        }
        self.store.upsert(&users, &profile.user)?;

        debug!(
            "Synced user {} with {} themes",
            profile.user.id,
            profile.themes.len()
        );
        Ok(profile.user)
    }

    /// Runs [`fetch_normalized`](Self::fetch_normalized), reporting progress
    /// to `sink`.
    ///
    /// `Loading(false)` is committed on every path. On failure the error is
    /// committed as `ActionError` and `None` is returned; on success the
    /// pending error is cleared.
    pub async fn sync_full_user<S: StateSink + ?Sized>(
        &self,
        sink: &S,
        user_id: &str,
    ) -> Option<NormalizedUser> {
        sink.commit(ActionSignal::Loading(true));

        match self.fetch_normalized(user_id).await {
            Ok(user) => {
                sink.commit(ActionSignal::Loading(false));
                sink.commit(ActionSignal::ActionError(None));
                Some(user)
            }
            Err(e) => {
                warn!("Failed to sync full user {user_id}: {e}");
                sink.commit(ActionSignal::Loading(false));
                sink.commit(ActionSignal::ActionError(Some(e)));
                None
            }
        }
    }
}
