//! Remote query interface consumed by the sync action.

use std::sync::Arc;

use async_trait::async_trait;

use crate::app_response::AppResponse;
use crate::user_model::FullUserResponse;

/// Source of full user profiles.
///
/// Implementations may cache responses and hand out the same `Arc` to every
/// caller, so consumers must never mutate what they receive. Transport
/// failures are reported as [`AppResponse::RemoteError`].
#[async_trait]
pub trait UserQueries: Send + Sync {
    async fn get_full_user(&self, id: &str) -> Result<Arc<FullUserResponse>, AppResponse>;
}

#[async_trait]
impl<Q: UserQueries + ?Sized> UserQueries for Arc<Q> {
    async fn get_full_user(&self, id: &str) -> Result<Arc<FullUserResponse>, AppResponse> {
        (**self).get_full_user(id).await
    }
}
