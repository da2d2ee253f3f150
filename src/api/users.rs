use std::sync::Arc;

use super::ControlPlane;
use crate::cache::CacheKey;
use crate::error::ApiResult;
use crate::gateway::ApiRequest;
use crate::invalidation::Mutation;
use crate::models::{UpdatePasswordRequest, UpdateUserRequest, User};

impl ControlPlane {
    /// The signed-in user's profile.
    pub async fn current_user(&self) -> ApiResult<Arc<User>> {
        self.query(CacheKey::current_user(), ApiRequest::get("/users/me"))
            .await
    }

    pub async fn update_profile(&self, update: &UpdateUserRequest) -> ApiResult<User> {
        let request = ApiRequest::put("/users/me").json(update)?;
        self.mutate(request, Mutation::UpdateProfile).await
    }

    /// Change the password. Nothing cached depends on it.
    pub async fn update_password(&self, update: &UpdatePasswordRequest) -> ApiResult<()> {
        let request = ApiRequest::put("/users/me/password").json(update)?;
        self.mutate_empty(request, Mutation::UpdatePassword).await
    }
}
