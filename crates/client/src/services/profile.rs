//! User profile API service

use crate::error::ClientError;
use crate::gateway::Gateway;
use crate::transport::ApiRequest;
use crate::types::{ProfileDetailsUpdate, ProfileUpdate, ThemePreference, UserProfile};

#[derive(Clone)]
pub struct ProfileService {
    gateway: Gateway,
}

impl ProfileService {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub async fn get(&self) -> Result<UserProfile, ClientError> {
        self.gateway
            .send_json(&ApiRequest::get("/user/profile/"))
            .await
    }

    /// Partial update; unset fields are left alone by the server
    pub async fn update(&self, update: &ProfileUpdate) -> Result<UserProfile, ClientError> {
        let request = ApiRequest::patch("/user/profile/").json(update)?;
        self.gateway.send_json(&request).await
    }

    pub async fn set_mode_preference(
        &self,
        preference: ThemePreference,
    ) -> Result<UserProfile, ClientError> {
        self.update(&ProfileUpdate {
            profile: Some(ProfileDetailsUpdate {
                mode_preference: Some(preference),
                ..ProfileDetailsUpdate::default()
            }),
            ..ProfileUpdate::default()
        })
        .await
    }
}
