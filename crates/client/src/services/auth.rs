//! Authentication API service

use crate::error::ClientError;
use crate::gateway::Gateway;
use crate::transport::ApiRequest;
use crate::types::{Credentials, MessageResponse, RegisteredUser, Registration, UserProfile};
use tracing::{info, warn};

/// Login, logout, registration and identity probe
#[derive(Clone)]
pub struct AuthService {
    gateway: Gateway,
}

impl AuthService {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Establish a session; the server answers with cookies
    pub async fn login(&self, credentials: &Credentials) -> Result<MessageResponse, ClientError> {
        let request = ApiRequest::post("/token/").json(credentials)?;
        let response = self.gateway.send_json(&request).await?;
        info!(username = %credentials.username, "Logged in");
        Ok(response)
    }

    /// Invalidate the session on the server. The local session is discarded
    /// even when the server call fails.
    pub async fn logout(&self) -> Result<MessageResponse, ClientError> {
        let result = self
            .gateway
            .send_json(&ApiRequest::post("/logout/"))
            .await;
        self.gateway.session().clear();

        if let Err(e) = &result {
            warn!("Server-side logout failed: {e}");
        }
        result
    }

    pub async fn register(&self, registration: &Registration) -> Result<RegisteredUser, ClientError> {
        let request = ApiRequest::post("/register/").json(registration)?;
        self.gateway.send_json(&request).await
    }

    /// Current user, or `None` when there is no valid session
    pub async fn current_user(&self) -> Result<Option<UserProfile>, ClientError> {
        match self.gateway.send_json(&ApiRequest::get("/me/")).await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_auth_failure() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Renew the session explicitly
    pub async fn refresh(&self) -> Result<(), ClientError> {
        self.gateway.refresh_session().await
    }
}
