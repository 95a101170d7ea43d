//! Client for the notes REST API
//!
//! The session lives in HTTP-only cookies held by a [`SessionStore`]. Every
//! call goes through the [`Gateway`], which refreshes a stale session once,
//! replays the blocked requests and forces a logout when recovery fails.

pub mod config;
pub mod endpoints;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod services;
pub mod session;
pub mod transport;
pub mod types;

pub use config::ClientConfig;
pub use endpoints::{EndpointKind, EndpointPolicy};
pub use error::{ClientError, ErrorPayload};
pub use filter::{NoteFilter, TagOption, available_tags, tag_slug};
pub use gateway::{Gateway, GatewayBuilder, LogoutEvent, LogoutHandler, LogoutReason};
pub use services::{AuthService, NotesService, ProfileService};
pub use session::SessionStore;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

/// The gateway plus the typed services built on it
#[derive(Clone)]
pub struct NotesClient {
    gateway: Gateway,
    pub auth: AuthService,
    pub notes: NotesService,
    pub profile: ProfileService,
}

impl NotesClient {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            auth: AuthService::new(gateway.clone()),
            notes: NotesService::new(gateway.clone()),
            profile: ProfileService::new(gateway.clone()),
            gateway,
        }
    }

    /// Client over reqwest with an in-memory session
    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        Ok(Self::new(Gateway::new(config)?))
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }
}
