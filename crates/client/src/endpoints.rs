//! Endpoint policy: which request targets take part in session recovery
//!
//! Targets are compared by path only. Query strings and fragments are
//! ignored, trailing slashes are insignificant and a missing leading slash is
//! tolerated. Absolute URLs on the configured origin have the origin and its
//! base path stripped first; absolute URLs on any other origin are always
//! protected. There is no prefix matching.

use crate::config::ClientConfig;
use crate::error::ClientError;
use std::collections::HashSet;
use url::Url;

/// How the gateway treats a failed request to a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// The session refresh call itself
    Refresh,
    /// Login, registration and identity probe; 401 is a normal answer
    Public,
    /// Everything else; 401 means the session may be stale
    Protected,
}

#[derive(Debug, Clone)]
pub struct EndpointPolicy {
    origin: Url,
    base_path: String,
    refresh: String,
    public: HashSet<String>,
}

impl EndpointPolicy {
    pub fn new<S: AsRef<str>>(
        base_url: &str,
        refresh_path: &str,
        public: &[S],
    ) -> Result<Self, ClientError> {
        let origin = Url::parse(base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url: {e}")))?;
        let base_path = canonical(origin.path());

        Ok(Self {
            origin,
            base_path,
            refresh: canonical(refresh_path),
            public: public.iter().map(|p| canonical(p.as_ref())).collect(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(
            &config.base_url,
            &config.refresh_path,
            &config.public_endpoints,
        )
    }

    /// Classify a request target (relative path or absolute URL)
    pub fn classify(&self, target: &str) -> EndpointKind {
        let Some(path) = self.relative_path(target) else {
            return EndpointKind::Protected;
        };

        if path == self.refresh {
            EndpointKind::Refresh
        } else if self.public.contains(&path) {
            EndpointKind::Public
        } else {
            EndpointKind::Protected
        }
    }

    pub fn is_public(&self, target: &str) -> bool {
        self.classify(target) == EndpointKind::Public
    }

    /// Canonical path of `target` relative to the API base, or `None` when
    /// `target` points at a different origin
    fn relative_path(&self, target: &str) -> Option<String> {
        let Ok(url) = Url::parse(target) else {
            return Some(canonical(target));
        };

        if url.origin() != self.origin.origin() {
            return None;
        }

        let path = canonical(url.path());
        match path.strip_prefix(&self.base_path) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => Some(canonical(rest)),
            _ if self.base_path.is_empty() => Some(path),
            _ => None,
        }
    }
}

/// Strip query/fragment, force a leading slash, drop trailing slashes
fn canonical(target: &str) -> String {
    let path = target
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');

    if path.is_empty() {
        String::new()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
