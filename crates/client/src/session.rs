//! Cookie-backed session store
//!
//! The server keeps the session in HTTP-only cookies. The client never reads
//! them; it only stores what `Set-Cookie` hands out and replays it on
//! requests to the API host. Clearing the store is how local auth state is
//! discarded.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cookie::Cookie;
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredCookie {
    name: String,
    value: String,
    /// Host that set the cookie, or its `Domain` attribute
    domain: String,
    host_only: bool,
    path: String,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredCookie {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }

    fn same_slot(&self, name: &str, domain: &str, path: &str) -> bool {
        self.name == name && self.domain == domain && self.path == path
    }

    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host_matches = if self.host_only {
            host.eq_ignore_ascii_case(&self.domain)
        } else {
            domain_matches(host, &self.domain)
        };
        host_matches && path_matches(url.path(), &self.path)
    }
}

type Jar = Vec<StoredCookie>;

/// Cookie jar shared between the HTTP transport and the gateway
#[derive(Debug, Default)]
pub struct SessionStore {
    host: Option<String>,
    path: Option<PathBuf>,
    cookies: Mutex<Jar>,
}

enum CookieUpdate {
    Set(StoredCookie),
    Remove {
        name: String,
        domain: String,
        path: String,
    },
}

impl SessionStore {
    /// A store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A store persisted as JSON at `path`, loading any session already there
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let cookies = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Jar::new(),
            Err(e) => return Err(e),
        };

        Ok(Self {
            host: None,
            path: Some(path),
            cookies: Mutex::new(cookies),
        })
    }

    /// Only send cookies to `host`
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Only send cookies to the host of `base_url`; an unparsable URL leaves
    /// the store unscoped
    pub fn scoped_to(self, base_url: &str) -> Self {
        match Url::parse(base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
        {
            Some(host) => self.with_host(host),
            None => self,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether any unexpired session cookie is held
    pub fn has_session(&self) -> bool {
        let now = Utc::now();
        self.lock().iter().any(|cookie| cookie.is_live(now))
    }

    /// Names of the cookies currently held (values are never exposed)
    pub fn cookie_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().iter().map(|c| c.name.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    /// Discard every cookie
    pub fn clear(&self) {
        let mut jar = self.lock();
        if jar.is_empty() {
            return;
        }
        jar.clear();
        self.persist(&jar);
        debug!("Session cookies cleared");
    }

    fn lock(&self) -> MutexGuard<'_, Jar> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.cookies.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, jar: &Jar) {
        let Some(path) = &self.path else {
            return;
        };

        let result = serde_json::to_vec_pretty(jar)
            .map_err(io::Error::from)
            .and_then(|bytes| {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, bytes)
            });

        if let Err(e) = result {
            warn!("Failed to persist session to {}: {e}", path.display());
        }
    }

    fn accepts(&self, url: &Url) -> bool {
        match &self.host {
            Some(host) => url.host_str() == Some(host.as_str()),
            None => true,
        }
    }
}

impl CookieStore for SessionStore {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        if !self.accepts(url) {
            return;
        }

        let now = Utc::now();
        let mut jar = self.lock();
        let mut changed = false;

        for header in cookie_headers {
            let Some(update) = header
                .to_str()
                .ok()
                .and_then(|h| parse_set_cookie(h, url, now))
            else {
                continue;
            };
            match update {
                CookieUpdate::Set(cookie) => {
                    debug!(cookie = %cookie.name, path = %cookie.path, "Session cookie stored");
                    let slot = jar
                        .iter()
                        .position(|c| c.same_slot(&cookie.name, &cookie.domain, &cookie.path));
                    match slot {
                        Some(index) if jar[index] == cookie => {}
                        Some(index) => {
                            jar[index] = cookie;
                            changed = true;
                        }
                        None => {
                            jar.push(cookie);
                            changed = true;
                        }
                    }
                }
                CookieUpdate::Remove { name, domain, path } => {
                    debug!(cookie = %name, "Session cookie removed");
                    let before = jar.len();
                    jar.retain(|c| !c.same_slot(&name, &domain, &path));
                    changed |= jar.len() != before;
                }
            }
        }

        if changed {
            self.persist(&jar);
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        if !self.accepts(url) {
            return None;
        }

        let now = Utc::now();
        let jar = self.lock();
        let mut matching: Vec<&StoredCookie> = jar
            .iter()
            .filter(|cookie| cookie.is_live(now) && cookie.matches(url))
            .collect();
        // Longer paths first.
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()));

        let header = matching
            .iter()
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            None
        } else {
            HeaderValue::from_str(&header).ok()
        }
    }
}

/// Parse one `Set-Cookie` header received from `url`. An empty value, a
/// non-positive `Max-Age` or an `Expires` in the past means removal. A
/// `Domain` the host does not belong to rejects the cookie.
fn parse_set_cookie(header: &str, url: &Url, now: DateTime<Utc>) -> Option<CookieUpdate> {
    let cookie = Cookie::parse(header).ok()?;
    let name = cookie.name().trim();
    if name.is_empty() {
        return None;
    }
    let value = cookie.value().trim_matches('"');

    let host = url.host_str()?;
    let (domain, host_only) = match cookie.domain() {
        Some(domain) => {
            let domain = domain.trim_start_matches('.').to_ascii_lowercase();
            if !domain_matches(host, &domain) {
                return None;
            }
            (domain, false)
        }
        None => (host.to_ascii_lowercase(), true),
    };

    let path = cookie
        .path()
        .filter(|path| path.starts_with('/'))
        .map_or_else(|| default_path(url), str::to_string);

    // Max-Age wins over Expires.
    let expires_at = match (cookie.max_age(), cookie.expires_datetime()) {
        (Some(age), _) => Some(
            ChronoDuration::try_seconds(age.whole_seconds())
                .and_then(|age| now.checked_add_signed(age))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        ),
        (None, Some(at)) => Some(
            DateTime::<Utc>::from_timestamp(at.unix_timestamp(), 0)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        ),
        (None, None) => None,
    };

    if value.is_empty() || expires_at.is_some_and(|at| at <= now) {
        return Some(CookieUpdate::Remove {
            name: name.to_string(),
            domain,
            path,
        });
    }

    Some(CookieUpdate::Set(StoredCookie {
        name: name.to_string(),
        value: value.to_string(),
        domain,
        host_only,
        path,
        expires_at,
    }))
}

fn domain_matches(host: &str, domain: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    request_path == cookie_path
        || request_path.strip_prefix(cookie_path).is_some_and(|rest| {
            cookie_path.ends_with('/') || rest.starts_with('/')
        })
}

/// Directory of the request path, used when `Path` is absent
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(end) => path[..end].to_string(),
    }
}
