//! Authenticated request gateway
//!
//! Every API call goes through [`Gateway::send`]. Session cookies ride along
//! automatically. When a protected request comes back 401 the gateway joins
//! (or starts) the one in-flight session refresh, then replays the request
//! once. When recovery is impossible it discards the local session and tells
//! every registered [`LogoutHandler`].
//!
//! The in-flight refresh is a single [`Shared`] future. Callers that hit a 401
//! while it is pending await a clone of it instead of starting their own, so
//! there is never more than one refresh call on the wire. The future clears
//! its own slot when it settles, before any waiter sees the outcome.

use crate::config::ClientConfig;
use crate::endpoints::{EndpointKind, EndpointPolicy};
use crate::error::ClientError;
use crate::session::SessionStore;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

type RefreshOutcome = Result<(), ClientError>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Why the gateway gave up on the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The refresh call failed or timed out
    RefreshFailed,
    /// Login, registration or identity probe answered 401
    PublicEndpointRejected,
    /// A request still failed authorization after a successful refresh
    ReplayRejected,
    /// A caller hit the refresh endpoint directly and it refused
    RefreshEndpointRejected,
}

/// Out-of-band signal that the user has to log in again
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutEvent {
    pub reason: LogoutReason,
    /// Path of the request that triggered the logout
    pub path: String,
    /// Login entry point the front end should navigate to
    pub redirect_to: String,
}

/// Receives forced-logout notifications
pub trait LogoutHandler: Send + Sync {
    fn on_logout(&self, event: &LogoutEvent);
}

impl<F> LogoutHandler for F
where
    F: Fn(&LogoutEvent) + Send + Sync,
{
    fn on_logout(&self, event: &LogoutEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    PassThrough,
    Logout(LogoutReason),
    Refresh,
}

struct GatewayInner {
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
    policy: EndpointPolicy,
    refresh_path: String,
    login_path: String,
    refresh_timeout: Option<Duration>,
    active_refresh: Mutex<Option<SharedRefresh>>,
    logout_handlers: RwLock<Vec<Arc<dyn LogoutHandler>>>,
}

/// Shared handle to the request gateway; clones share one session and one
/// refresh slot
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl Gateway {
    /// Gateway over reqwest with an in-memory session
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> GatewayBuilder {
        GatewayBuilder {
            config,
            session: None,
            transport: None,
            handlers: Vec::new(),
        }
    }

    /// Register a forced-logout handler
    pub fn on_logout(&self, handler: impl LogoutHandler + 'static) {
        self.inner
            .logout_handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(handler));
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.inner.session
    }

    pub fn policy(&self) -> &EndpointPolicy {
        &self.inner.policy
    }

    /// Whether a session refresh is currently on the wire
    pub fn is_refreshing(&self) -> bool {
        self.inner.lock_refresh().is_some()
    }

    /// Send a request, recovering from a stale session when possible
    ///
    /// # Errors
    ///
    /// Non-auth failures are returned untouched. Auth failures that cannot be
    /// recovered are returned after the session has been discarded. If the
    /// refresh fails its error is returned instead of the original 401.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        let error = match self.inner.transport.execute(request).await {
            Ok(response) => return Ok(response),
            Err(error) => error,
        };

        match self.inner.disposition(request, &error, false) {
            Disposition::PassThrough => Err(error),
            Disposition::Logout(reason) => {
                self.inner.force_logout(reason, &request.path);
                Err(error)
            }
            Disposition::Refresh => {
                debug!(method = %request.method, path = %request.path, "Stale session, waiting for refresh");
                self.refresh_session().await?;
                self.replay(request).await
            }
        }
    }

    /// `send` and decode the JSON body
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<T, ClientError> {
        self.send(request).await?.json()
    }

    /// Join the in-flight refresh, or start one
    pub async fn refresh_session(&self) -> Result<(), ClientError> {
        let refresh = {
            let mut slot = self.inner.lock_refresh();
            match slot.as_ref() {
                Some(active) => {
                    debug!("Joining in-flight session refresh");
                    active.clone()
                }
                None => {
                    let inner = Arc::downgrade(&self.inner);
                    let refresh = run_refresh(inner).boxed().shared();
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }

    /// Discard the local session and notify logout handlers
    pub fn force_logout(&self, reason: LogoutReason, path: &str) {
        self.inner.force_logout(reason, path);
    }

    async fn replay(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        debug!(method = %request.method, path = %request.path, "Replaying request");
        match self.inner.transport.execute(request).await {
            Ok(response) => Ok(response),
            Err(error) => {
                if let Disposition::Logout(reason) = self.inner.disposition(request, &error, true) {
                    self.inner.force_logout(reason, &request.path);
                }
                Err(error)
            }
        }
    }
}

/// Runs as the shared refresh future. Only a `Weak` is held while the call is
/// in flight, since the gateway's refresh slot owns this future.
async fn run_refresh(gateway: Weak<GatewayInner>) -> RefreshOutcome {
    let (transport, request, limit) = {
        let Some(inner) = gateway.upgrade() else {
            return Err(gateway_dropped());
        };
        let request = ApiRequest {
            body: Some(serde_json::json!({})),
            ..ApiRequest::post(inner.refresh_path.clone())
        };
        (Arc::clone(&inner.transport), request, inner.refresh_timeout)
    };

    info!("Refreshing session");
    let call = transport.execute(&request);
    let result = match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(ClientError::RefreshTimedOut(limit))),
        None => call.await,
    };

    let Some(inner) = gateway.upgrade() else {
        return Err(gateway_dropped());
    };
    inner.lock_refresh().take();

    match result {
        Ok(_) => {
            info!("Session refreshed");
            Ok(())
        }
        Err(error) => {
            warn!("Session refresh failed: {error}");
            inner.force_logout(LogoutReason::RefreshFailed, &inner.refresh_path);
            Err(error)
        }
    }
}

fn gateway_dropped() -> ClientError {
    ClientError::Configuration("gateway dropped during refresh".into())
}

impl GatewayInner {
    fn lock_refresh(&self) -> MutexGuard<'_, Option<SharedRefresh>> {
        self.active_refresh
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn disposition(&self, request: &ApiRequest, error: &ClientError, replayed: bool) -> Disposition {
        if !error.is_auth_failure() {
            return Disposition::PassThrough;
        }

        match self.policy.classify(&request.path) {
            EndpointKind::Refresh => Disposition::Logout(LogoutReason::RefreshEndpointRejected),
            _ if replayed => Disposition::Logout(LogoutReason::ReplayRejected),
            EndpointKind::Public if error.is_unauthorized() => {
                Disposition::Logout(LogoutReason::PublicEndpointRejected)
            }
            EndpointKind::Protected if error.is_unauthorized() => Disposition::Refresh,
            _ => Disposition::PassThrough,
        }
    }

    fn force_logout(&self, reason: LogoutReason, path: &str) {
        warn!(?reason, %path, "Forcing logout");
        self.session.clear();

        let event = LogoutEvent {
            reason,
            path: path.to_string(),
            redirect_to: self.login_path.clone(),
        };
        let handlers = self
            .logout_handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for handler in handlers {
            handler.on_logout(&event);
        }
    }
}

/// Builder for [`Gateway`]
pub struct GatewayBuilder {
    config: ClientConfig,
    session: Option<Arc<SessionStore>>,
    transport: Option<Arc<dyn Transport>>,
    handlers: Vec<Arc<dyn LogoutHandler>>,
}

impl GatewayBuilder {
    /// Use an existing session store (e.g. a persistent one)
    pub fn session(mut self, session: Arc<SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    /// Replace the reqwest transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn on_logout(mut self, handler: impl LogoutHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<Gateway, ClientError> {
        let config = self.config;
        config.validate()?;
        let policy = EndpointPolicy::from_config(&config)?;

        let session = match self.session {
            Some(session) => session,
            None => Arc::new(SessionStore::in_memory().scoped_to(&config.base_url)),
        };

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&config, Arc::clone(&session))?),
        };

        Ok(Gateway {
            inner: Arc::new(GatewayInner {
                transport,
                session,
                policy,
                refresh_timeout: config.refresh_timeout(),
                refresh_path: config.refresh_path,
                login_path: config.login_path,
                active_refresh: Mutex::new(None),
                logout_handlers: RwLock::new(self.handlers),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorPayload;
    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// In-memory backend: protected paths answer 401 until a refresh succeeds
    #[derive(Default)]
    struct FakeBackend {
        session_valid: AtomicBool,
        refresh_ok: AtomicBool,
        refresh_forbidden: AtomicBool,
        login_forbidden: AtomicBool,
        hold_refresh: AtomicBool,
        release_refresh: Notify,
        events: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn record(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn count(&self, event: &str) -> usize {
            self.events().iter().filter(|e| *e == event).count()
        }

        fn position(&self, event: &str) -> Option<usize> {
            self.events().iter().position(|e| e == event)
        }

        fn rposition(&self, event: &str) -> Option<usize> {
            self.events().iter().rposition(|e| e == event)
        }
    }

    fn ok(body: serde_json::Value) -> Result<ApiResponse, ClientError> {
        Ok(ApiResponse {
            status: StatusCode::OK,
            body: Bytes::from(body.to_string()),
        })
    }

    fn fail(status: StatusCode, detail: &str) -> Result<ApiResponse, ClientError> {
        let body = serde_json::json!({ "detail": detail }).to_string();
        Err(ClientError::from_status(
            status,
            ErrorPayload::from_body(body.as_bytes()),
        ))
    }

    #[async_trait]
    impl Transport for FakeBackend {
        async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
            let call = format!("{} {}", request.method, request.path);
            self.record(call.clone());

            match request.path.as_str() {
                "/token/refresh/" => {
                    if self.hold_refresh.load(Ordering::SeqCst) {
                        self.release_refresh.notified().await;
                    }
                    self.record("refresh settled".to_string());
                    if self.refresh_forbidden.load(Ordering::SeqCst) {
                        fail(StatusCode::FORBIDDEN, "Refresh token blacklisted.")
                    } else if self.refresh_ok.load(Ordering::SeqCst) {
                        self.session_valid.store(true, Ordering::SeqCst);
                        ok(serde_json::json!({"detail": "Tokens refreshed successfully."}))
                    } else {
                        fail(StatusCode::UNAUTHORIZED, "Refresh token cookie not found.")
                    }
                }
                "/token/" if self.login_forbidden.load(Ordering::SeqCst) => {
                    fail(StatusCode::FORBIDDEN, "CSRF Failed")
                }
                "/token/" => fail(StatusCode::UNAUTHORIZED, "No active account"),
                "/locked/" if self.session_valid.load(Ordering::SeqCst) => {
                    fail(StatusCode::FORBIDDEN, "Account disabled.")
                }
                "/explode/" => fail(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
                "/admin/" => fail(StatusCode::FORBIDDEN, "nope"),
                "/stubborn/" => fail(StatusCode::UNAUTHORIZED, "still no"),
                path if self.session_valid.load(Ordering::SeqCst) => {
                    ok(serde_json::json!({ "path": path }))
                }
                _ => fail(StatusCode::UNAUTHORIZED, "Access token has expired."),
            }
        }
    }

    fn gateway(backend: &Arc<FakeBackend>, config: ClientConfig) -> (Gateway, Arc<AtomicUsize>) {
        let logouts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&logouts);
        let gateway = Gateway::builder(config)
            .transport(Arc::clone(backend) as Arc<dyn Transport>)
            .on_logout(move |event: &LogoutEvent| {
                assert_eq!(event.redirect_to, "/");
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();
        (gateway, logouts)
    }

    fn backend(refresh_ok: bool) -> Arc<FakeBackend> {
        let backend = FakeBackend::default();
        backend.refresh_ok.store(refresh_ok, Ordering::SeqCst);
        Arc::new(backend)
    }

    /// Yield until `condition` holds; the current-thread runtime runs every
    /// spawned task to its next await point in between.
    async fn settle(condition: impl Fn() -> bool) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition never held");
    }

    #[tokio::test]
    async fn test_stale_session_is_refreshed_and_replayed_once() {
        let backend = backend(true);
        let (gateway, logouts) = gateway(&backend, ClientConfig::default());

        let body: serde_json::Value = gateway
            .send_json(&ApiRequest::get("/notes/"))
            .await
            .unwrap();

        assert_eq!(body["path"], "/notes/");
        assert_eq!(
            backend.events(),
            vec![
                "GET /notes/",
                "POST /token/refresh/",
                "refresh settled",
                "GET /notes/"
            ]
        );
        assert_eq!(logouts.load(Ordering::SeqCst), 0);
        assert!(!gateway.is_refreshing());
    }

    #[tokio::test]
    async fn test_concurrent_failures_share_one_refresh() {
        let backend = backend(true);
        backend.hold_refresh.store(true, Ordering::SeqCst);
        let (gateway, logouts) = gateway(&backend, ClientConfig::default());

        let notes = tokio::spawn({
            let gateway = gateway.clone();
            async move { gateway.send_json::<serde_json::Value>(&ApiRequest::get("/notes/")).await }
        });
        settle(|| gateway.is_refreshing()).await;

        let tags = tokio::spawn({
            let gateway = gateway.clone();
            async move { gateway.send_json::<serde_json::Value>(&ApiRequest::get("/tags/")).await }
        });
        settle(|| backend.count("GET /tags/") == 1).await;
        tokio::task::yield_now().await;

        assert_eq!(backend.count("POST /token/refresh/"), 1);
        assert!(backend.position("refresh settled").is_none());

        backend.release_refresh.notify_one();
        let notes = notes.await.unwrap().unwrap();
        let tags = tags.await.unwrap().unwrap();

        assert_eq!(notes["path"], "/notes/");
        assert_eq!(tags["path"], "/tags/");
        assert_eq!(backend.count("POST /token/refresh/"), 1);

        let settled = backend.position("refresh settled").unwrap();
        assert!(backend.rposition("GET /notes/").unwrap() > settled);
        assert!(backend.rposition("GET /tags/").unwrap() > settled);
        assert_eq!(logouts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_refresh_rejects_every_waiter_and_logs_out_once() {
        let backend = backend(false);
        backend.hold_refresh.store(true, Ordering::SeqCst);
        let (gateway, logouts) = gateway(&backend, ClientConfig::default());

        let mut tasks = Vec::new();
        for path in ["/notes/", "/tags/", "/note/1/"] {
            let gateway = gateway.clone();
            tasks.push(tokio::spawn(async move {
                gateway.send(&ApiRequest::get(path)).await
            }));
        }
        settle(|| backend.events().len() >= 4).await;
        tokio::task::yield_now().await;

        backend.release_refresh.notify_one();
        for task in tasks {
            let err = task.await.unwrap().unwrap_err();
            assert!(err.is_unauthorized());
            assert_eq!(
                err.payload().and_then(|p| p.detail()),
                Some("Refresh token cookie not found.")
            );
        }

        assert_eq!(backend.count("POST /token/refresh/"), 1);
        assert_eq!(logouts.load(Ordering::SeqCst), 1);
        assert!(!gateway.is_refreshing());
    }

    #[tokio::test]
    async fn test_public_endpoint_401_never_refreshes() {
        let backend = backend(true);
        let (gateway, logouts) = gateway(&backend, ClientConfig::default());

        let err = gateway
            .send(&ApiRequest::post("/token/"))
            .await
            .unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(backend.events(), vec!["POST /token/"]);
        assert_eq!(logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unrelated_failures_pass_through() {
        let backend = backend(true);
        let (gateway, logouts) = gateway(&backend, ClientConfig::default());

        let err = gateway
            .send(&ApiRequest::get("/explode/"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));

        // A 403 on a protected first attempt is a permission problem, not a
        // stale session.
        let err = gateway.send(&ApiRequest::get("/admin/")).await.unwrap_err();
        assert_eq!(err.status(), Some(403));

        assert_eq!(backend.events(), vec!["GET /explode/", "GET /admin/"]);
        assert_eq!(logouts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_replay_that_still_fails_forces_logout() {
        let backend = backend(true);
        let (gateway, logouts) = gateway(&backend, ClientConfig::default());

        let err = gateway
            .send(&ApiRequest::get("/stubborn/"))
            .await
            .unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(
            backend.events(),
            vec![
                "GET /stubborn/",
                "POST /token/refresh/",
                "refresh settled",
                "GET /stubborn/"
            ]
        );
        assert_eq!(logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_replay_rejected_with_403_forces_logout() {
        let backend = backend(true);
        let (gateway, logouts) = gateway(&backend, ClientConfig::default());
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reasons);
        gateway.on_logout(move |event: &LogoutEvent| sink.lock().unwrap().push(event.reason));

        let err = gateway
            .send(&ApiRequest::get("/locked/"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(403));
        assert_eq!(
            backend.events(),
            vec![
                "GET /locked/",
                "POST /token/refresh/",
                "refresh settled",
                "GET /locked/"
            ]
        );
        assert_eq!(logouts.load(Ordering::SeqCst), 1);
        assert_eq!(*reasons.lock().unwrap(), vec![LogoutReason::ReplayRejected]);
    }

    #[tokio::test]
    async fn test_refresh_rejected_with_403_rejects_every_waiter() {
        let backend = backend(true);
        backend.refresh_forbidden.store(true, Ordering::SeqCst);
        backend.hold_refresh.store(true, Ordering::SeqCst);
        let (gateway, logouts) = gateway(&backend, ClientConfig::default());
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reasons);
        gateway.on_logout(move |event: &LogoutEvent| sink.lock().unwrap().push(event.reason));

        let mut tasks = Vec::new();
        for path in ["/notes/", "/tags/"] {
            let gateway = gateway.clone();
            tasks.push(tokio::spawn(async move {
                gateway.send(&ApiRequest::get(path)).await
            }));
        }
        settle(|| backend.events().len() >= 3).await;
        tokio::task::yield_now().await;

        backend.release_refresh.notify_one();
        for task in tasks {
            let err = task.await.unwrap().unwrap_err();
            assert_eq!(err.status(), Some(403));
            assert_eq!(
                err.payload().and_then(|p| p.detail()),
                Some("Refresh token blacklisted.")
            );
        }

        assert_eq!(backend.count("POST /token/refresh/"), 1);
        assert_eq!(backend.count("GET /notes/"), 1);
        assert_eq!(backend.count("GET /tags/"), 1);
        assert_eq!(logouts.load(Ordering::SeqCst), 1);
        assert_eq!(*reasons.lock().unwrap(), vec![LogoutReason::RefreshFailed]);
    }

    #[tokio::test]
    async fn test_public_endpoint_403_passes_through() {
        let backend = backend(true);
        backend.login_forbidden.store(true, Ordering::SeqCst);
        let (gateway, logouts) = gateway(&backend, ClientConfig::default());

        let err = gateway
            .send(&ApiRequest::post("/token/"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(403));
        assert_eq!(backend.events(), vec!["POST /token/"]);
        assert_eq!(logouts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_direct_refresh_call_failure_forces_logout() {
        let backend = backend(false);
        let (gateway, logouts) = gateway(&backend, ClientConfig::default());

        let err = gateway
            .send(&ApiRequest::post("/token/refresh/"))
            .await
            .unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(backend.count("POST /token/refresh/"), 1);
        assert_eq!(logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_refresh_times_out_and_logs_out() {
        let backend = backend(true);
        backend.hold_refresh.store(true, Ordering::SeqCst);
        let config = ClientConfig {
            refresh_timeout_secs: 5,
            ..ClientConfig::default()
        };
        let (gateway, logouts) = gateway(&backend, config);

        let err = gateway
            .send(&ApiRequest::get("/notes/"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::RefreshTimedOut(_)));
        assert_eq!(logouts.load(Ordering::SeqCst), 1);
        assert!(!gateway.is_refreshing());
    }

    #[tokio::test]
    async fn test_refresh_slot_is_reusable_after_failure() {
        let backend = backend(false);
        let (gateway, logouts) = gateway(&backend, ClientConfig::default());

        assert!(gateway.send(&ApiRequest::get("/notes/")).await.is_err());
        backend.refresh_ok.store(true, Ordering::SeqCst);
        assert!(gateway.send(&ApiRequest::get("/notes/")).await.is_ok());

        assert_eq!(backend.count("POST /token/refresh/"), 2);
        assert_eq!(logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandoned_refresh_does_not_keep_gateway_alive() {
        let backend = backend(true);
        backend.hold_refresh.store(true, Ordering::SeqCst);
        let (gateway, _) = gateway(&backend, ClientConfig::default());
        let inner = Arc::downgrade(&gateway.inner);

        let pending = tokio::spawn({
            let gateway = gateway.clone();
            async move { gateway.send(&ApiRequest::get("/notes/")).await }
        });
        settle(|| backend.count("POST /token/refresh/") == 1).await;

        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());
        drop(gateway);

        assert!(inner.upgrade().is_none());
    }

    #[tokio::test]
    async fn test_forced_logout_discards_session_cookies() {
        use reqwest::cookie::CookieStore;
        use reqwest::header::HeaderValue;

        let backend = backend(true);
        let (gateway, _) = gateway(&backend, ClientConfig::default());
        let url = url::Url::parse("http://localhost:8000/").unwrap();
        let cookie = HeaderValue::from_static("access_token=abc");
        gateway
            .session()
            .set_cookies(&mut std::iter::once(&cookie), &url);
        assert!(gateway.session().has_session());

        let _ = gateway.send(&ApiRequest::post("/token/")).await;
        assert!(!gateway.session().has_session());
    }
}
