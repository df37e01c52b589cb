//! Session management with single-flight token refresh.
//!
//! A `SessionManager` owns the in-memory access token, the FSM tracking the
//! session state, and a proactive refresh timer. Every API call goes through
//! [`SessionManager::authenticated_fetch`], which retries exactly once after a
//! 401 using the result of a shared refresh flight.

use crate::endpoints::{resolve, AuthEndpoints};
use crate::models::{
    AuthResponse, Credentials, FetchOptions, SessionSnapshot, SignupProfile, UserProfile,
};
use crate::session_fsm::{
    RefreshConfig, SessionMachine, SessionMachineInput, SessionState,
};
use crate::token;
use crate::{ApiError, AuthError, AuthResult};
use chrono::Utc;
use client_config_and_utils::Config;
use credential_storage::RefreshCredentials;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use http_transport::{HttpRequest, HttpResponse, HttpTransport, Method};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Default lead time before expiry at which the proactive refresh fires.
pub const DEFAULT_REFRESH_LEAD: Duration = Duration::from_secs(60);

/// Static configuration of a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL every relative target is resolved against.
    pub base_url: Url,
    pub endpoints: AuthEndpoints,
    /// How long before expiry the proactive refresh fires.
    pub refresh_lead: Duration,
    pub refresh: RefreshConfig,
}

impl SessionConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            endpoints: AuthEndpoints::default(),
            refresh_lead: DEFAULT_REFRESH_LEAD,
            refresh: RefreshConfig::default(),
        }
    }

    pub fn from_config(config: &Config) -> AuthResult<Self> {
        let mut session = Self::new(config.api_base_url()?);
        session.refresh_lead = config.refresh_lead();
        Ok(session)
    }
}

type RefreshFlight = Shared<BoxFuture<'static, Option<String>>>;

#[derive(Debug, Default)]
struct SessionData {
    access_token: Option<String>,
    user: Option<UserProfile>,
    loading: bool,
}

struct ProactiveTimer {
    deadline_tx: watch::Sender<Option<Instant>>,
    handle: JoinHandle<()>,
}

struct SessionInner {
    transport: Arc<dyn HttpTransport>,
    credentials: RefreshCredentials,
    config: SessionConfig,
    data: Mutex<SessionData>,
    /// Internal FSM for tracking session state transitions.
    fsm: Mutex<SessionMachine>,
    /// Bumped whenever the session identity changes (login, logout, clear).
    epoch: AtomicU64,
    flight: Mutex<Option<RefreshFlight>>,
    timer: Mutex<Option<ProactiveTimer>>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

/// Client session. Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("base_url", &self.inner.config.base_url.as_str())
            .field("state", &self.state())
            .field("has_token", &self.inner.data.lock().access_token.is_some())
            .finish()
    }
}

impl SessionManager {
    /// Create an anonymous session.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        credentials: RefreshCredentials,
        config: SessionConfig,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(SessionInner {
                transport,
                credentials,
                config,
                data: Mutex::new(SessionData::default()),
                fsm: Mutex::new(SessionMachine::new()),
                epoch: AtomicU64::new(0),
                flight: Mutex::new(None),
                timer: Mutex::new(None),
                snapshot_tx,
            }),
        }
    }

    /// Current access token. Never triggers a refresh.
    pub fn access_token(&self) -> Option<String> {
        self.inner.data.lock().access_token.clone()
    }

    /// Last known user profile.
    pub fn user(&self) -> Option<UserProfile> {
        self.inner.data.lock().user.clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Subscribe to user/token/loading changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Whether a refresh network call is outstanding.
    pub fn refresh_in_flight(&self) -> bool {
        self.inner.flight.lock().is_some()
    }

    /// When the armed proactive refresh will fire, if one is armed.
    pub fn proactive_refresh_deadline(&self) -> Option<Instant> {
        self.inner
            .timer
            .lock()
            .as_ref()
            .and_then(|timer| *timer.deadline_tx.borrow())
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.config.base_url
    }

    /// Log in with email and password.
    ///
    /// Any non-2xx response is reported as [`AuthError::InvalidCredentials`].
    pub async fn login(&self, credentials: &Credentials) -> AuthResult<UserProfile> {
        let body = serde_json::to_value(credentials)?;
        let endpoint = self.inner.config.endpoints.login.clone();
        self.authenticate(&endpoint, body, "login").await
    }

    /// Register a new account. Same contract as [`login`](Self::login).
    pub async fn signup(&self, profile: &SignupProfile) -> AuthResult<UserProfile> {
        let body = serde_json::to_value(profile)?;
        let endpoint = self.inner.config.endpoints.signup.clone();
        self.authenticate(&endpoint, body, "signup").await
    }

    async fn authenticate(
        &self,
        endpoint: &str,
        body: Value,
        action: &'static str,
    ) -> AuthResult<UserProfile> {
        let url = self.resolve(endpoint)?;
        debug!(action, path = url.path(), "Authenticating");

        self.inner.set_loading(true);
        let request = HttpRequest::new(Method::POST, url).json(body);
        let result = self.inner.transport.send(request).await;
        self.inner.set_loading(false);
        let response = result?;

        if !response.is_success() {
            let error = ApiError::from_response(&response);
            warn!(action, status = error.status, "Authentication rejected");
            return Err(AuthError::InvalidCredentials(
                error
                    .message()
                    .unwrap_or_else(|| format!("HTTP {}", error.status)),
            ));
        }

        let auth: AuthResponse = serde_json::from_slice(&response.body)?;
        self.inner.begin_session(&auth)?;
        self.schedule_proactive_refresh(&auth.access_token);

        let user = match auth.user {
            Some(user) => user,
            None => self.current_user().await?,
        };
        info!(action, user_id = %user.id, "Authenticated");
        Ok(user)
    }

    /// Fetch the current user and remember it.
    pub async fn current_user(&self) -> AuthResult<UserProfile> {
        let endpoint = self.inner.config.endpoints.current_user.clone();
        let value = self
            .authenticated_fetch(&endpoint, FetchOptions::get())
            .await?
            .ok_or_else(|| AuthError::InvalidResponse("empty current-user response".into()))?;

        let value = match value {
            Value::Object(mut map) if map.contains_key("user") => {
                map.remove("user").unwrap_or(Value::Null)
            }
            other => other,
        };
        let user: UserProfile = serde_json::from_value(value)?;

        self.inner.data.lock().user = Some(user.clone());
        self.inner.publish();
        Ok(user)
    }

    /// Obtain a new access token.
    ///
    /// Concurrent callers share one network call and its result. Returns
    /// `None` when no refresh credential exists or the refresh failed, in
    /// which case the session has been cleared.
    pub async fn refresh(&self) -> Option<String> {
        let flight = {
            let mut slot = self.inner.flight.lock();
            match slot.as_ref() {
                Some(existing) => {
                    debug!("Joining in-flight refresh");
                    existing.clone()
                }
                None => {
                    let inner = self.inner.clone();
                    let flight = async move {
                        let token = inner.run_refresh().await;
                        *inner.flight.lock() = None;
                        token
                    }
                    .boxed()
                    .shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };
        flight.await
    }

    /// Restore a session from the stored refresh credential at startup.
    pub async fn restore_session(&self) -> Option<UserProfile> {
        self.inner.set_loading(true);
        let user = match self.refresh().await {
            Some(_) => match self.user() {
                Some(user) => Some(user),
                None => self
                    .current_user()
                    .await
                    .map_err(|e| warn!(error = %e, "Failed to load current user"))
                    .ok(),
            },
            None => None,
        };
        self.inner.set_loading(false);
        user
    }

    /// End the session.
    ///
    /// The logout call is best-effort; local state is cleared regardless of
    /// its outcome.
    pub async fn logout(&self) {
        match self.resolve(&self.inner.config.endpoints.logout) {
            Ok(url) => {
                let mut request = HttpRequest::new(Method::POST, url);
                if let Ok(Some(refresh_token)) = self.inner.credentials.load() {
                    request = request.json(json!({ "refreshToken": refresh_token }));
                }
                match self.inner.transport.send(request).await {
                    Ok(response) if !response.is_success() => {
                        debug!(status = response.status, "Logout endpoint returned an error")
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Logout request failed"),
                }
            }
            Err(e) => warn!(error = %e, "Invalid logout endpoint"),
        }

        self.inner.clear_session(&SessionMachineInput::LogoutRequested);
        info!("Logged out");
    }

    /// Ask the server to send a password reset link.
    pub async fn request_password_reset(&self, email: &str) -> AuthResult<()> {
        let endpoint = self.inner.config.endpoints.forgot_password.clone();
        self.authenticated_fetch(&endpoint, FetchOptions::post(json!({ "email": email })))
            .await?;
        Ok(())
    }

    /// Set a new password using a reset token.
    pub async fn confirm_password_reset(&self, reset_token: &str, password: &str) -> AuthResult<()> {
        let endpoint = self.inner.config.endpoints.reset_password.clone();
        self.authenticated_fetch(
            &endpoint,
            FetchOptions::post(json!({ "token": reset_token, "password": password })),
        )
        .await?;
        Ok(())
    }

    /// Send a request with the session's credentials.
    ///
    /// - Bearer token attached unless absent or `target` is an auth endpoint.
    /// - 401 from a non-auth endpoint: refresh (single-flight), retry once.
    ///   A second 401 or a failed refresh clears the session and yields
    ///   [`AuthError::SessionExpired`].
    /// - Other non-2xx: [`AuthError::Api`] with the parsed or raw body.
    /// - 2xx: parsed JSON, raw text as a JSON string, or `None` when empty.
    pub async fn authenticated_fetch(
        &self,
        target: &str,
        options: FetchOptions,
    ) -> AuthResult<Option<Value>> {
        let url = self.resolve(target)?;
        let exempt = self
            .inner
            .config
            .endpoints
            .is_auth_endpoint(&self.inner.config.base_url, &url);

        let sent_token = if exempt { None } else { self.access_token() };
        let response = self.send(&url, &options, sent_token.as_deref()).await?;

        if !response.is_unauthorized() || exempt {
            return into_result(response);
        }

        debug!(path = url.path(), "Request unauthorized");
        let retry_token = match self.access_token() {
            Some(current) if sent_token.as_deref() != Some(current.as_str()) => {
                debug!("Token replaced while request was in flight, retrying with current token");
                Some(current)
            }
            _ => self.refresh().await,
        };

        let Some(token) = retry_token else {
            warn!(path = url.path(), "Refresh unavailable, session expired");
            self.inner.clear_session(&SessionMachineInput::SessionExpired);
            return Err(AuthError::SessionExpired);
        };

        let retry = self.send(&url, &options, Some(&token)).await?;
        if retry.is_unauthorized() {
            warn!(path = url.path(), "Request still unauthorized after refresh");
            self.inner.clear_session(&SessionMachineInput::SessionExpired);
            return Err(AuthError::SessionExpired);
        }
        into_result(retry)
    }

    async fn send(
        &self,
        url: &Url,
        options: &FetchOptions,
        token: Option<&str>,
    ) -> AuthResult<HttpResponse> {
        let mut request = HttpRequest::new(options.method.clone(), url.clone());
        for (name, value) in &options.headers {
            request = request.header(name.clone(), value.clone());
        }
        if let Some(token) = token {
            request = request.bearer(token);
        }
        if let Some(body) = &options.body {
            request = request.json(body.clone());
        }
        Ok(self.inner.transport.send(request).await?)
    }

    fn resolve(&self, target: &str) -> AuthResult<Url> {
        Ok(resolve(&self.inner.config.base_url, target)?)
    }

    /// Arm a one-shot refresh at `exp - now - lead`.
    ///
    /// Replaces any previously armed deadline. Tokens without an expiry, or
    /// already inside the lead window, disarm the timer instead.
    pub fn schedule_proactive_refresh(&self, access_token: &str) {
        let lead = self.inner.config.refresh_lead;
        match token::refresh_delay(access_token, Utc::now(), lead) {
            Some(delay) => {
                debug!(delay_secs = delay.as_secs(), "Arming proactive refresh");
                self.inner.arm_timer(Instant::now() + delay);
            }
            None => {
                debug!("Token expiry unknown or too close, proactive refresh not armed");
                self.inner.disarm_timer();
            }
        }
    }

    /// Stop the proactive refresh task. The session stays usable for
    /// explicit calls.
    pub fn dispose(&self) {
        if let Some(timer) = self.inner.timer.lock().take() {
            timer.handle.abort();
        }
    }
}

fn into_result(response: HttpResponse) -> AuthResult<Option<Value>> {
    if !response.is_success() {
        return Err(ApiError::from_response(&response).into());
    }
    if response.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        response
            .json_body()
            .unwrap_or_else(|| Value::String(response.text_body())),
    ))
}

impl SessionInner {
    fn state(&self) -> SessionState {
        SessionState::from(self.fsm.lock().state())
    }

    /// Transition the FSM and publish the new snapshot if the state changed.
    fn transition(&self, input: &SessionMachineInput) -> AuthResult<SessionState> {
        let mut fsm = self.fsm.lock();
        let old_state = SessionState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_state = SessionState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(
                old_state = old_state.as_str(),
                new_state = new_state.as_str(),
                "Session state transition"
            );
            self.publish();
        }
        Ok(new_state)
    }

    fn publish(&self) {
        let state = self.state();
        let snapshot = {
            let data = self.data.lock();
            SessionSnapshot {
                user: data.user.clone(),
                access_token: data.access_token.clone(),
                loading: data.loading,
                state,
            }
        };
        self.snapshot_tx.send_replace(snapshot);
    }

    fn set_loading(&self, loading: bool) {
        self.data.lock().loading = loading;
        self.publish();
    }

    fn begin_session(&self, auth: &AuthResponse) -> AuthResult<()> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(refresh_token) = &auth.refresh_token {
            self.credentials.store(refresh_token)?;
        }
        {
            let mut data = self.data.lock();
            data.access_token = Some(auth.access_token.clone());
            data.user = auth.user.clone();
        }
        self.transition(&SessionMachineInput::LoginSuccess)?;
        self.publish();
        Ok(())
    }

    /// Drop every credential and disarm the timer.
    fn clear_session(&self, input: &SessionMachineInput) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.disarm_timer();
        if let Err(e) = self.credentials.clear() {
            warn!(error = %e, "Failed to clear stored refresh credential");
        }
        {
            let mut data = self.data.lock();
            data.access_token = None;
            data.user = None;
        }
        if let Err(e) = self.transition(input) {
            debug!(error = %e, "Session already cleared");
        }
        self.publish();
    }

    /// Body of the single refresh flight.
    async fn run_refresh(self: &Arc<Self>) -> Option<String> {
        let epoch = self.epoch.load(Ordering::SeqCst);

        let stored = match self.credentials.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to read refresh credential");
                None
            }
        };
        if self.credentials.is_explicit() && stored.is_none() {
            debug!("No refresh credential stored");
            let had_token = self.data.lock().access_token.is_some();
            if had_token {
                self.clear_session(&SessionMachineInput::SessionExpired);
            }
            return None;
        }

        if let Err(e) = self.transition(&SessionMachineInput::RefreshStarted) {
            debug!(error = %e, "Refresh started outside the expected state");
        }

        let result = self.refresh_with_backoff(stored.as_deref()).await;

        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Session changed during refresh, discarding result");
            return self.data.lock().access_token.clone();
        }

        match result {
            Ok(auth) => {
                if let Some(refresh_token) = &auth.refresh_token {
                    if let Err(e) = self.credentials.store(refresh_token) {
                        warn!(error = %e, "Failed to persist rotated refresh token");
                    }
                }
                {
                    let mut data = self.data.lock();
                    data.access_token = Some(auth.access_token.clone());
                    if auth.user.is_some() {
                        data.user = auth.user.clone();
                    }
                }
                if let Err(e) = self.transition(&SessionMachineInput::RefreshSuccess) {
                    warn!(error = %e, "Unexpected session state after refresh");
                }
                self.publish();
                SessionManager {
                    inner: self.clone(),
                }
                .schedule_proactive_refresh(&auth.access_token);
                info!("Access token refreshed");
                Some(auth.access_token)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                self.clear_session(&SessionMachineInput::RefreshFailed);
                None
            }
        }
    }

    /// Refresh with exponential backoff on transient errors.
    async fn refresh_with_backoff(&self, refresh_token: Option<&str>) -> AuthResult<AuthResponse> {
        let max_attempts = self.config.refresh.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.try_refresh(refresh_token).await {
                Ok(auth) => return Ok(auth),
                Err(e) if e.is_transient() && attempt + 1 < max_attempts => {
                    let delay = self.config.refresh.delay_for_attempt(attempt);
                    debug!(
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Refresh failed with transient error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Single attempt to refresh the session.
    async fn try_refresh(&self, refresh_token: Option<&str>) -> AuthResult<AuthResponse> {
        let url = resolve(&self.config.base_url, &self.config.endpoints.refresh)?;
        debug!(path = url.path(), explicit = refresh_token.is_some(), "Refreshing token");

        let mut request = HttpRequest::new(Method::POST, url);
        if let Some(refresh_token) = refresh_token {
            request = request.json(json!({ "refreshToken": refresh_token }));
        }

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            let error = ApiError::from_response(&response);
            if error.status >= 500 {
                return Err(error.into());
            }
            return Err(AuthError::RefreshFailed(error.to_string()));
        }

        Ok(serde_json::from_slice(&response.body)?)
    }

    fn arm_timer(self: &Arc<Self>, deadline: Instant) {
        let mut slot = self.timer.lock();
        if let Some(timer) = slot.as_ref() {
            if !timer.handle.is_finished() {
                timer.deadline_tx.send_replace(Some(deadline));
                return;
            }
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime, proactive refresh not armed");
                return;
            }
        };
        let (deadline_tx, deadline_rx) = watch::channel(Some(deadline));
        let task = handle.spawn(run_proactive_timer(Arc::downgrade(self), deadline_rx));
        *slot = Some(ProactiveTimer {
            deadline_tx,
            handle: task,
        });
    }

    fn disarm_timer(&self) {
        if let Some(timer) = self.timer.lock().as_ref() {
            timer.deadline_tx.send_replace(None);
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.handle.abort();
        }
    }
}

/// Waits for the armed deadline and refreshes. Holds only a weak reference
/// so an abandoned session shuts the task down.
async fn run_proactive_timer(
    session: Weak<SessionInner>,
    mut deadline_rx: watch::Receiver<Option<Instant>>,
) {
    loop {
        let deadline = *deadline_rx.borrow_and_update();
        let fired = match deadline {
            Some(at) => tokio::select! {
                _ = tokio::time::sleep_until(at) => true,
                changed = deadline_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    false
                }
            },
            None => {
                if deadline_rx.changed().await.is_err() {
                    return;
                }
                false
            }
        };
        if !fired {
            continue;
        }

        let Some(inner) = session.upgrade() else {
            return;
        };
        inner.disarm_timer();
        debug!("Proactive refresh timer fired");

        let manager = SessionManager { inner };
        if manager.refresh().await.is_none() {
            info!("Proactive refresh failed, session ended");
        }
    }
}
