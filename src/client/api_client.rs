use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use serde_json::{json, Value};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::cancel::run_cancellable;
use super::flow::{Action, Event, RequestFlow};
use super::listeners::{AuthListener, ListenerRegistry};
use super::transport::{OutboundRequest, ReqwestTransport, Transport};
use crate::config::ApiConfig;
use crate::error::{ClientError, MALFORMED_RESPONSE_CODE, MALFORMED_RESPONSE_MESSAGE};
use crate::models::envelope::{ApiError, Envelope};
use crate::models::request::{
    HttpMethod, RequestDescriptor, RequestOptions, LOGIN_PATH, REFRESH_PATH, VERIFY_PATH,
};
use crate::models::session::{RefreshedTokens, SessionTokens};
use crate::store::TokenStore;
use crate::utils::log_throttle::LogThrottle;

/// Observer for request-path failures that were folded into an envelope.
pub type ErrorCallback = Arc<dyn Fn(&Envelope) + Send + Sync>;

const TRANSPORT_LOG_WINDOW: Duration = Duration::from_secs(30);
const SESSION_EXPIRED_MESSAGE: &str = "Sessão expirada.";

/// An HTTP response that made it through normalization.
struct Reply {
    status: StatusCode,
    envelope: Envelope,
}

fn event_of(reply: &Result<Reply, ClientError>) -> Event {
    match reply {
        Ok(reply) => Event::Settled {
            unauthorized: reply.status == StatusCode::UNAUTHORIZED,
        },
        Err(_) => Event::Failed,
    }
}

/// The single gateway every backend call goes through.
///
/// Attaches the stored access token, recovers once from an expired token via
/// the refresh endpoint, tears the session down when recovery is impossible
/// and tells listeners whenever the authentication state changes.
pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    listeners: ListenerRegistry,
    auth_state: watch::Sender<bool>,
    on_error: Option<ErrorCallback>,
    refresh_guard: Mutex<()>,
    log_throttle: LogThrottle,
}

impl ApiClient {
    /// Creates a client talking to `base_url` over reqwest.
    pub fn new(base_url: impl Into<String>, store: Arc<dyn TokenStore>) -> Self {
        Self::with_transport(base_url, store, Arc::new(ReqwestTransport::new()))
    }

    pub fn from_config(config: &ApiConfig, store: Arc<dyn TokenStore>) -> Self {
        Self::new(config.base_url.clone(), store)
    }

    /// Creates a client over any transport (test doubles, custom TLS setups...).
    pub fn with_transport(
        base_url: impl Into<String>,
        store: Arc<dyn TokenStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let base_url = base_url.into();
        let (auth_state, _) = watch::channel(store.access_token().is_some());
        info!("Creating API client for '{}'", base_url);
        ApiClient {
            base_url,
            transport,
            store,
            listeners: ListenerRegistry::new(),
            auth_state,
            on_error: None,
            refresh_guard: Mutex::new(()),
            log_throttle: LogThrottle::new(TRANSPORT_LOG_WINDOW),
        }
    }

    /// Injects the observer told about every transport-class failure.
    pub fn with_error_callback(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -- Requests

    /// Issues `descriptor`, recovering once from an expired token.
    ///
    /// Never fails: transport errors, cancellation and unparseable bodies are
    /// folded into an `ok: false` envelope and reported to the error callback.
    pub async fn request(&self, descriptor: RequestDescriptor) -> Envelope {
        match self.dispatch(&descriptor).await {
            Ok(envelope) => envelope,
            Err(e) => self.fold_error(&descriptor, &e),
        }
    }

    pub async fn get(&self, path: &str, options: RequestOptions) -> Envelope {
        self.request(RequestDescriptor::new(HttpMethod::Get, path).with_options(options))
            .await
    }

    pub async fn post(&self, path: &str, body: Value, options: RequestOptions) -> Envelope {
        self.request(
            RequestDescriptor::new(HttpMethod::Post, path)
                .with_body(body)
                .with_options(options),
        )
        .await
    }

    pub async fn put(&self, path: &str, body: Value, options: RequestOptions) -> Envelope {
        self.request(
            RequestDescriptor::new(HttpMethod::Put, path)
                .with_body(body)
                .with_options(options),
        )
        .await
    }

    pub async fn delete(&self, path: &str, options: RequestOptions) -> Envelope {
        self.request(RequestDescriptor::new(HttpMethod::Delete, path).with_options(options))
            .await
    }

    /// Runs one call through the retry-once flow. Errors are only the ones no
    /// leg could turn into an envelope.
    async fn dispatch(&self, descriptor: &RequestDescriptor) -> Result<Envelope, ClientError> {
        let span = info_span!(
            "api_request",
            request_id = %Uuid::new_v4(),
            method = descriptor.method.as_str(),
            path = descriptor.path.as_str(),
        );

        async move {
            let mut flow = RequestFlow::new(descriptor.route());
            let sent_token = self.store.access_token();

            let reply = self.exchange(descriptor, sent_token.as_deref()).await;
            let mut action = flow.advance(event_of(&reply));
            let mut outcome = reply.map(|r| r.envelope);

            loop {
                debug!("Request flow in {:?}, next action {:?}", flow.phase(), action);
                match action {
                    Action::Return => return outcome,
                    Action::Logout => {
                        self.logout();
                        return outcome;
                    }
                    Action::Refresh => {
                        let refreshed = run_cancellable(
                            descriptor.cancel.as_ref(),
                            self.refresh_session(sent_token.as_deref()),
                        )
                        .await;
                        match refreshed {
                            Ok(envelope) => {
                                action = flow.advance(Event::Refreshed { ok: envelope.ok });
                                if !envelope.ok {
                                    outcome = Ok(envelope);
                                }
                            }
                            Err(e) => {
                                action = flow.advance(Event::Failed);
                                outcome = Err(e);
                            }
                        }
                    }
                    Action::Retry => {
                        let token = self.store.access_token();
                        let reply = self.exchange(descriptor, token.as_deref()).await;
                        action = flow.advance(event_of(&reply));
                        outcome = reply.map(|r| r.envelope);
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// One network leg: send, then normalize the body.
    async fn exchange(
        &self,
        descriptor: &RequestDescriptor,
        access_token: Option<&str>,
    ) -> Result<Reply, ClientError> {
        let outbound = OutboundRequest::build(&self.base_url, descriptor, access_token);
        let response = run_cancellable(
            descriptor.cancel.as_ref(),
            self.transport.send(outbound),
        )
        .await?;

        let envelope = Envelope::from_response(response.status, &response.body).map_err(|e| {
            ClientError::MalformedResponse {
                status: response.status.as_u16(),
                message: e.to_string(),
            }
        })?;
        Ok(Reply {
            status: response.status,
            envelope,
        })
    }

    /// The refresh leg. Returns the envelope that decides the flow: `ok` means
    /// a usable access token is now stored.
    ///
    /// Concurrent callers queue on one guard; whoever finds the token already
    /// renewed by the caller ahead of it skips the network call.
    async fn refresh_session(&self, stale_token: Option<&str>) -> Result<Envelope, ClientError> {
        let _guard = self.refresh_guard.lock().await;

        let current = self.store.access_token();
        if current.is_some() && current.as_deref() != stale_token {
            debug!("Access token was renewed by a concurrent refresh, reusing it");
            return Ok(Envelope::success(None));
        }

        let Some(refresh_token) = self.store.refresh_token() else {
            info!("No refresh token stored, cannot renew the session");
            return Ok(Envelope::failure(ApiError {
                code: StatusCode::UNAUTHORIZED.as_u16(),
                message: SESSION_EXPIRED_MESSAGE.to_string(),
                description: None,
            }));
        };

        info!("Access token rejected, refreshing session");
        let descriptor = RequestDescriptor::new(HttpMethod::Post, REFRESH_PATH)
            .with_body(json!({ "token": refresh_token }));
        let envelope = match self.exchange(&descriptor, current.as_deref()).await {
            Ok(reply) => reply.envelope,
            Err(e) => self.fold_error(&descriptor, &e),
        };

        if !envelope.ok {
            warn!(
                "Session refresh rejected: {}",
                envelope
                    .error
                    .as_ref()
                    .map(|e| e.message.as_str())
                    .unwrap_or("unknown error")
            );
            return Ok(envelope);
        }

        let parsed = envelope
            .data
            .clone()
            .map(serde_json::from_value::<RefreshedTokens>);
        match parsed {
            Some(Ok(tokens)) => {
                match &tokens.refresh_token {
                    Some(rotated) => self.store.store_pair(&tokens.access_token, rotated),
                    None => self.store.set_access_token(&tokens.access_token),
                }
                info!("Session refreshed");
                Ok(envelope)
            }
            _ => {
                warn!("Refresh response did not carry an access token");
                Ok(Envelope::failure(ApiError {
                    code: MALFORMED_RESPONSE_CODE,
                    message: MALFORMED_RESPONSE_MESSAGE.to_string(),
                    description: Some("refresh response is missing access_token".to_string()),
                }))
            }
        }
    }

    /// Turns a request-path error into its envelope, logs it and tells the error callback.
    fn fold_error(&self, descriptor: &RequestDescriptor, error: &ClientError) -> Envelope {
        let envelope = error.to_envelope();
        match error {
            ClientError::Cancelled => {
                debug!(
                    "{} {} cancelled by caller",
                    descriptor.method.as_str(),
                    descriptor.path
                );
            }
            ClientError::Transport(_) => {
                if let Some(suppressed_count) = self.log_throttle.should_emit("transport") {
                    warn!(
                        suppressed_count,
                        "Backend unreachable on {} {}: {}",
                        descriptor.method.as_str(),
                        descriptor.path,
                        error
                    );
                }
            }
            _ => {
                warn!(
                    "{} {} failed: {}",
                    descriptor.method.as_str(),
                    descriptor.path,
                    error
                );
            }
        }
        if let Some(callback) = &self.on_error {
            callback(&envelope);
        }
        envelope
    }

    // -- Session

    /// Exchanges credentials for a token pair. Returns true only when both
    /// tokens came back and were stored.
    pub async fn login(&self, username: &str, password: &str) -> bool {
        let descriptor = RequestDescriptor::new(HttpMethod::Post, LOGIN_PATH)
            .with_body(json!({ "username": username, "password": password }));
        let envelope = self.request(descriptor).await;
        if !envelope.ok {
            debug!("Login rejected for '{}'", username);
            return false;
        }

        match envelope.data.map(serde_json::from_value::<SessionTokens>) {
            Some(Ok(tokens)) => {
                self.store
                    .store_pair(&tokens.access_token, &tokens.refresh_token);
                info!("User '{}' logged in", username);
                self.publish_auth_state(true);
                true
            }
            _ => {
                warn!("Login response for '{}' did not carry both tokens", username);
                false
            }
        }
    }

    /// Asks the backend whether the stored access token is still valid.
    ///
    /// Unlike the request methods this surfaces errors, so startup code can
    /// tell "could not determine" apart from "token rejected". They still
    /// reach the error callback.
    pub async fn verify(&self) -> Result<bool, ClientError> {
        let Some(token) = self.store.access_token() else {
            debug!("No access token stored, skipping verification");
            return Ok(false);
        };
        let descriptor = RequestDescriptor::new(HttpMethod::Post, VERIFY_PATH)
            .with_body(json!({ "token": token }));
        match self.dispatch(&descriptor).await {
            Ok(envelope) => {
                debug!("Token verification result: {}", envelope.ok);
                Ok(envelope.ok)
            }
            Err(e) => {
                self.fold_error(&descriptor, &e);
                Err(e)
            }
        }
    }

    /// Clears both tokens and notifies every listener, even if already logged out.
    pub fn logout(&self) {
        self.store.clear();
        info!("Session cleared");
        self.publish_auth_state(false);
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.access_token().is_some()
    }

    // -- Observers

    pub fn add_listener(&self, listener: &AuthListener) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &AuthListener) {
        self.listeners.remove(listener);
    }

    /// A channel carrying the authenticated flag after every transition.
    pub fn subscribe_auth_state(&self) -> watch::Receiver<bool> {
        self.auth_state.subscribe()
    }

    fn publish_auth_state(&self, authenticated: bool) {
        self.auth_state.send_replace(authenticated);
        self.listeners.notify();
    }
}
