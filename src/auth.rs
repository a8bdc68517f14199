//! Session state and the login orchestrator.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::config::AuthConfig;
use crate::cookies::CookieJar;
use crate::credentials::Credentials;
use crate::error::{AuthError, AuthResult};
use crate::flow::FlowRequest;
use crate::handlers::{HandlerApi, HandlerRegistry, SubtaskHandler};
use crate::http::{HttpRequest, HttpTransport, ReqwestTransport};
use crate::ratelimit::{RateLimitStrategy, WaitUntilReset};
use crate::transport::FlowTransport;

/// Cookies purged before every login attempt; the endpoint behaves
/// inconsistently with residual state from a prior session.
const STALE_COOKIES: &[&str] = &[
    "twitter_ads_id",
    "ads_prefs",
    "_twitter_sess",
    "zipbox_forms_auth_token",
    "lang",
    "bouncer_reset_cookie",
    "twid",
    "twitter_ads_idb",
    "email_uid",
    "external_referer",
    "ct0",
    "aa_u",
];

/// Mutable session state owned by one [`UserAuth`].
///
/// Mutated only by the flow transport (cookie absorption on every
/// response), guest-token refresh, the orchestrator's pre-login cookie
/// purge, and [`UserAuth::logout`].
#[derive(Debug, Default)]
pub struct Session {
    pub(crate) cookies: CookieJar,
    pub(crate) guest_token: Option<String>,
    pub(crate) authenticated: bool,
}

impl Session {
    /// The session cookie jar.
    #[must_use]
    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub(crate) fn cookies_mut(&mut self) -> &mut CookieJar {
        &mut self.cookies
    }

    /// The current guest token, if one has been activated.
    #[must_use]
    pub fn guest_token(&self) -> Option<&str> {
        self.guest_token.as_deref()
    }

    /// Whether a login attempt has completed on this session.
    #[must_use]
    pub fn authenticated(&self) -> bool {
        self.authenticated
    }

    /// Headers for one outbound request: the guest-mode base plus, once
    /// authenticated, the session auth-type marker. The csrf header mirrors
    /// the `ct0` cookie whenever the endpoint has set one.
    pub(crate) fn request_headers(&self, config: &AuthConfig) -> AuthResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", config.bearer_token))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-twitter-active-user", HeaderValue::from_static("yes"));
        headers.insert("x-twitter-client-language", header_value(&config.language)?);
        if let Some(token) = &self.guest_token {
            headers.insert("x-guest-token", header_value(token)?);
        }
        if let Some(cookie_header) = self.cookies.header_value() {
            headers.insert(COOKIE, header_value(&cookie_header)?);
        }
        if let Some(csrf) = self.cookies.get("ct0") {
            headers.insert("x-csrf-token", header_value(csrf)?);
        }
        if self.authenticated {
            headers.insert(
                "x-twitter-auth-type",
                HeaderValue::from_static("OAuth2Session"),
            );
        }
        Ok(headers)
    }

    pub(crate) fn reset(&mut self) {
        self.cookies = CookieJar::new();
        self.guest_token = None;
        self.authenticated = false;
    }
}

fn header_value(value: &str) -> AuthResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| AuthError::Protocol("session value not representable as an HTTP header".into()))
}

/// Schema versions the flow endpoint currently accepts. This table tracks
/// the live endpoint and has to be maintained against it; it is not a
/// computed value.
fn login_subtask_versions() -> Value {
    json!({
        "action_list": 2,
        "alert_dialog": 1,
        "app_download_cta": 1,
        "check_logged_in_account": 1,
        "choice_selection": 3,
        "contacts_live_sync_permission_prompt": 0,
        "cta": 7,
        "email_verification": 2,
        "end_flow": 1,
        "enter_date": 1,
        "enter_email": 2,
        "enter_password": 5,
        "enter_phone": 2,
        "enter_recaptcha": 1,
        "enter_text": 5,
        "enter_username": 2,
        "generic_urt": 3,
        "in_app_notification": 1,
        "interest_picker": 3,
        "js_instrumentation": 1,
        "menu_dialog": 1,
        "notifications_permission_prompt": 2,
        "open_account": 2,
        "open_home_timeline": 1,
        "open_link": 1,
        "phone_verification": 4,
        "privacy_options": 1,
        "security_key": 3,
        "select_avatar": 4,
        "select_banner": 2,
        "settings_list": 7,
        "show_code": 1,
        "sign_up": 2,
        "sign_up_review": 4,
        "tweet_selection_urt": 1,
        "update_users": 1,
        "upload_media": 1,
        "user_recommendations_list": 4,
        "user_recommendations_urt": 1,
        "wait_spinner": 3,
        "web_modal": 1,
    })
}

fn login_init_request() -> FlowRequest {
    FlowRequest::init(
        "login",
        json!({
            "flow_context": {
                "debug_overrides": {},
                "start_location": {"location": "splash_screen"},
            },
        }),
        login_subtask_versions(),
    )
}

/// Context name used when a failure precedes the first subtask round.
const INIT_CONTEXT: &str = "LoginFlowInit";

/// Authentication engine for one account session.
///
/// Owns the mutable session state; a single `UserAuth` must not run
/// concurrent login attempts (the token and cookie jar would race), but
/// independent instances share nothing.
pub struct UserAuth {
    config: AuthConfig,
    http: Arc<dyn HttpTransport>,
    session: Session,
    registry: HandlerRegistry,
    rate_limit: Arc<dyn RateLimitStrategy>,
}

impl UserAuth {
    /// Create an engine backed by the canonical reqwest transport.
    pub fn new(config: AuthConfig) -> AuthResult<Self> {
        let http = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::with_transport(config, http))
    }

    /// Create an engine over a caller-supplied transport.
    #[must_use]
    pub fn with_transport(config: AuthConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            config,
            http,
            session: Session::default(),
            registry: HandlerRegistry::with_defaults(),
            rate_limit: Arc::new(WaitUntilReset::default()),
        }
    }

    /// Replace the rate-limit strategy.
    #[must_use]
    pub fn with_rate_limit_strategy(mut self, strategy: Arc<dyn RateLimitStrategy>) -> Self {
        self.rate_limit = strategy;
        self
    }

    /// Register a handler for a subtask id, overriding any default.
    ///
    /// This is the engine's only designed extension point; the handler is
    /// invoked whenever the endpoint queues the given subtask at the head
    /// of a response.
    pub fn register_handler(
        &mut self,
        subtask_id: impl Into<String>,
        handler: Arc<dyn SubtaskHandler>,
    ) {
        self.registry.register(subtask_id, handler);
    }

    /// Read-only view of the session state.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Activate a fresh guest token for the session.
    #[instrument(skip(self))]
    pub async fn refresh_guest_token(&mut self) -> AuthResult<()> {
        let url = format!("{}/1.1/guest/activate.json", self.config.api_url);
        let mut request = HttpRequest::new(Method::POST, url);
        request.headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", self.config.bearer_token))?,
        );

        let response = self.http.send(request).await?;
        self.session.cookies.store_response_cookies(&response.headers);
        if !response.is_success() {
            return Err(AuthError::Api {
                status: response.status.as_u16(),
                message: response.body_text(),
            });
        }

        let body: Value = serde_json::from_slice(&response.body)?;
        let token = body
            .get("guest_token")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::Protocol("guest activation returned no token".into()))?;

        debug!("guest token refreshed");
        self.session.guest_token = Some(token.to_owned());
        Ok(())
    }

    /// Run the full login flow for the given credentials.
    #[instrument(skip(self, credentials))]
    pub async fn login(&mut self, credentials: &Credentials) -> AuthResult<()> {
        self.refresh_guest_token().await?;
        self.run_login_flow(credentials).await
    }

    async fn run_login_flow(&mut self, credentials: &Credentials) -> AuthResult<()> {
        for name in STALE_COOKIES {
            self.session.cookies.remove(name);
        }

        let mut transport = FlowTransport::new(
            self.http.as_ref(),
            &mut self.session,
            &self.config,
            self.rate_limit.as_ref(),
        );

        let mut context = String::from(INIT_CONTEXT);
        let mut result = transport.execute(&login_init_request()).await;

        loop {
            match result {
                Ok(response) => {
                    if response.subtasks.is_empty() {
                        break;
                    }

                    // A well-formed response always carries a token here;
                    // the transport has already rejected ones that do not.
                    let Some(flow_token) = response.flow_token.clone() else {
                        result = Err(AuthError::Protocol("flow response lost its token".into()));
                        continue;
                    };

                    // Only the head of the queue is acted on; siblings are
                    // expected to reappear, reordered or resolved, in the
                    // next response.
                    let head_id = response.subtasks[0].subtask_id.clone();
                    let Some(handler) = self.registry.resolve(&head_id) else {
                        context = head_id.clone();
                        result = Err(AuthError::UnknownSubtask(head_id));
                        continue;
                    };

                    debug!(subtask = %head_id, "dispatching flow subtask");
                    context = head_id.clone();
                    let mut api = HandlerApi::new(&mut transport, flow_token);
                    result = handler
                        .handle(&head_id, &response, credentials, &mut api)
                        .await;
                }
                Err(err) => {
                    return Err(AuthError::Subtask {
                        subtask: context,
                        source: Box::new(err),
                    });
                }
            }
        }

        self.session.authenticated = true;
        info!("login flow completed");
        Ok(())
    }

    /// Probe whether the session is still accepted by the endpoint.
    ///
    /// Returns `false` on any transport failure or on a response carrying
    /// errors; never raises.
    pub async fn is_authenticated(&mut self) -> bool {
        let request = match self.api_request(Method::GET, "/1.1/account/verify_credentials.json") {
            Ok(request) => request,
            Err(_) => return false,
        };

        match self.http.send(request).await {
            Ok(response) => {
                self.session.cookies.store_response_cookies(&response.headers);
                let Ok(body) = serde_json::from_slice::<Value>(&response.body) else {
                    return false;
                };
                body.get("errors")
                    .and_then(Value::as_array)
                    .map_or(true, Vec::is_empty)
            }
            Err(err) => {
                debug!(error = %err, "credential verification failed");
                false
            }
        }
    }

    /// End the session.
    ///
    /// Best-effort: the logout endpoint is called when a token is held and
    /// failures are only logged; the token and cookie jar are cleared
    /// unconditionally afterwards.
    #[instrument(skip(self))]
    pub async fn logout(&mut self) {
        if self.session.guest_token.is_none() {
            return;
        }

        match self.api_request(Method::POST, "/1.1/account/logout.json") {
            Ok(request) => match self.http.send(request).await {
                Ok(response) => {
                    self.session.cookies.store_response_cookies(&response.headers);
                    if !response.is_success() {
                        warn!(
                            status = response.status.as_u16(),
                            "logout endpoint rejected the call"
                        );
                    }
                }
                Err(err) => warn!(error = %err, "logout call failed"),
            },
            Err(err) => warn!(error = %err, "could not build logout request"),
        }

        self.session.reset();
        info!("session cleared");
    }

    fn api_request(&self, method: Method, path: &str) -> AuthResult<HttpRequest> {
        let mut request = HttpRequest::new(method, format!("{}{path}", self.config.api_url));
        request.headers = self.session.request_headers(&self.config)?;
        Ok(request)
    }
}
