//! Subtask handler registry and the default login vocabulary.
//!
//! Each round of the flow queues a named subtask; the registry maps subtask
//! identifiers to handler capabilities. Callers may register their own
//! handlers for subtasks the default vocabulary does not know; this is the
//! engine's only designed extension point.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::credentials::Credentials;
use crate::error::{AuthError, FlowResult};
use crate::flow::{subtask_id, FlowRequest, FlowResponse};
use crate::totp;
use crate::transport::FlowTransport;

/// Capability object handed to a handler for exactly one invocation.
///
/// Closes over the live flow transport and the token of the in-flight round.
/// The borrow makes it impossible to retain beyond the invocation.
pub struct HandlerApi<'t, 'a> {
    transport: &'t mut FlowTransport<'a>,
    flow_token: String,
}

impl<'t, 'a> HandlerApi<'t, 'a> {
    pub(crate) fn new(transport: &'t mut FlowTransport<'a>, flow_token: String) -> Self {
        Self {
            transport,
            flow_token,
        }
    }

    /// The flow token of the round being answered.
    #[must_use]
    pub fn flow_token(&self) -> &str {
        &self.flow_token
    }

    /// Send a continuation request answering the current round.
    pub async fn send_subtask_inputs(&mut self, subtask_inputs: Vec<Value>) -> FlowResult {
        let request = FlowRequest::continuation(self.flow_token.clone(), subtask_inputs);
        self.transport.execute(&request).await
    }
}

/// One step of the login flow.
///
/// Handlers are side-effect-bounded to at most one continuation request per
/// invocation; the two-factor handler's bounded internal retry is the only
/// exception.
#[async_trait]
pub trait SubtaskHandler: Send + Sync {
    async fn handle(
        &self,
        subtask_id: &str,
        previous: &FlowResponse,
        credentials: &Credentials,
        api: &mut HandlerApi<'_, '_>,
    ) -> FlowResult;
}

/// Mapping from subtask identifier to handler.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn SubtaskHandler>>,
}

impl HandlerRegistry {
    /// Registry preloaded with the default login vocabulary.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };
        registry.register(subtask_id::JS_INSTRUMENTATION, Arc::new(JsInstrumentation));
        registry.register(
            subtask_id::ENTER_USER_IDENTIFIER,
            Arc::new(EnterUserIdentifier),
        );
        registry.register(
            subtask_id::ENTER_ALTERNATE_IDENTIFIER,
            Arc::new(EnterAlternateIdentifier),
        );
        registry.register(subtask_id::ENTER_PASSWORD, Arc::new(EnterPassword));
        registry.register(
            subtask_id::ACCOUNT_DUPLICATION_CHECK,
            Arc::new(AccountDuplicationCheck),
        );
        registry.register(
            subtask_id::TWO_FACTOR_AUTH_CHALLENGE,
            Arc::new(TwoFactorAuthChallenge),
        );
        registry.register(subtask_id::ACID, Arc::new(Acid));
        registry.register(subtask_id::SUCCESS, Arc::new(LoginSuccess));
        registry
    }

    /// Add or overwrite the handler for a subtask id.
    pub fn register(&mut self, subtask_id: impl Into<String>, handler: Arc<dyn SubtaskHandler>) {
        self.handlers.insert(subtask_id.into(), handler);
    }

    /// Look up the handler for a subtask id.
    #[must_use]
    pub fn resolve(&self, subtask_id: &str) -> Option<Arc<dyn SubtaskHandler>> {
        self.handlers.get(subtask_id).cloned()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn enter_text_input(subtask_id: &str, text: Option<&str>) -> Value {
    let mut enter_text = Map::new();
    // An absent value drops the key entirely rather than sending null.
    if let Some(text) = text {
        enter_text.insert("text".into(), text.into());
    }
    enter_text.insert("link".into(), "next_link".into());
    json!({"subtask_id": subtask_id, "enter_text": enter_text})
}

/// Answers the JavaScript instrumentation probe with an empty payload.
struct JsInstrumentation;

#[async_trait]
impl SubtaskHandler for JsInstrumentation {
    async fn handle(
        &self,
        subtask_id: &str,
        _previous: &FlowResponse,
        _credentials: &Credentials,
        api: &mut HandlerApi<'_, '_>,
    ) -> FlowResult {
        debug!(subtask = subtask_id, "answering js instrumentation probe");
        api.send_subtask_inputs(vec![json!({
            "subtask_id": subtask_id,
            "js_instrumentation": {"response": "{}", "link": "next_link"},
        })])
        .await
    }
}

/// Submits the login identifier through the settings list.
struct EnterUserIdentifier;

#[async_trait]
impl SubtaskHandler for EnterUserIdentifier {
    async fn handle(
        &self,
        subtask_id: &str,
        _previous: &FlowResponse,
        credentials: &Credentials,
        api: &mut HandlerApi<'_, '_>,
    ) -> FlowResult {
        debug!(subtask = subtask_id, "submitting user identifier");
        api.send_subtask_inputs(vec![json!({
            "subtask_id": subtask_id,
            "settings_list": {
                "settings": [{
                    "key": "user_identifier",
                    "response_data": {"text_data": {"result": credentials.username()}},
                }],
                "link": "next_link",
            },
        })])
        .await
    }
}

/// Submits the recovery contact when the endpoint asks for another
/// identifier. An absent contact is forwarded as an absent field; the
/// endpoint rejects it on its side.
struct EnterAlternateIdentifier;

#[async_trait]
impl SubtaskHandler for EnterAlternateIdentifier {
    async fn handle(
        &self,
        subtask_id: &str,
        _previous: &FlowResponse,
        credentials: &Credentials,
        api: &mut HandlerApi<'_, '_>,
    ) -> FlowResult {
        debug!(subtask = subtask_id, "submitting alternate identifier");
        api.send_subtask_inputs(vec![enter_text_input(subtask_id, credentials.email())])
            .await
    }
}

/// Submits the password.
struct EnterPassword;

#[async_trait]
impl SubtaskHandler for EnterPassword {
    async fn handle(
        &self,
        subtask_id: &str,
        _previous: &FlowResponse,
        credentials: &Credentials,
        api: &mut HandlerApi<'_, '_>,
    ) -> FlowResult {
        debug!(subtask = subtask_id, "submitting password");
        api.send_subtask_inputs(vec![json!({
            "subtask_id": subtask_id,
            "enter_password": {"password": credentials.password(), "link": "next_link"},
        })])
        .await
    }
}

/// Declines to reuse a logged-in account.
struct AccountDuplicationCheck;

#[async_trait]
impl SubtaskHandler for AccountDuplicationCheck {
    async fn handle(
        &self,
        subtask_id: &str,
        _previous: &FlowResponse,
        _credentials: &Credentials,
        api: &mut HandlerApi<'_, '_>,
    ) -> FlowResult {
        debug!(subtask = subtask_id, "declining account duplication");
        api.send_subtask_inputs(vec![json!({
            "subtask_id": subtask_id,
            "check_logged_in_account": {"link": "AccountDuplicationCheck_false"},
        })])
        .await
    }
}

/// Answers the two-factor challenge with a fresh TOTP code.
///
/// The only handler allowed to retry internally: up to
/// [`Self::MAX_ATTEMPTS`] submissions, waiting `2000*n` ms after failed
/// attempt *n*, then the last failure is re-raised unchanged.
struct TwoFactorAuthChallenge;

impl TwoFactorAuthChallenge {
    const MAX_ATTEMPTS: u32 = 3;
}

#[async_trait]
impl SubtaskHandler for TwoFactorAuthChallenge {
    async fn handle(
        &self,
        subtask_id: &str,
        _previous: &FlowResponse,
        credentials: &Credentials,
        api: &mut HandlerApi<'_, '_>,
    ) -> FlowResult {
        let Some(seed) = credentials.totp_secret() else {
            return Err(AuthError::Credential(
                "two-factor challenge received but no TOTP seed is configured".into(),
            ));
        };

        let mut last_error = None;
        for attempt in 1..=Self::MAX_ATTEMPTS {
            // A fresh code per attempt; the window may have rolled over
            // during the backoff.
            let code = totp::generate_code(seed)?;
            debug!(subtask = subtask_id, attempt, "submitting one-time code");

            match api
                .send_subtask_inputs(vec![enter_text_input(subtask_id, Some(&code))])
                .await
            {
                Ok(response) => return Ok(response),
                Err(err) => {
                    warn!(subtask = subtask_id, attempt, error = %err, "one-time code rejected");
                    last_error = Some(err);
                    if attempt < Self::MAX_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(2000 * u64::from(attempt))).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AuthError::Credential("two-factor retries exhausted without an attempt".into())
        }))
    }
}

/// Submits the recovery contact for secondary identity confirmation.
struct Acid;

#[async_trait]
impl SubtaskHandler for Acid {
    async fn handle(
        &self,
        subtask_id: &str,
        _previous: &FlowResponse,
        credentials: &Credentials,
        api: &mut HandlerApi<'_, '_>,
    ) -> FlowResult {
        debug!(subtask = subtask_id, "confirming identity");
        api.send_subtask_inputs(vec![enter_text_input(subtask_id, credentials.email())])
            .await
    }
}

/// Terminal subtask: the flow is complete.
///
/// Synthesizes a success with an empty queue so the loop ends without
/// another network round trip.
struct LoginSuccess;

#[async_trait]
impl SubtaskHandler for LoginSuccess {
    async fn handle(
        &self,
        subtask_id: &str,
        previous: &FlowResponse,
        _credentials: &Credentials,
        _api: &mut HandlerApi<'_, '_>,
    ) -> FlowResult {
        debug!(subtask = subtask_id, "login flow reached terminal subtask");
        Ok(FlowResponse {
            flow_token: previous.flow_token.clone(),
            status: previous.status.clone(),
            subtasks: Vec::new(),
            errors: Vec::new(),
        })
    }
}
