//! Login flow wire types and secret redaction.
//!
//! Field names here must match the remote endpoint bit-for-bit; the service
//! is not controlled by this codebase.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder written over secret values in loggable request projections.
pub const REDACTED: &str = "[redacted]";

/// Well-known subtask identifiers of the login flow vocabulary.
pub mod subtask_id {
    pub const JS_INSTRUMENTATION: &str = "LoginJsInstrumentationSubtask";
    pub const ENTER_USER_IDENTIFIER: &str = "LoginEnterUserIdentifierSSO";
    pub const ENTER_ALTERNATE_IDENTIFIER: &str = "LoginEnterAlternateIdentifierSubtask";
    pub const ENTER_PASSWORD: &str = "LoginEnterPassword";
    pub const ACCOUNT_DUPLICATION_CHECK: &str = "AccountDuplicationCheck";
    pub const TWO_FACTOR_AUTH_CHALLENGE: &str = "LoginTwoFactorAuthChallenge";
    pub const ACID: &str = "LoginAcid";
    pub const SUCCESS: &str = "LoginSuccessSubtask";
    pub const DENY_LOGIN: &str = "DenyLoginSubtask";
}

/// One request against the flow endpoint.
///
/// The two variants share no required fields: an `Init` round opens a flow
/// (its `flow_name` travels as a query parameter, not in the body) and a
/// `Continuation` round answers the previously queued subtask.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FlowRequest {
    Init {
        #[serde(skip)]
        flow_name: String,
        input_flow_data: Value,
        subtask_versions: Value,
    },
    Continuation {
        flow_token: String,
        subtask_inputs: Vec<Value>,
    },
}

impl FlowRequest {
    /// Build an `Init` request.
    #[must_use]
    pub fn init(
        flow_name: impl Into<String>,
        input_flow_data: Value,
        subtask_versions: Value,
    ) -> Self {
        Self::Init {
            flow_name: flow_name.into(),
            input_flow_data,
            subtask_versions,
        }
    }

    /// Build a `Continuation` request echoing the given flow token.
    #[must_use]
    pub fn continuation(flow_token: impl Into<String>, subtask_inputs: Vec<Value>) -> Self {
        Self::Continuation {
            flow_token: flow_token.into(),
            subtask_inputs,
        }
    }

    /// The flow name, present only on `Init` requests.
    #[must_use]
    pub fn flow_name(&self) -> Option<&str> {
        match self {
            Self::Init { flow_name, .. } => Some(flow_name),
            Self::Continuation { .. } => None,
        }
    }

    /// Loggable projection of this request with every secret masked.
    ///
    /// Masks password entries, free-text entries, and settings-list text
    /// results with [`REDACTED`] while preserving structure and field names,
    /// so the projection still matches log lines to code paths. The input is
    /// not mutated.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Self::Continuation { subtask_inputs, .. } = &mut copy {
            for input in subtask_inputs {
                redact_subtask_input(input);
            }
        }
        copy
    }
}

fn redact_subtask_input(input: &mut Value) {
    if let Some(password) = input.pointer_mut("/enter_password/password") {
        *password = Value::from(REDACTED);
    }
    if let Some(text) = input.pointer_mut("/enter_text/text") {
        *text = Value::from(REDACTED);
    }
    if let Some(settings) = input
        .pointer_mut("/settings_list/settings")
        .and_then(Value::as_array_mut)
    {
        for setting in settings {
            if let Some(result) = setting.pointer_mut("/response_data/text_data/result") {
                *result = Value::from(REDACTED);
            }
        }
    }
}

/// One response from the flow endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowResponse {
    /// Continuation handle; must be echoed on the next round
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_token: Option<String>,

    /// Flow status reported by the endpoint (e.g. "success")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Queued subtasks, head first
    #[serde(default)]
    pub subtasks: Vec<Subtask>,

    /// Explicit rejections from the endpoint
    #[serde(default)]
    pub errors: Vec<FlowError>,
}

impl FlowResponse {
    /// The head of the subtask queue, the only entry the engine acts on.
    #[must_use]
    pub fn head_subtask(&self) -> Option<&Subtask> {
        self.subtasks.first()
    }
}

/// One queued subtask with its free-form payload fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub subtask_id: String,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Error entry in a flow response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowError {
    #[serde(default)]
    pub code: i64,

    #[serde(default)]
    pub message: String,
}
