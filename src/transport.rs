//! Flow round-trip execution.

use reqwest::{Method, StatusCode};
use tracing::{debug, warn};

use crate::auth::Session;
use crate::config::AuthConfig;
use crate::error::{AuthError, FlowResult};
use crate::flow::{subtask_id, FlowRequest, FlowResponse};
use crate::http::{HttpRequest, HttpTransport};
use crate::ratelimit::{RateLimitEvent, RateLimitStrategy};

const FLOW_ENDPOINT: &str = "/1.1/onboarding/task.json";

/// Executes flow rounds against the onboarding endpoint.
///
/// Borrows the live session for the duration of one login attempt; every
/// response updates the session cookie jar before any other processing.
pub(crate) struct FlowTransport<'a> {
    http: &'a dyn HttpTransport,
    session: &'a mut Session,
    config: &'a AuthConfig,
    rate_limit: &'a dyn RateLimitStrategy,
}

impl<'a> FlowTransport<'a> {
    pub(crate) fn new(
        http: &'a dyn HttpTransport,
        session: &'a mut Session,
        config: &'a AuthConfig,
        rate_limit: &'a dyn RateLimitStrategy,
    ) -> Self {
        Self {
            http,
            session,
            config,
            rate_limit,
        }
    }

    /// Execute one flow request and triage the response.
    ///
    /// Rate-limited responses are resubmitted after the injected strategy
    /// returns, with no retry cap at this layer. Transport-level failures
    /// are returned immediately.
    pub(crate) async fn execute(&mut self, request: &FlowRequest) -> FlowResult {
        if self.session.guest_token().is_none() {
            return Err(AuthError::Protocol(
                "no guest token; refresh it before starting a flow".into(),
            ));
        }

        let url = match request.flow_name() {
            Some(name) => format!("{}{FLOW_ENDPOINT}?flow_name={name}", self.config.api_url),
            None => format!("{}{FLOW_ENDPOINT}", self.config.api_url),
        };
        let body = serde_json::to_string(request)?;
        let loggable = serde_json::to_string(&request.redacted())?;
        debug!(url = %url, request = %loggable, "executing flow request");

        let mut throttled = 0u32;
        let response = loop {
            let mut http_request = HttpRequest::new(Method::POST, url.clone());
            http_request.headers = self.session.request_headers(self.config)?;
            http_request.body = Some(body.clone());

            let response = self.http.send(http_request).await?;
            self.session
                .cookies_mut()
                .store_response_cookies(&response.headers);

            if response.status == StatusCode::TOO_MANY_REQUESTS {
                throttled += 1;
                let event = RateLimitEvent {
                    request: request.redacted(),
                    status: response.status,
                    headers: &response.headers,
                    attempt: throttled,
                };
                self.rate_limit.backoff(&event).await;
                continue;
            }

            break response;
        };

        if !response.is_success() {
            warn!(status = response.status.as_u16(), "flow request rejected");
            return Err(AuthError::Api {
                status: response.status.as_u16(),
                message: response.body_text(),
            });
        }

        let parsed: FlowResponse = serde_json::from_slice(&response.body)?;
        if let Some(error) = parsed.errors.first() {
            return Err(AuthError::Flow {
                code: error.code,
                message: error.message.clone(),
            });
        }
        if parsed.flow_token.is_none() {
            return Err(AuthError::Protocol(
                "flow response carried no flow token".into(),
            ));
        }
        if parsed
            .head_subtask()
            .is_some_and(|s| s.subtask_id == subtask_id::DENY_LOGIN)
        {
            return Err(AuthError::Denied);
        }

        Ok(parsed)
    }
}
