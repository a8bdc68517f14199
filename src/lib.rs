//! Authentication flow engine for the undocumented X/Twitter web API.
//!
//! The private web API gates login behind a server-driven, multi-round
//! challenge/response flow: each round queues a named *subtask* that must be
//! answered with a matching payload before the next round is revealed. This
//! crate drives that flow end to end:
//!
//! - **Flow transport**: executes one round against the onboarding endpoint,
//!   absorbs session cookies from every response, and resubmits throttled
//!   rounds under an injectable rate-limit strategy.
//! - **Subtask handlers**: a registry maps subtask identifiers to handler
//!   capabilities, preloaded with the known login vocabulary (password,
//!   identifier, two-factor, instrumentation, ...) and extensible by
//!   callers at runtime.
//! - **Session lifecycle**: guest-token activation, credential
//!   verification, and best-effort logout over one owned session state.
//! - **Secret hygiene**: request payloads are only ever logged through a
//!   redacted projection; in-memory secrets are wrapped so `Debug` cannot
//!   leak them.
//!
//! ```rust,ignore
//! use xflow::{AuthConfig, Credentials, UserAuth};
//!
//! let mut auth = UserAuth::new(AuthConfig::default())?;
//! let credentials = Credentials::new("handle", "password")
//!     .with_email("handle@example.com")
//!     .with_totp_secret("JBSWY3DPEHPK3PXP");
//! auth.login(&credentials).await?;
//! assert!(auth.session().authenticated());
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod auth;
mod config;
mod cookies;
mod credentials;
mod error;
mod flow;
mod handlers;
mod http;
mod ratelimit;
mod totp;
mod transport;

pub use auth::{Session, UserAuth};
pub use config::{AuthConfig, WEB_BEARER_TOKEN};
pub use cookies::CookieJar;
pub use credentials::Credentials;
pub use error::{AuthError, AuthResult, FlowResult};
pub use flow::{subtask_id, FlowError, FlowRequest, FlowResponse, Subtask, REDACTED};
pub use handlers::{HandlerApi, HandlerRegistry, SubtaskHandler};
pub use http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use ratelimit::{RateLimitEvent, RateLimitInfo, RateLimitStrategy, WaitUntilReset};
