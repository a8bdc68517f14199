//! Authentication engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bearer token issued to the official web client. The private API accepts
/// only this value for guest-mode calls, so it doubles as a protocol
/// constant rather than a per-deployment secret.
pub const WEB_BEARER_TOKEN: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

/// Configuration for the authentication engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token for guest-mode authorization
    #[serde(default = "default_bearer_token")]
    pub bearer_token: String,

    /// Base URL for the private API (default: https://api.twitter.com)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Browser-emulation user agent sent on every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Client language reported to the endpoint
    #[serde(default = "default_language")]
    pub language: String,

    /// Request timeout
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,
}

fn default_bearer_token() -> String {
    WEB_BEARER_TOKEN.into()
}

fn default_api_url() -> String {
    "https://api.twitter.com".into()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36"
        .into()
}

fn default_language() -> String {
    "en".into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bearer_token: default_bearer_token(),
            api_url: default_api_url(),
            user_agent: default_user_agent(),
            language: default_language(),
            timeout: default_timeout(),
        }
    }
}
