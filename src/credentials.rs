//! Login credentials for one authentication attempt.

use secrecy::{ExposeSecret, SecretString};

/// Immutable login inputs for a single login attempt.
///
/// Secrets are wrapped so accidental `Debug` output cannot leak them; the
/// wire-level counterpart is the redaction applied in [`crate::flow`].
/// Credentials are never persisted by the engine.
#[derive(Debug)]
pub struct Credentials {
    username: String,
    password: SecretString,
    email: Option<String>,
    totp_secret: Option<SecretString>,
}

impl Credentials {
    /// Create credentials from the identifier and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
            email: None,
            totp_secret: None,
        }
    }

    /// Attach the recovery email used for alternate-identifier and identity
    /// confirmation subtasks.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Attach the base32 TOTP seed used for the two-factor subtask.
    #[must_use]
    pub fn with_totp_secret(mut self, secret: impl Into<String>) -> Self {
        self.totp_secret = Some(SecretString::from(secret.into()));
        self
    }

    /// The login identifier (username, email, or phone).
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The account password.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// The recovery email, if provided.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// The TOTP seed, if provided.
    #[must_use]
    pub fn totp_secret(&self) -> Option<&str> {
        self.totp_secret.as_ref().map(|s| s.expose_secret())
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self {
            username: self.username.clone(),
            password: SecretString::from(self.password.expose_secret().to_owned()),
            email: self.email.clone(),
            totp_secret: self
                .totp_secret
                .as_ref()
                .map(|s| SecretString::from(s.expose_secret().to_owned())),
        }
    }
}
