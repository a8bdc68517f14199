//! Time-based one-time code generation for the two-factor subtask.

use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::{AuthError, AuthResult};

/// Build the RFC 6238 generator for a base32 seed.
///
/// Seeds are normalized the way authenticator apps accept them: whitespace
/// and dashes stripped, case-folded to upper.
fn build_totp(seed: &str) -> AuthResult<TOTP> {
    let normalized: String = seed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .to_uppercase();

    let secret = Secret::Encoded(normalized)
        .to_bytes()
        .map_err(|err| AuthError::Credential(format!("TOTP seed is not valid base32: {err:?}")))?;

    TOTP::new(Algorithm::SHA1, 6, 1, 30, secret)
        .map_err(|err| AuthError::Credential(format!("TOTP seed rejected: {err}")))
}

/// Generate the code for the current 30-second window.
pub(crate) fn generate_code(seed: &str) -> AuthResult<String> {
    let totp = build_totp(seed)?;
    totp.generate_current()
        .map_err(|err| AuthError::Credential(format!("system clock unavailable: {err}")))
}
