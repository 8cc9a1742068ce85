//! Credential checks for REST requests and realtime handshakes.

pub mod jwt;
pub mod middleware;

use jsonwebtoken::errors::ErrorKind;
use thiserror::Error;

/// Why a handshake credential was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credential")]
    Missing,
    #[error("credential expired")]
    Expired,
    #[error("invalid credential")]
    Invalid,
}

/// Verify a handshake credential and return the identity it carries.
///
/// Nothing about the connection is registered until this succeeds.
pub fn authenticate(secret: &[u8], token: Option<&str>) -> Result<String, AuthError> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::Missing)?;

    let claims = jwt::validate_access_token(secret, token).map_err(|err| match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        _ => AuthError::Invalid,
    })?;

    if claims.sub.is_empty() {
        return Err(AuthError::Invalid);
    }
    Ok(claims.sub)
}
