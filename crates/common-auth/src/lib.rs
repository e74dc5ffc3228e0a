//! Authentication token primitives shared by the customer services.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Token value handed to the hosting platform's caller.
pub const DEFAULT_PLACEHOLDER_TOKEN: &str = "jwt-token-exemplo";

/// Errors raised while issuing or checking a token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The provided token failed basic validation rules.
    #[error("token validation failed: {0}")]
    Validation(String),
    /// The issuer could not produce a token for the subject.
    #[error("token issuance failed: {0}")]
    Issuance(String),
}

/// An opaque bearer token. Serialises as a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capability to mint a token for an authenticated subject.
///
/// Real deployments plug a signing issuer in here; the handlers only rely on
/// getting a token-shaped value back.
pub trait TokenIssuer<S: ?Sized>: Send + Sync {
    fn issue(&self, subject: &S) -> Result<Token, AuthError>;
}

/// Issues the same fixed token for every subject.
///
/// Not a credential. Stands in until a signing issuer is wired up.
#[derive(Debug, Clone)]
pub struct PlaceholderTokenIssuer {
    value: String,
}

impl PlaceholderTokenIssuer {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl Default for PlaceholderTokenIssuer {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER_TOKEN)
    }
}

impl<S: ?Sized> TokenIssuer<S> for PlaceholderTokenIssuer {
    fn issue(&self, _subject: &S) -> Result<Token, AuthError> {
        validate_token(&self.value).map_err(|err| AuthError::Issuance(err.to_string()))?;
        Ok(Token::new(self.value.clone()))
    }
}

/// Verifies a raw authentication token is at least present.
pub fn validate_token(token: &str) -> Result<(), AuthError> {
    if token.trim().is_empty() {
        return Err(AuthError::Validation("token is empty".to_string()));
    }
    Ok(())
}
