//! Session tokens
//!
//! A session is an HS256-signed JWT carrying the user id and display name.
//! The same token travels in the `session_token` cookie and in
//! `Authorization: Bearer` headers.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value of the `token_type` claim for login sessions
pub const SESSION_TOKEN_TYPE: &str = "session";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    /// Subject (user id as string)
    pub sub: String,
    pub user_id: i32,
    /// Display name at login time
    pub name: String,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time (timestamp)
    pub exp: i64,
    pub token_type: String,
}

impl SessionClaims {
    pub fn new(user_id: i32, name: impl Into<String>, validity: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id.to_string(),
            user_id,
            name: name.into(),
            iat: now.timestamp(),
            exp: (now + validity).timestamp(),
            token_type: SESSION_TOKEN_TYPE.to_string(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Session expired")]
    Expired,

    #[error("Invalid token type '{0}'")]
    WrongTokenType(String),
}

/// Issues and validates session tokens with one shared secret
pub struct SessionSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    validity: Duration,
}

impl SessionSigner {
    pub fn new(secret: &[u8], validity: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.validate_nbf = false;
        // Tokens are only good until `exp`
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            validity,
        }
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Sign a fresh session for a user
    pub fn issue(&self, user_id: i32, name: &str) -> Result<(String, SessionClaims), SessionError> {
        let claims = SessionClaims::new(user_id, name, self.validity);
        let token = self.encode(&claims)?;
        Ok((token, claims))
    }

    pub fn encode(&self, claims: &SessionClaims) -> Result<String, SessionError> {
        Ok(encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding_key,
        )?)
    }

    pub fn validate(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let claims = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)?.claims;

        if claims.is_expired() {
            return Err(SessionError::Expired);
        }
        if claims.token_type != SESSION_TOKEN_TYPE {
            return Err(SessionError::WrongTokenType(claims.token_type));
        }

        Ok(claims)
    }
}
