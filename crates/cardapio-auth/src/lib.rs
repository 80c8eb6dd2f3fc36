//! Authentication building blocks for the cardápio backend
//!
//! - [`password`]: Argon2id hashing of login secrets
//! - [`session`]: signed session tokens (HS256 JWT)
//! - [`oauth`]: federated identity types and the Google/Facebook clients

pub mod oauth;
pub mod password;
pub mod session;

pub use oauth::{
    new_oauth_state, FacebookProvider, FederatedIdentity, GoogleProvider, IdentityProvider,
    OAuthCredentials, OAuthError, Provider,
};
pub use password::{hash_password, verify_password, PasswordError};
pub use session::{SessionClaims, SessionError, SessionSigner, SESSION_TOKEN_TYPE};

// Re-export useful types
pub use async_trait::async_trait;
