//! Federated login through external identity providers
//!
//! Each provider implements the authorization-code flow: the browser is sent
//! to [`IdentityProvider::authorize_url`], comes back with a `code`, and
//! [`IdentityProvider::exchange`] turns that code into a
//! [`FederatedIdentity`].

use std::fmt;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

const FACEBOOK_AUTHORIZE_URL: &str = "https://www.facebook.com/v18.0/dialog/oauth";
const FACEBOOK_TOKEN_URL: &str = "https://graph.facebook.com/v18.0/oauth/access_token";
const FACEBOOK_PROFILE_URL: &str = "https://graph.facebook.com/me";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Facebook,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Facebook => "facebook",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a provider asserts about the person who just signed in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub provider: Provider,
    /// Stable account id at the provider
    pub subject: String,
    pub email: String,
    /// Whether the provider vouches that `email` belongs to this account
    pub email_verified: bool,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("HTTP request to identity provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid provider URL: {0}")]
    Url(String),

    #[error("Identity provider rejected the request: {0}")]
    Rejected(String),

    #[error("Identity provider did not return an email address")]
    MissingEmail,
}

/// Client id and secret registered with a provider
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl OAuthCredentials {
    /// Both halves must be present for a provider to be enabled
    pub fn from_parts(client_id: Option<String>, client_secret: Option<String>) -> Option<Self> {
        match (client_id, client_secret) {
            (Some(client_id), Some(client_secret))
                if !client_id.is_empty() && !client_secret.is_empty() =>
            {
                Some(Self {
                    client_id,
                    client_secret,
                })
            }
            _ => None,
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn provider(&self) -> Provider;

    /// URL the browser is redirected to in order to sign in
    fn authorize_url(&self, state: &str, redirect_uri: &str) -> Result<String, OAuthError>;

    /// Trade the authorization code for the signed-in identity
    async fn exchange(&self, code: &str, redirect_uri: &str)
        -> Result<FederatedIdentity, OAuthError>;
}

/// Random value for the OAuth `state` parameter
pub fn new_oauth_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

async fn read_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, OAuthError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(OAuthError::Rejected(format!("{}: {}", status, body)));
    }
    Ok(response.json::<T>().await?)
}

/// Google sign-in (OpenID Connect userinfo)
pub struct GoogleProvider {
    credentials: OAuthCredentials,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
}

impl GoogleProvider {
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            credentials,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    fn authorize_url(&self, state: &str, redirect_uri: &str) -> Result<String, OAuthError> {
        let url = Url::parse_with_params(
            GOOGLE_AUTHORIZE_URL,
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
                ("prompt", "select_account"),
            ],
        )
        .map_err(|e| OAuthError::Url(e.to_string()))?;
        Ok(url.to_string())
    }

    async fn exchange(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<FederatedIdentity, OAuthError> {
        let token: TokenResponse = read_json(
            self.http
                .post(GOOGLE_TOKEN_URL)
                .form(&[
                    ("code", code),
                    ("client_id", self.credentials.client_id.as_str()),
                    ("client_secret", self.credentials.client_secret.as_str()),
                    ("redirect_uri", redirect_uri),
                    ("grant_type", "authorization_code"),
                ])
                .send()
                .await?,
        )
        .await?;

        let info: GoogleUserInfo = read_json(
            self.http
                .get(GOOGLE_USERINFO_URL)
                .bearer_auth(&token.access_token)
                .send()
                .await?,
        )
        .await?;

        debug!(subject = %info.sub, verified = info.email_verified, "Google userinfo received");

        let email = info.email.ok_or(OAuthError::MissingEmail)?;
        Ok(FederatedIdentity {
            provider: Provider::Google,
            name: info.name.unwrap_or_else(|| email.clone()),
            subject: info.sub,
            email,
            email_verified: info.email_verified,
        })
    }
}

/// Facebook login (Graph API)
pub struct FacebookProvider {
    credentials: OAuthCredentials,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct FacebookProfile {
    id: String,
    email: Option<String>,
    name: Option<String>,
}

impl FacebookProvider {
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            credentials,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl IdentityProvider for FacebookProvider {
    fn provider(&self) -> Provider {
        Provider::Facebook
    }

    fn authorize_url(&self, state: &str, redirect_uri: &str) -> Result<String, OAuthError> {
        let url = Url::parse_with_params(
            FACEBOOK_AUTHORIZE_URL,
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", "email,public_profile"),
                ("state", state),
            ],
        )
        .map_err(|e| OAuthError::Url(e.to_string()))?;
        Ok(url.to_string())
    }

    async fn exchange(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<FederatedIdentity, OAuthError> {
        let token: TokenResponse = read_json(
            self.http
                .get(FACEBOOK_TOKEN_URL)
                .query(&[
                    ("client_id", self.credentials.client_id.as_str()),
                    ("client_secret", self.credentials.client_secret.as_str()),
                    ("redirect_uri", redirect_uri),
                    ("code", code),
                ])
                .send()
                .await?,
        )
        .await?;

        let profile: FacebookProfile = read_json(
            self.http
                .get(FACEBOOK_PROFILE_URL)
                .query(&[
                    ("fields", "id,name,email"),
                    ("access_token", token.access_token.as_str()),
                ])
                .send()
                .await?,
        )
        .await?;

        debug!(subject = %profile.id, "Facebook profile received");

        // Graph only returns emails the user has confirmed with Facebook
        let email = profile.email.ok_or(OAuthError::MissingEmail)?;
        Ok(FederatedIdentity {
            provider: Provider::Facebook,
            name: profile.name.unwrap_or_else(|| email.clone()),
            subject: profile.id,
            email,
            email_verified: true,
        })
    }
}
