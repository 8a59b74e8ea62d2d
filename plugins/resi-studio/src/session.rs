//! Bearer-token management for the Resi Studio API.
//!
//! Resi Studio uses the OAuth 2.0 client-credentials grant: we trade the client id
//! and secret for an access token that is valid for `expires_in` seconds, and do
//! it again shortly before that runs out. There is no refresh token and no user
//! interaction involved.

use crate::error::ResiError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::instrument;

/// Re-authenticate once less than this much lifetime remains on the token.
const EXPIRY_MARGIN: Duration = Duration::from_secs(5);

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
}

impl Credentials {
    /// Returns `None` if either the id or the secret is blank.
    pub fn new(client_id: &str, client_secret: &str) -> Option<Self> {
        let client_id = client_id.trim();
        let client_secret = client_secret.trim();
        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }
        Some(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// An access token together with the instant it stops being valid.
///
/// Always replaced as a whole; a failed authentication never touches the token we
/// already hold.
#[derive(Clone)]
pub struct TimeBoundAccessToken {
    bearer: String,
    expires_at: Instant,
}

impl TimeBoundAccessToken {
    fn new(bearer: String, expires_in: Duration) -> Self {
        Self {
            bearer,
            expires_at: Instant::now() + expires_in,
        }
    }

    pub fn bearer(&self) -> &str {
        &self.bearer
    }

    /// True if the token is gone or about to be.
    pub fn needs_refresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN >= self.expires_at
    }
}

impl fmt::Debug for TimeBoundAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeBoundAccessToken")
            .field("bearer", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Serialize)]
struct ClientCredentialsGrant<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug)]
pub struct SessionManager {
    client: reqwest::Client,
    token_url: String,
    credentials: Option<Credentials>,
    token: Mutex<Option<TimeBoundAccessToken>>,
}

impl SessionManager {
    pub fn new(client: reqwest::Client, base_url: &str, credentials: Option<Credentials>) -> Self {
        Self {
            client,
            token_url: format!("{}/oauth/token", base_url.trim_end_matches('/')),
            credentials,
            token: Mutex::new(None),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Returns a bearer token that is good for at least a few more seconds,
    /// authenticating first if we have none or ours is about to expire.
    ///
    /// The token lock is held across the exchange so that concurrent callers wait
    /// for one authentication instead of each starting their own.
    #[instrument(skip(self), err(level = tracing::Level::WARN))]
    pub async fn ensure_valid_session(&self) -> Result<String, ResiError> {
        let Some(credentials) = &self.credentials else {
            return Err(ResiError::MissingCredentials);
        };

        let mut token = self.token.lock().await;
        if let Some(current) = token.as_ref()
            && !current.needs_refresh()
        {
            return Ok(current.bearer.clone());
        }

        if token.is_some() {
            tracing::warn!("access token has expired, re-authenticating");
        }

        let fresh = self.authenticate(credentials).await?;
        let bearer = fresh.bearer.clone();
        *token = Some(fresh);
        Ok(bearer)
    }

    /// The token currently held, whether or not it is still valid.
    pub async fn current_token(&self) -> Option<TimeBoundAccessToken> {
        self.token.lock().await.clone()
    }

    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<TimeBoundAccessToken, ResiError> {
        tracing::debug!(
            client_id = credentials.client_id,
            url = self.token_url,
            "authenticating with Resi Studio"
        );

        let response = self
            .client
            .post(&self.token_url)
            .json(&ClientCredentialsGrant {
                client_id: &credentials.client_id,
                client_secret: &credentials.client_secret,
                grant_type: "client_credentials",
            })
            .send()
            .await
            .map_err(|e| ResiError::AuthenticationFailed(format!("send token request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResiError::AuthenticationFailed(format!(
                "token endpoint answered {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ResiError::AuthenticationFailed(format!("read token response: {e}")))?;
        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| ResiError::AuthenticationFailed(format!("parse token response: {e}")))?;

        match (parsed.access_token, parsed.expires_in) {
            (Some(access_token), Some(expires_in)) if !access_token.is_empty() && expires_in > 0 => {
                tracing::info!(expires_in, "authenticated with Resi Studio");
                Ok(TimeBoundAccessToken::new(
                    access_token,
                    Duration::from_secs(expires_in),
                ))
            }
            _ => Err(ResiError::AuthenticationFailed(
                "response is missing the access token or its expiry time".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use pretty_assertions::assert_eq;

    fn session(server: &mockito::ServerGuard, credentials: Option<Credentials>) -> SessionManager {
        SessionManager::new(reqwest::Client::new(), &server.url(), credentials)
    }

    fn credentials() -> Option<Credentials> {
        Credentials::new("client", "secret")
    }

    #[test]
    fn blank_credentials_are_missing() {
        assert!(Credentials::new("", "secret").is_none());
        assert!(Credentials::new("client", "  ").is_none());
        assert!(Credentials::new("client", "secret").is_some());
    }

    #[tokio::test]
    async fn authenticates_once_and_reuses_token() {
        let mut server = mockito::Server::new_async().await;
        let token = server
            .mock("POST", "/oauth/token")
            .match_body(Matcher::Json(serde_json::json!({
                "client_id": "client",
                "client_secret": "secret",
                "grant_type": "client_credentials",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "tok-1", "expires_in": 3600}"#)
            .expect(1)
            .create_async()
            .await;

        let session = session(&server, credentials());
        assert_eq!(session.ensure_valid_session().await.unwrap(), "tok-1");
        assert_eq!(session.ensure_valid_session().await.unwrap(), "tok-1");
        token.assert_async().await;
    }

    #[tokio::test]
    async fn token_inside_expiry_margin_is_replaced() {
        let mut server = mockito::Server::new_async().await;
        let token = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_body(r#"{"access_token": "short-lived", "expires_in": 3}"#)
            .expect(2)
            .create_async()
            .await;

        let session = session(&server, credentials());
        session.ensure_valid_session().await.unwrap();
        session.ensure_valid_session().await.unwrap();
        token.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_credentials_store_nothing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .with_status(401)
            .create_async()
            .await;

        let session = session(&server, credentials());
        let err = session.ensure_valid_session().await.unwrap_err();
        assert!(matches!(err, ResiError::AuthenticationFailed(_)), "{err:?}");
        assert!(session.current_token().await.is_none());
    }

    #[tokio::test]
    async fn incomplete_response_keeps_prior_token() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_body(r#"{"access_token": "first", "expires_in": 1}"#)
            .expect(1)
            .create_async()
            .await;

        let session = session(&server, credentials());
        session.ensure_valid_session().await.unwrap();
        first.assert_async().await;
        first.remove_async().await;

        server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_body(r#"{"access_token": "second"}"#)
            .create_async()
            .await;

        let err = session.ensure_valid_session().await.unwrap_err();
        assert!(matches!(err, ResiError::AuthenticationFailed(_)), "{err:?}");
        let held = session.current_token().await.expect("prior token is kept");
        assert_eq!(held.bearer(), "first");
        assert!(held.needs_refresh());
    }

    #[tokio::test]
    async fn missing_credentials_skip_the_network() {
        let mut server = mockito::Server::new_async().await;
        let token = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let session = session(&server, None);
        assert!(matches!(
            session.ensure_valid_session().await,
            Err(ResiError::MissingCredentials)
        ));
        token.assert_async().await;
    }
}
