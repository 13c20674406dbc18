//! Google OAuth token exchanger: builds the authorization URL and performs
//! the code-exchange and refresh grants against the token endpoint.
//!
//! Construct [`GoogleExchanger`] from environment variables
//! (`GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`). All transport and error
//! mapping is encapsulated here; the core only sees the
//! [`TokenExchanger`] contract.

use std::env;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info};

use drive_relay_core::contract::{unix_now, AuthError, TokenExchanger, TokenGrant};

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";
// Percent-encoded forms for assembling the authorization URL by hand.
const REDIRECT_URI_ENCODED: &str = "urn%3Aietf%3Awg%3Aoauth%3A2.0%3Aoob";
const SCOPE_ENCODED: &str = "https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fdrive";

pub struct GoogleExchanger {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl GoogleExchanger {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn new_from_env() -> anyhow::Result<Self> {
        let client_id = env::var("GOOGLE_CLIENT_ID").map_err(|e| {
            tracing::error!(error = ?e, "GOOGLE_CLIENT_ID missing in environment");
            anyhow::anyhow!("GOOGLE_CLIENT_ID missing in environment")
        })?;
        let client_secret = env::var("GOOGLE_CLIENT_SECRET").map_err(|e| {
            tracing::error!(error = ?e, "GOOGLE_CLIENT_SECRET missing in environment");
            anyhow::anyhow!("GOOGLE_CLIENT_SECRET missing in environment")
        })?;
        tracing::info!(client_id_set = !client_id.is_empty(), "Initialized GoogleExchanger from environment");
        Ok(Self::new(client_id, client_secret))
    }

    async fn token_grant(&self, params: &[(&str, &str)]) -> Result<TokenGrant, String> {
        let resp = self
            .client
            .post(TOKEN_ENDPOINT)
            .form(params)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("status {status}: {body}"));
        }
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| format!("malformed token response: {e}"))?;
        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires_in.map(|secs| unix_now() + secs),
        })
    }
}

#[async_trait]
impl TokenExchanger for GoogleExchanger {
    fn authorization_url(&self) -> String {
        format!(
            "{AUTH_ENDPOINT}?client_id={}&redirect_uri={REDIRECT_URI_ENCODED}&response_type=code&scope={SCOPE_ENCODED}&access_type=offline&prompt=consent",
            self.client_id
        )
    }

    async fn exchange(&self, code: &str) -> Result<TokenGrant, AuthError> {
        info!("exchanging authorization code");
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", REDIRECT_URI),
        ];
        match self.token_grant(&params).await {
            Ok(grant) => {
                info!("token exchange succeeded");
                Ok(grant)
            }
            Err(detail) => {
                error!(detail = %detail, "token exchange rejected");
                Err(AuthError::Exchange(detail))
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        info!("refreshing access token");
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        match self.token_grant(&params).await {
            Ok(grant) => Ok(grant),
            Err(detail) => {
                error!(detail = %detail, "token refresh rejected");
                Err(AuthError::Refresh(detail))
            }
        }
    }
}
