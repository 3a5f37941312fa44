//! OAuth relay for the music provider's three-legged authorization-code
//! flow: build the consent-screen redirect, then exchange the callback
//! code for an access token with client-credential Basic auth.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Scopes needed to read the user's id and create playlists on their behalf.
const SCOPES: &str = "playlist-modify-public playlist-modify-private user-read-private";

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_endpoint: String,
    pub token_endpoint: String,
    pub redirect_uri: String,
    pub frontend_url: String,
}

pub struct OAuthRelay {
    client: reqwest::Client,
    config: OAuthConfig,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

impl OAuthRelay {
    pub fn new(config: OAuthConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("moodlist/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self { client, config })
    }

    /// Build the provider's consent-screen URL with the five fixed
    /// authorize parameters.
    pub fn authorize_url(&self) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&show_dialog=true",
            self.config.authorize_endpoint,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(SCOPES),
        )
    }

    /// Where the browser lands after a successful exchange: the front-end
    /// origin with the token appended.
    pub fn frontend_redirect(&self, access_token: &str) -> String {
        format!(
            "{}/?access_token={}",
            self.config.frontend_url,
            urlencoding::encode(access_token)
        )
    }

    /// Exchange an authorization code for an access token.
    pub async fn exchange_code(&self, code: &str) -> Result<String> {
        tracing::debug!("Exchanging authorization code for access token");

        let response = self
            .client
            .post(&self.config.token_endpoint)
            .header("Authorization", self.basic_auth_header())
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &self.config.redirect_uri),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::TokenExchange(format!(
                "provider returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await?;
        token.access_token.ok_or_else(|| {
            AppError::TokenExchange("no access_token in provider response".to_string())
        })
    }

    fn basic_auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.config.client_id, self.config.client_secret);
        format!("Basic {}", BASE64.encode(credentials))
    }
}
