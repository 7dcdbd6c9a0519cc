//! OAuth2 authorization-code flow for Dropbox apps.

use std::io::{stdin, stdout, BufRead, Write};

use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::client::DropboxClient;
use crate::config::{Config, Endpoints};
use crate::error::{DropboxError, Result};
use crate::models::{TokenPair, TokenResponse};
use crate::prompt;

/// OAuth2 error body returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchanges an app key/secret for access tokens.
#[derive(Clone)]
pub struct Authenticator {
    app_key: String,
    app_secret: String,
    endpoints: Endpoints,
    http: Client,
}

impl Authenticator {
    /// Create a new authenticator against the public Dropbox endpoints.
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self::with_endpoints(app_key, app_secret, Endpoints::default())
    }

    pub fn with_endpoints(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        endpoints: Endpoints,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            endpoints,
            http: Client::new(),
        }
    }

    /// URL the user visits to grant access. Requests offline access so a
    /// refresh token is issued alongside the access token.
    pub fn authorize_url(&self) -> Result<String> {
        let url = Url::parse_with_params(
            &self.endpoints.authorize,
            &[
                ("client_id", self.app_key.as_str()),
                ("response_type", "code"),
                ("token_access_type", "offline"),
            ],
        )
        .map_err(|e| DropboxError::AuthenticationError(e.to_string()))?;
        Ok(url.to_string())
    }

    /// Exchange an authorization code for a token pair.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenPair> {
        let params: [(&str, &str); 4] = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.app_key.as_str()),
            ("client_secret", self.app_secret.as_str()),
        ];
        let response = self.request_token(&params).await?;
        Ok(response.into())
    }

    /// Obtain a fresh access token from a refresh token. The refresh token
    /// itself is carried over unchanged.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let params: [(&str, &str); 4] = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.app_key.as_str()),
            ("client_secret", self.app_secret.as_str()),
        ];
        let response = self.request_token(&params).await?;
        Ok(TokenPair {
            access_token: response.access_token,
            refresh_token: Some(refresh_token.to_string()),
        })
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> Result<TokenResponse> {
        debug!(grant_type = params[0].1, "requesting OAuth2 token");

        let response = self
            .http
            .post(format!("{}/oauth2/token", self.endpoints.api))
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<OAuthErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                },
                Err(_) => body,
            };
            return Err(DropboxError::TokenExchangeError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Run the no-redirect flow on the console: print the authorization URL,
    /// read the code the user pastes back and exchange it.
    pub async fn interactive_authorize(&self) -> Result<TokenPair> {
        let code = {
            let mut input = stdin().lock();
            self.prompt_for_code(&mut input, &mut stdout())?
        };
        self.exchange_code(&code).await
    }

    /// Same as [`Authenticator::interactive_authorize`], reading the code
    /// from `input` and writing instructions to `output`.
    pub async fn interactive_authorize_with<R: BufRead, W: Write>(
        &self,
        input: &mut R,
        output: &mut W,
    ) -> Result<TokenPair> {
        let code = self.prompt_for_code(input, output)?;
        self.exchange_code(&code).await
    }

    fn prompt_for_code<R: BufRead, W: Write>(
        &self,
        input: &mut R,
        output: &mut W,
    ) -> Result<String> {
        let url = self.authorize_url()?;
        let io_error = |e: std::io::Error| DropboxError::AuthenticationError(e.to_string());

        writeln!(output, "1. Go to: {}", url).map_err(io_error)?;
        writeln!(output, "2. Click \"Allow\" (you might have to log in first).")
            .map_err(io_error)?;
        writeln!(output, "3. Copy the authorization code.").map_err(io_error)?;
        let code = prompt::prompt(input, output, "Enter the authorization code here: ")
            .map_err(io_error)?;

        if code.is_empty() {
            return Err(DropboxError::AuthenticationError(
                "no authorization code entered".to_string(),
            ));
        }
        Ok(code)
    }
}

/// Build an authenticated client from the configured credentials.
///
/// With no tokens at all the interactive flow runs. With only a refresh
/// token a new access token is fetched first. An access token is used as
/// given; expiry is not checked.
pub async fn resolve_client(config: &Config) -> Result<DropboxClient> {
    let tokens = match (&config.access_token, &config.refresh_token) {
        (Some(access), refresh) => TokenPair {
            access_token: access.clone(),
            refresh_token: refresh.clone(),
        },
        (None, refresh) => {
            let auth = authenticator(config)?;
            match refresh {
                Some(refresh) => {
                    debug!("no access token configured, refreshing");
                    auth.refresh(refresh).await?
                }
                None => auth.interactive_authorize().await?,
            }
        }
    };

    Ok(DropboxClient::with_endpoints(tokens, config.endpoints.clone()))
}

/// Authenticator for the configured app, failing when key or secret is missing.
pub fn authenticator(config: &Config) -> Result<Authenticator> {
    let app_key = config
        .app_key
        .clone()
        .ok_or_else(|| DropboxError::MissingCredential("app key (DROPBOX_KEY)".to_string()))?;
    let app_secret = config.app_secret.clone().ok_or_else(|| {
        DropboxError::MissingCredential("app secret (DROPBOX_SECRET)".to_string())
    })?;
    Ok(Authenticator::with_endpoints(
        app_key,
        app_secret,
        config.endpoints.clone(),
    ))
}
