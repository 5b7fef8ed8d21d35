//! Google OAuth 2.0 for installed applications.
//!
//! `setup` stores the OAuth client credentials, `authenticate` runs the
//! browser consent flow against a loopback redirect and stores the tokens,
//! and [`Authenticator`] hands out access tokens during a transfer,
//! refreshing them as they expire.

pub mod error;
pub mod loopback;
pub mod store;

use std::io::{self, Write};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

pub use self::error::AuthError;
use self::loopback::LoopbackServer;
pub use self::store::{ClientCredentials, CredentialStore, StoredToken};

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const PHOTOS_SCOPE: &str = "https://www.googleapis.com/auth/photoslibrary.appendonly";

/// Source of bearer tokens for destination API calls.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

/// A fixed token.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[cfg(test)]
#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    /// Convert into a stored token, keeping `previous_refresh` when the
    /// endpoint did not issue a new refresh token.
    fn into_stored(self, previous_refresh: Option<String>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: Utc::now() + chrono::Duration::seconds(self.expires_in.unwrap_or(3600)),
            scope: self.scope,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Hands out access tokens from the credential store, refreshing them with
/// the stored refresh token when they are about to expire.
///
/// Nothing is read from disk until the first token is requested, so a dry
/// run can construct a destination client without any credentials.
pub struct Authenticator {
    store: CredentialStore,
    http: reqwest::Client,
    state: Mutex<Option<(ClientCredentials, StoredToken)>>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(store: CredentialStore) -> Self {
        Self {
            store,
            http: reqwest::Client::new(),
            state: Mutex::new(None),
        }
    }

    /// Load credentials and a usable token now, so configuration problems
    /// surface before any album is touched.
    pub async fn ensure_ready(&self) -> Result<(), AuthError> {
        self.access_token().await.map(|_| ())
    }
}

#[async_trait]
impl TokenProvider for Authenticator {
    async fn access_token(&self) -> Result<String, AuthError> {
        let mut state = self.state.lock().await;
        if state.is_none() {
            let credentials = self.store.load_credentials().await?;
            let token = self.store.load_token().await?;
            *state = Some((credentials, token));
        }
        let Some((credentials, token)) = state.as_mut() else {
            return Err(AuthError::NotAuthenticated);
        };

        if token.needs_refresh(Utc::now()) {
            tracing::debug!("Access token expired, refreshing");
            let refreshed = refresh_token(&self.http, credentials, token).await?;
            self.store.save_token(&refreshed).await?;
            *token = refreshed;
        }
        Ok(token.access_token.clone())
    }
}

/// PKCE verifier/challenge pair (RFC 7636, S256).
struct Pkce {
    verifier: String,
    challenge: String,
}

impl Pkce {
    fn generate() -> Self {
        let verifier = random_token(64);
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

fn random_token(len: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

fn consent_url(client_id: &str, redirect_uri: &str, state: &str, challenge: &str) -> String {
    let mut url = url::Url::parse(AUTH_ENDPOINT).unwrap_or_else(|_| unreachable!("static URL"));
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", PHOTOS_SCOPE)
        .append_pair("state", state)
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent");
    url.into()
}

async fn token_request(
    http: &reqwest::Client,
    form: &[(&str, &str)],
) -> Result<TokenResponse, AuthError> {
    let response = http.post(TOKEN_ENDPOINT).form(form).send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        let message = serde_json::from_str::<TokenErrorResponse>(&body)
            .map(|e| e.error_description.unwrap_or(e.error))
            .unwrap_or(body);
        return Err(AuthError::TokenEndpoint {
            status: status.as_u16(),
            message,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

async fn refresh_token(
    http: &reqwest::Client,
    credentials: &ClientCredentials,
    token: &StoredToken,
) -> Result<StoredToken, AuthError> {
    let refresh = token
        .refresh_token
        .as_deref()
        .ok_or(AuthError::NoRefreshToken)?;
    let response = token_request(
        http,
        &[
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("refresh_token", refresh),
            ("grant_type", "refresh_token"),
        ],
    )
    .await?;
    Ok(response.into_stored(token.refresh_token.clone()))
}

/// Store OAuth client credentials, prompting for whichever are missing.
pub async fn setup(
    store: &CredentialStore,
    client_id: Option<String>,
    client_secret: Option<String>,
) -> anyhow::Result<()> {
    let client_id = match client_id {
        Some(id) => id,
        None => {
            tokio::task::spawn_blocking(|| {
                print!("OAuth client ID: ");
                io::stdout().flush()?;
                let mut line = String::new();
                io::stdin().read_line(&mut line)?;
                Ok::<String, io::Error>(line.trim().to_string())
            })
            .await??
        }
    };
    let client_secret = match client_secret {
        Some(secret) => secret,
        None => tokio::task::spawn_blocking(|| rpassword::prompt_password("OAuth client secret: "))
            .await??
            .trim()
            .to_string(),
    };
    if client_id.is_empty() || client_secret.is_empty() {
        anyhow::bail!("Client ID and client secret must not be empty");
    }

    store
        .save_credentials(&ClientCredentials {
            client_id,
            client_secret,
        })
        .await?;
    tracing::info!(
        "Saved OAuth client credentials to {}",
        store.credentials_path().display()
    );
    Ok(())
}

/// Run the browser consent flow and store the resulting tokens.
///
/// 1. Bind a loopback port to receive the redirect.
/// 2. Print the consent URL (with PKCE challenge and random state).
/// 3. Wait for the redirect or the timeout, whichever comes first.
/// 4. Exchange the code for tokens and persist them.
pub async fn authenticate(store: &CredentialStore, timeout: Duration) -> anyhow::Result<()> {
    let credentials = store.load_credentials().await?;
    let server = LoopbackServer::bind().await?;
    let redirect_uri = server.redirect_uri();
    let state = random_token(32);
    let pkce = Pkce::generate();

    println!("Open this URL in your browser to authorize access to Google Photos:");
    println!();
    println!(
        "  {}",
        consent_url(&credentials.client_id, &redirect_uri, &state, &pkce.challenge)
    );
    println!();
    tracing::info!(
        "Waiting up to {}s for the authorization redirect on {}",
        timeout.as_secs(),
        redirect_uri
    );

    let code = server.wait_for_code(&state, timeout).await?;
    tracing::debug!("Received authorization code, exchanging for tokens");

    let http = reqwest::Client::new();
    let response = token_request(
        &http,
        &[
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("code", code.as_str()),
            ("code_verifier", pkce.verifier.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ],
    )
    .await?;
    let token = response.into_stored(None);
    if token.refresh_token.is_none() {
        tracing::warn!("No refresh token issued; you will need to re-authenticate when it expires");
    }
    store.save_token(&token).await?;
    tracing::info!("Authentication completed successfully");
    Ok(())
}
