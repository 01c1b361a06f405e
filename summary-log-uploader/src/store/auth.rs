use std::{path::Path, sync::Mutex};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AuthError;

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECONDS: i64 = 3600;
// Refresh a little early so a token never expires mid-request
const EXPIRY_MARGIN_SECONDS: i64 = 60;

pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Result<String, AuthError>;
}

/// A token issued out of band, used as-is.
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.0.clone())
    }
}

/// The parts of a service account key file we need.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|source| AuthError::CredentialsFile {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Exchanges a signed service account assertion for an access token, and keeps it
/// until shortly before it expires.
pub struct ServiceAccount {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    client: reqwest::blocking::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccount {
    pub fn new(key: ServiceAccountKey, client: reqwest::blocking::Client) -> Result<Self, AuthError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        info!("using service account {}", key.client_email);
        Ok(Self {
            key,
            encoding_key,
            client,
            cached: Mutex::new(None),
        })
    }

    pub fn from_file(
        path: impl AsRef<Path>,
        client: reqwest::blocking::Client,
    ) -> Result<Self, AuthError> {
        Self::new(ServiceAccountKey::from_file(path)?, client)
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SPREADSHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECONDS,
        };
        Ok(encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    fn request_token(&self) -> Result<CachedToken, AuthError> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::TokenRejected {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let token: TokenResponse = response.json()?;
        debug!("obtained access token valid for {}s", token.expires_in);
        Ok(CachedToken {
            token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in - EXPIRY_MARGIN_SECONDS),
        })
    }
}

impl TokenProvider for ServiceAccount {
    fn access_token(&self) -> Result<String, AuthError> {
        // A poisoned lock only means a previous refresh panicked, the cache itself is still usable
        let mut cached = self
            .cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(token) = cached.as_ref().filter(|t| t.expires_at > Utc::now()) {
            return Ok(token.token.clone());
        }

        let fresh = self.request_token()?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}
