use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the destination spreadsheet.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("request to the spreadsheet API failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("spreadsheet API responded with {status}: {body}")]
    Api { status: u16, body: String },
    #[error("failed to authorize against the spreadsheet API: {0}")]
    Auth(#[from] AuthError),
    #[error("worksheet {0:?} not found in spreadsheet")]
    MissingSheet(String),
    #[error("invalid spreadsheet API url: {0}")]
    InvalidUrl(String),
    #[error("row {row} is beyond the sheet's {capacity} rows")]
    OutOfBounds { row: usize, capacity: usize },
}

/// Failures obtaining an access token.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("failed to read credentials file {path:?}: {source}")]
    CredentialsFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("credentials file is not a service account key: {0}")]
    InvalidCredentials(#[from] serde_json::Error),
    #[error("service account private key is unusable: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),
    #[error("token request failed: {0}")]
    TokenRequest(#[from] reqwest::Error),
    #[error("token endpoint responded with {status}: {body}")]
    TokenRejected { status: u16, body: String },
}

/// Failures listing log files.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("log directory {0:?} not found")]
    MissingDirectory(PathBuf),
    #[error("log file {0:?} is not in the log directory")]
    UnknownKey(String),
    #[error("failed to list log directory: {0}")]
    Io(#[from] std::io::Error),
}

// Use .user_error() to inject a user facing error message into the error chain
// Our main thread can extract this from an error chain and display it to the user
#[derive(Error, Debug, Clone)]
#[error("User Error: {msg}")]
pub struct UserError {
    pub msg: String,
}

impl UserError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

pub trait ToUserError<T> {
    fn user_error(self, msg: impl Into<String>) -> anyhow::Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ToUserError<T> for Result<T, E> {
    fn user_error(self, msg: impl Into<String>) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::Error::from(e).context(UserError::new(msg)))
    }
}

pub fn get_user_message(error: &anyhow::Error) -> &str {
    for cause in error.chain() {
        if let Some(user_error) = cause.downcast_ref::<UserError>() {
            return &user_error.msg;
        }
    }
    "An unknown error occurred"
}
