use anyhow::{Context, Error};
use tracing::info;

use crate::{
    config::Config,
    store::{
        auth::{ServiceAccount, StaticToken, TokenProvider},
        SheetsClient,
    },
};

pub struct AppContext {
    pub config: Config,
    pub client: reqwest::blocking::Client,
}

impl AppContext {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout.0)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    pub fn token_provider(&self) -> Result<Box<dyn TokenProvider>, Error> {
        if let Some(token) = &self.config.access_token {
            info!("using access token from the environment");
            return Ok(Box::new(StaticToken(token.0.clone())));
        }

        let account = ServiceAccount::from_file(&self.config.credentials_path, self.client.clone())
            .with_context(|| {
                format!(
                    "Failed to load service account credentials from {}",
                    self.config.credentials_path
                )
            })?;
        Ok(Box::new(account))
    }

    /// The configured worksheet of the configured spreadsheet.
    pub fn sheets_client(&self) -> Result<SheetsClient, Error> {
        let spreadsheet_id = self
            .config
            .spreadsheet_id
            .as_ref()
            .context("SPREADSHEET_ID must be set to upload")?;

        if !self.config.uses_default_api() {
            info!("using spreadsheet API at {}", self.config.api_url);
        }

        let client = SheetsClient::new(
            self.client.clone(),
            &self.config.api_url,
            spreadsheet_id.0.clone(),
            self.config.worksheet_title.0.clone(),
            self.token_provider()?,
        )?;
        Ok(client)
    }
}
