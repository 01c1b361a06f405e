use std::{fmt, ops::Deref, path::Path, str::FromStr, time::Duration};

use envconfig::Envconfig;

use crate::{query::DurationMeanMode, store::sheets::DEFAULT_API_URL};

/// A duration given in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvMsDuration(pub Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError(String);

impl fmt::Display for ParseEnvMsDurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected a number of milliseconds, got {:?}", self.0)
    }
}

impl std::error::Error for ParseEnvMsDurationError {}

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s
            .trim()
            .parse::<u64>()
            .map_err(|_| ParseEnvMsDurationError(s.to_string()))?;
        Ok(EnvMsDuration(Duration::from_millis(ms)))
    }
}

/// A string that must not be blank once trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyString(pub String);

#[derive(Debug, PartialEq, Eq)]
pub struct EmptyStringError;

impl fmt::Display for EmptyStringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value must not be empty")
    }
}

impl std::error::Error for EmptyStringError {}

impl FromStr for NonEmptyString {
    type Err = EmptyStringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EmptyStringError);
        }
        Ok(NonEmptyString(s.to_string()))
    }
}

impl Deref for NonEmptyString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    // Only needed for real uploads, a dry run never talks to the spreadsheet
    #[envconfig(from = "SPREADSHEET_ID")]
    pub spreadsheet_id: Option<NonEmptyString>,

    #[envconfig(from = "GOOGLE_APPLICATION_CREDENTIALS", default = "credentials.json")]
    pub credentials_path: String,

    // Takes precedence over the credentials file when set
    #[envconfig(from = "SHEETS_ACCESS_TOKEN")]
    pub access_token: Option<NonEmptyString>,

    #[envconfig(from = "SHEETS_API_URL", default = "https://sheets.googleapis.com")]
    pub api_url: String,

    #[envconfig(from = "WORKSHEET_TITLE", default = "Sheet1")]
    pub worksheet_title: NonEmptyString,

    #[envconfig(from = "SHEETS_REQUEST_TIMEOUT_MS", default = "30000")]
    pub request_timeout: EnvMsDuration,

    #[envconfig(from = "SHEET_GROW_ROWS", default = "1000")]
    pub grow_rows: usize,

    #[envconfig(from = "LOG_FILE_EXTENSION", default = "txt")]
    pub log_file_extension: NonEmptyString,

    #[envconfig(from = "DURATION_MEAN_MODE", default = "zero_fill")]
    pub duration_mean_mode: DurationMeanMode,

    // Daily log files go here, empty turns them off
    #[envconfig(from = "LOG_DIR", default = "logs")]
    pub log_dir: String,
}

impl Config {
    pub fn uses_default_api(&self) -> bool {
        self.api_url.trim_end_matches('/') == DEFAULT_API_URL
    }

    pub fn log_dir(&self) -> Option<&Path> {
        let dir = self.log_dir.trim();
        (!dir.is_empty()).then(|| Path::new(dir))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::init_from_hashmap(&HashMap::new()).unwrap();

        assert!(config.spreadsheet_id.is_none());
        assert!(config.access_token.is_none());
        assert_eq!(config.credentials_path, "credentials.json");
        assert!(config.uses_default_api());
        assert_eq!(&*config.worksheet_title, "Sheet1");
        assert_eq!(config.request_timeout.0, Duration::from_secs(30));
        assert_eq!(config.grow_rows, 1000);
        assert_eq!(&*config.log_file_extension, "txt");
        assert_eq!(config.duration_mean_mode, DurationMeanMode::ZeroFill);
        assert_eq!(config.log_dir(), Some(Path::new("logs")));
    }

    #[test]
    fn test_overrides() {
        let config = Config::init_from_hashmap(&env(&[
            ("SPREADSHEET_ID", "abc123"),
            ("SHEETS_ACCESS_TOKEN", "ya29.token"),
            ("SHEETS_API_URL", "http://localhost:8080/"),
            ("WORKSHEET_TITLE", "Camera logs"),
            ("SHEETS_REQUEST_TIMEOUT_MS", "1500"),
            ("SHEET_GROW_ROWS", "50"),
            ("DURATION_MEAN_MODE", "skip"),
        ]))
        .unwrap();

        assert_eq!(config.spreadsheet_id, Some(NonEmptyString("abc123".into())));
        assert_eq!(config.access_token, Some(NonEmptyString("ya29.token".into())));
        assert!(!config.uses_default_api());
        assert_eq!(&*config.worksheet_title, "Camera logs");
        assert_eq!(config.request_timeout.0, Duration::from_millis(1500));
        assert_eq!(config.grow_rows, 50);
        assert_eq!(config.duration_mean_mode, DurationMeanMode::Skip);

        let no_files = Config::init_from_hashmap(&env(&[("LOG_DIR", "")])).unwrap();
        assert_eq!(no_files.log_dir(), None);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::init_from_hashmap(&env(&[("WORKSHEET_TITLE", "  ")])).is_err());
        assert!(Config::init_from_hashmap(&env(&[("SHEETS_REQUEST_TIMEOUT_MS", "soon")])).is_err());
        assert!(Config::init_from_hashmap(&env(&[("DURATION_MEAN_MODE", "median")])).is_err());
    }

    #[test]
    fn test_env_ms_duration() {
        assert_eq!(
            " 250 ".parse::<EnvMsDuration>().unwrap(),
            EnvMsDuration(Duration::from_millis(250))
        );
        assert!("-1".parse::<EnvMsDuration>().is_err());
    }
}
