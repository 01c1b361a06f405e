use std::{
    fs::{File, OpenOptions},
    path::Path,
    sync::Mutex,
};

use chrono::{Local, NaiveDate};
use envconfig::Envconfig;
use summary_log_uploader::{
    cmd::Cli,
    config::Config,
    error::{get_user_message, ToUserError},
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn log_file_name(day: NaiveDate) -> String {
    format!("uploader_{}.log", day.format("%Y%m%d"))
}

fn open_log_file(dir: &Path, day: NaiveDate) -> std::io::Result<File> {
    std::fs::create_dir_all(dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(log_file_name(day)))
}

fn setup_tracing(log_dir: Option<&Path>) {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter());

    let (file, file_error) = match log_dir.map(|dir| open_log_file(dir, Local::now().date_naive())) {
        Some(Ok(file)) => (Some(file), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };
    let file_layer = file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .with_filter(env_filter())
    });

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        warn!("Logging to stderr only, could not open a log file: {}", e);
    }
}

fn main() {
    let config = Config::init_from_env();
    setup_tracing(config.as_ref().ok().and_then(Config::log_dir));

    let result = config
        .user_error("Invalid configuration")
        .and_then(|config| Cli::run(&config));

    match result {
        Ok(()) => info!("Done"),
        Err(e) => {
            // A developer can tag an error with a user facing message, which we show on its own line
            error!("{}", get_user_message(&e));
            error!("{:?}", e);
            std::process::exit(1);
        }
    }
}
