use crate::errors::AppError;
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_url: String,
    pub rust_log: String,
    pub log_format: LogFormat,
    /// Longest the runner sleeps when nothing is scheduled.
    pub scheduler_idle: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let db_url = env::var("DATABASE_URL").unwrap_or("sqlite:./scheduler.db".to_string());

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("text") | Err(_) => LogFormat::Text,
            Ok(other) => {
                return Err(AppError::Config(format!(
                    "LOG_FORMAT '{}' is not one of 'text' or 'json'",
                    other
                )));
            }
        };

        let scheduler_idle = match env::var("SCHEDULER_IDLE_SECS") {
            Ok(secs) => secs.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                AppError::Config(format!(
                    "SCHEDULER_IDLE_SECS '{}' is not a number of seconds",
                    secs
                ))
            })?,
            Err(_) => Duration::from_secs(3600), // Default
        };

        Ok(Config {
            db_url,
            rust_log,
            log_format,
            scheduler_idle,
        })
    }
}
