use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    /// Seconds between scheduler polls for due jobs.
    pub worker_poll_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            worker_poll_secs: env::var("WORKER_POLL_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
        })
    }
}
