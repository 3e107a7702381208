use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub extraction_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_url = dotenv::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let openai_api_key =
            dotenv::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;
        let bind_addr =
            dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
        let openai_model =
            dotenv::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_owned());
        let extraction_timeout = dotenv::var("EXTRACTION_TIMEOUT_SECS")
            .ok()
            .map(|s| s.parse::<u64>().context("EXTRACTION_TIMEOUT_SECS must be an integer"))
            .transpose()?
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(120));

        Ok(Self {
            database_url,
            bind_addr,
            openai_api_key,
            openai_model,
            extraction_timeout,
        })
    }
}
