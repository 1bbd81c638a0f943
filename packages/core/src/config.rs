use std::env;
use std::time::Duration;

use crate::chain::{Bech32Config, ChainInfo};
use crate::cli::Cli;

pub const DEFAULT_BECH32_PREFIX: &str = "cosmos";
pub const DEFAULT_CACHE_DATABASE_URL: &str = "sqlite://query-cache.db";
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub chain_id: String,
    pub rest_url: String,
    pub bech32_prefix: String,
    pub cache_database_url: String,
    pub request_timeout_seconds: u64,
}

impl Config {
    /// Environment configuration with command-line flags taking precedence.
    pub fn from_env_with_overrides(cli: &Cli) -> Result<Self, String> {
        Self::from_lookup(|key| cli.override_for(key).or_else(|| env::var(key).ok()))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let chain_id = lookup("CHAIN_ID").ok_or("CHAIN_ID is required")?;
        let rest_url = lookup("REST_URL").ok_or("REST_URL is required")?;

        if !rest_url.starts_with("http://") && !rest_url.starts_with("https://") {
            return Err(format!("Invalid REST_URL: {}", rest_url));
        }

        let bech32_prefix =
            lookup("BECH32_PREFIX").unwrap_or_else(|| DEFAULT_BECH32_PREFIX.to_string());

        let cache_database_url = lookup("CACHE_DATABASE_URL")
            .unwrap_or_else(|| DEFAULT_CACHE_DATABASE_URL.to_string());

        let request_timeout_seconds = match lookup("REQUEST_TIMEOUT_SECONDS") {
            Some(value) => value
                .parse::<u64>()
                .map_err(|_| "REQUEST_TIMEOUT_SECONDS must be a valid number")?,
            None => DEFAULT_REQUEST_TIMEOUT_SECONDS,
        };

        Ok(Self {
            chain_id,
            rest_url,
            bech32_prefix,
            cache_database_url,
            request_timeout_seconds,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn chain_info(&self) -> ChainInfo {
        ChainInfo {
            chain_id: self.chain_id.clone(),
            rest: self.rest_url.clone(),
            bech32_config: Bech32Config::from_prefix(&self.bech32_prefix),
        }
    }
}
