use clap::{Parser, Subcommand};

/// Chain query CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "chain-query-store",
    version,
    about = "Cached queries against a Cosmos SDK REST endpoint"
)]
pub struct Cli {
    /// Chain id to query (overrides CHAIN_ID)
    #[arg(long)]
    pub chain_id: Option<String>,

    /// REST (LCD) base URL (overrides REST_URL)
    #[arg(long)]
    pub rest_url: Option<String>,

    /// SQLite URL of the response cache (overrides CACHE_DATABASE_URL)
    #[arg(long)]
    pub cache_db: Option<String>,

    /// Print query metrics to stderr after the command
    #[arg(long)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Commission accumulated by a validator
    Commission {
        /// Validator operator address
        val_address: String,

        /// Only print the amount for this denom
        #[arg(long)]
        denom: Option<String>,
    },

    /// Total bank supply
    Supply {
        /// Only print the amount for this denom
        #[arg(long)]
        denom: Option<String>,
    },

    /// Distribution module parameters
    DistributionParams,

    /// Current mint inflation
    Inflation,
}

impl Cli {
    /// Command-line value standing in for the environment variable `key`.
    pub fn override_for(&self, key: &str) -> Option<String> {
        match key {
            "CHAIN_ID" => self.chain_id.clone(),
            "REST_URL" => self.rest_url.clone(),
            "CACHE_DATABASE_URL" => self.cache_db.clone(),
            _ => None,
        }
    }
}
