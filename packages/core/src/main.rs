use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use chain_query_store::{
    chain::StaticChainGetter,
    cli::{Cli, Command},
    config::Config,
    db,
    error::QueryError,
    logging::init_logging,
    metrics::QueryMetrics,
    queries::QueriesStore,
    query::{ChainQuery, QueryContext},
    repository::QueryCacheRepository,
    services::rest::RestClient,
};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    let config = Config::from_env_with_overrides(&cli)
        .map_err(QueryError::config)
        .unwrap_or_else(|err| {
            tracing::error!("{}", err);
            std::process::exit(1);
        });

    tracing::info!("Querying {} via {}", config.chain_id, config.rest_url);

    if let Err(err) = run(cli, config).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: Config) -> Result<(), QueryError> {
    let pool = db::create_pool(&config.cache_database_url).await?;
    let transport = RestClient::new(config.request_timeout())?;
    let chain_info = config.chain_info();
    let metrics = Arc::new(
        QueryMetrics::new().map_err(|err| QueryError::config(err.to_string()))?,
    );

    let ctx = QueryContext::new(
        Arc::new(QueryCacheRepository::new(pool)),
        Arc::new(StaticChainGetter::new([chain_info.clone()])),
        Arc::new(transport),
    )
    .with_metrics(metrics.clone());

    let queries = QueriesStore::new(ctx).get(&config.chain_id)?;

    let output = match cli.command {
        Command::Commission { val_address, denom } => {
            if !val_address.starts_with(&chain_info.bech32_config.bech32_prefix_val_addr) {
                tracing::warn!(
                    "{} does not carry the {} prefix",
                    val_address,
                    chain_info.bech32_config.bech32_prefix_val_addr
                );
            }
            let query = queries
                .query_distribution
                .get_query_val_address(&val_address)?;
            load(&query).await?;
            match denom {
                Some(denom) => json!({ "denom": denom, "amount": query.commission_of(&denom) }),
                None => json!(query.commission_rewards()),
            }
        }
        Command::Supply { denom } => {
            let query = queries.query_supply_total.get_query()?;
            load(&query).await?;
            match denom {
                Some(denom) => json!({ "denom": denom, "amount": query.amount_of(&denom) }),
                None => json!({ "supply": query.supply(), "total": query.total() }),
            }
        }
        Command::DistributionParams => {
            let query = queries.query_distribution_params.get_query()?;
            load(&query).await?;
            json!(query.response().map(|response| response.data.params.clone()))
        }
        Command::Inflation => {
            let query = queries.query_minting_inflation.get_query()?;
            load(&query).await?;
            json!({ "inflation": query.inflation() })
        }
    };

    print_json(&output)?;

    if cli.metrics {
        let rendered = metrics
            .render()
            .map_err(|err| QueryError::config(err.to_string()))?;
        eprintln!("{}", rendered);
    }

    Ok(())
}

/// Fetch a fresh response. If the request fails but a cached response was
/// loaded from the store, keep going with the stale data.
async fn load<T>(query: &ChainQuery<T>) -> Result<(), QueryError>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    query.wait_fresh_response().await;

    match (query.response(), query.error()) {
        (None, Some(err)) => Err(err),
        (Some(response), Some(err)) => {
            tracing::warn!(
                "Using cached response from {} ({})",
                response.timestamp.to_rfc3339(),
                err
            );
            Ok(())
        }
        _ => Ok(()),
    }
}

fn print_json(value: &Value) -> Result<(), QueryError> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| QueryError::decode(err.to_string()))?;
    println!("{}", rendered);
    Ok(())
}
