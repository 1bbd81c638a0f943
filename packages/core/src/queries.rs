//! Per-chain query bundles.

use std::sync::Arc;

use crate::error::QueryError;
use crate::query::distribution::{QueryDistribution, QueryDistributionParams};
use crate::query::supply::{QueryMintingInflation, QuerySupplyTotal};
use crate::query::{QueryContext, QueryMap};

/// Every query map for a single chain.
pub struct ChainQueries {
    pub chain_id: String,
    pub query_distribution: QueryDistribution,
    pub query_distribution_params: QueryDistributionParams,
    pub query_supply_total: QuerySupplyTotal,
    pub query_minting_inflation: QueryMintingInflation,
}

impl ChainQueries {
    pub fn new(ctx: &QueryContext, chain_id: &str) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            query_distribution: QueryDistribution::new(ctx.clone(), chain_id),
            query_distribution_params: QueryDistributionParams::new(ctx.clone(), chain_id),
            query_supply_total: QuerySupplyTotal::new(ctx.clone(), chain_id),
            query_minting_inflation: QueryMintingInflation::new(ctx.clone(), chain_id),
        }
    }
}

/// [`ChainQueries`] keyed by chain id.
///
/// Chains are checked against the chain getter when first requested, so an
/// unknown chain id fails here rather than on the first query.
pub struct QueriesStore {
    map: QueryMap<ChainQueries>,
}

impl QueriesStore {
    pub fn new(ctx: QueryContext) -> Self {
        Self {
            map: QueryMap::new(move |chain_id: &str| {
                ctx.chain_getter.get_chain(chain_id)?;
                Ok(ChainQueries::new(&ctx, chain_id))
            }),
        }
    }

    pub fn get(&self, chain_id: &str) -> Result<Arc<ChainQueries>, QueryError> {
        self.map.get(chain_id)
    }
}
