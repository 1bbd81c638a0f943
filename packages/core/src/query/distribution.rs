//! Distribution module queries: validator commission and module params.

use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::coin::{amount_of, CoinPrimitive};
use crate::error::QueryError;
use crate::query::{ChainQuery, QueryContext, QueryMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionCommission {
    pub commission: ValidatorCommission,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorCommission {
    #[serde(default)]
    pub commission: Vec<CoinPrimitive>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionParams {
    pub params: DistributionParamsInner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionParamsInner {
    pub community_tax: String,
    // Deprecated (always zero) since Cosmos SDK v0.47 and absent on some chains.
    #[serde(default)]
    pub base_proposer_reward: String,
    #[serde(default)]
    pub bonus_proposer_reward: String,
    pub withdraw_addr_enabled: bool,
}

/// Commission accumulated by one validator.
pub struct DistributionCommissionQuery {
    query: ChainQuery<DistributionCommission>,
    val_address: String,
}

impl DistributionCommissionQuery {
    /// An empty `val_address` yields a query that never fetches.
    pub fn new(ctx: &QueryContext, chain_id: &str, val_address: &str) -> Result<Self, QueryError> {
        let path = format!(
            "/cosmos/distribution/v1beta1/validators/{}/commission",
            val_address
        );
        let query = ChainQuery::with_can_fetch(ctx, chain_id, path, !val_address.is_empty())?;

        Ok(Self {
            query,
            val_address: val_address.to_string(),
        })
    }

    pub fn val_address(&self) -> &str {
        &self.val_address
    }

    /// Commission coins from the current response; empty until one arrives.
    pub fn commission_rewards(&self) -> Vec<CoinPrimitive> {
        self.query
            .response()
            .map(|response| response.data.commission.commission.clone())
            .unwrap_or_default()
    }

    pub fn commission_of(&self, denom: &str) -> Option<String> {
        self.query
            .response()
            .and_then(|response| amount_of(&response.data.commission.commission, denom))
    }
}

impl Deref for DistributionCommissionQuery {
    type Target = ChainQuery<DistributionCommission>;

    fn deref(&self) -> &Self::Target {
        &self.query
    }
}

/// Commission queries for one chain, keyed by validator operator address.
pub struct QueryDistribution {
    map: QueryMap<DistributionCommissionQuery>,
}

impl QueryDistribution {
    pub fn new(ctx: QueryContext, chain_id: impl Into<String>) -> Self {
        let chain_id = chain_id.into();
        Self {
            map: QueryMap::new(move |val_address: &str| {
                DistributionCommissionQuery::new(&ctx, &chain_id, val_address)
            }),
        }
    }

    pub fn get_query_val_address(
        &self,
        val_address: &str,
    ) -> Result<Arc<DistributionCommissionQuery>, QueryError> {
        self.map.get(val_address)
    }
}

pub struct DistributionParamsQuery {
    query: ChainQuery<DistributionParams>,
}

impl DistributionParamsQuery {
    pub fn new(ctx: &QueryContext, chain_id: &str) -> Result<Self, QueryError> {
        Ok(Self {
            query: ChainQuery::new(ctx, chain_id, "/cosmos/distribution/v1beta1/params")?,
        })
    }

    pub fn community_tax(&self) -> Option<String> {
        self.query
            .response()
            .map(|response| response.data.params.community_tax.clone())
    }
}

impl Deref for DistributionParamsQuery {
    type Target = ChainQuery<DistributionParams>;

    fn deref(&self) -> &Self::Target {
        &self.query
    }
}

pub struct QueryDistributionParams {
    map: QueryMap<DistributionParamsQuery>,
}

impl QueryDistributionParams {
    const KEY: &'static str = "distribution_params";

    pub fn new(ctx: QueryContext, chain_id: impl Into<String>) -> Self {
        let chain_id = chain_id.into();
        Self {
            map: QueryMap::new(move |_: &str| DistributionParamsQuery::new(&ctx, &chain_id)),
        }
    }

    pub fn get_query(&self) -> Result<Arc<DistributionParamsQuery>, QueryError> {
        self.map.get(Self::KEY)
    }
}
