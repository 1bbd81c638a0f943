//! Bank supply and mint inflation queries.

use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::coin::{amount_of, CoinPrimitive};
use crate::error::QueryError;
use crate::query::{ChainQuery, QueryContext, QueryMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyTotal {
    #[serde(default)]
    pub supply: Vec<CoinPrimitive>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub next_key: Option<String>,
    pub total: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MintingInflation {
    /// Decimal string, e.g. `"0.071400000000000000"`.
    pub inflation: String,
}

pub struct SupplyTotalQuery {
    query: ChainQuery<SupplyTotal>,
}

impl SupplyTotalQuery {
    pub fn new(ctx: &QueryContext, chain_id: &str) -> Result<Self, QueryError> {
        Ok(Self {
            query: ChainQuery::new(ctx, chain_id, "/cosmos/bank/v1beta1/supply")?,
        })
    }

    pub fn supply(&self) -> Vec<CoinPrimitive> {
        self.query
            .response()
            .map(|response| response.data.supply.clone())
            .unwrap_or_default()
    }

    pub fn amount_of(&self, denom: &str) -> Option<String> {
        self.query
            .response()
            .and_then(|response| amount_of(&response.data.supply, denom))
    }

    /// Total entry count reported by pagination, when the node sends one.
    pub fn total(&self) -> Option<String> {
        self.query
            .response()
            .and_then(|response| response.data.pagination.as_ref().map(|p| p.total.clone()))
    }
}

impl Deref for SupplyTotalQuery {
    type Target = ChainQuery<SupplyTotal>;

    fn deref(&self) -> &Self::Target {
        &self.query
    }
}

pub struct QuerySupplyTotal {
    map: QueryMap<SupplyTotalQuery>,
}

impl QuerySupplyTotal {
    const KEY: &'static str = "supply_total";

    pub fn new(ctx: QueryContext, chain_id: impl Into<String>) -> Self {
        let chain_id = chain_id.into();
        Self {
            map: QueryMap::new(move |_: &str| SupplyTotalQuery::new(&ctx, &chain_id)),
        }
    }

    pub fn get_query(&self) -> Result<Arc<SupplyTotalQuery>, QueryError> {
        self.map.get(Self::KEY)
    }
}

pub struct MintingInflationQuery {
    query: ChainQuery<MintingInflation>,
}

impl MintingInflationQuery {
    pub fn new(ctx: &QueryContext, chain_id: &str) -> Result<Self, QueryError> {
        Ok(Self {
            query: ChainQuery::new(ctx, chain_id, "/cosmos/mint/v1beta1/inflation")?,
        })
    }

    pub fn inflation(&self) -> Option<String> {
        self.query
            .response()
            .map(|response| response.data.inflation.clone())
    }
}

impl Deref for MintingInflationQuery {
    type Target = ChainQuery<MintingInflation>;

    fn deref(&self) -> &Self::Target {
        &self.query
    }
}

pub struct QueryMintingInflation {
    map: QueryMap<MintingInflationQuery>,
}

impl QueryMintingInflation {
    const KEY: &'static str = "minting_inflation";

    pub fn new(ctx: QueryContext, chain_id: impl Into<String>) -> Self {
        let chain_id = chain_id.into();
        Self {
            map: QueryMap::new(move |_: &str| MintingInflationQuery::new(&ctx, &chain_id)),
        }
    }

    pub fn get_query(&self) -> Result<Arc<MintingInflationQuery>, QueryError> {
        self.map.get(Self::KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::query::testing::{test_context, QueuedTransport, TEST_CHAIN_ID};

    fn supply_body() -> serde_json::Value {
        json!({
            "supply": [
                { "denom": "uatom", "amount": "390000000000000" },
                { "denom": "ibc/27394FB092D2ECCD56123C74F36E4C1F926001CEADA9CA97EA622B25F41E5EB2", "amount": "12" }
            ],
            "pagination": { "next_key": null, "total": "2" }
        })
    }

    #[tokio::test]
    async fn supply_accessors_project_the_response() {
        let transport = Arc::new(QueuedTransport::new().with_ok(supply_body()));
        let (ctx, _) = test_context(transport);
        let supply = QuerySupplyTotal::new(ctx, TEST_CHAIN_ID);
        let query = supply.get_query().unwrap();

        query.fetch().await;

        assert_eq!(query.supply().len(), 2);
        assert_eq!(query.amount_of("uatom"), Some("390000000000000".to_string()));
        assert_eq!(query.amount_of("uosmo"), None);
        assert_eq!(query.total(), Some("2".to_string()));
    }

    #[tokio::test]
    async fn get_query_is_a_singleton() {
        let transport = Arc::new(QueuedTransport::new());
        let (ctx, _) = test_context(transport);
        let supply = QuerySupplyTotal::new(ctx, TEST_CHAIN_ID);

        let a = supply.get_query().unwrap();
        let b = supply.get_query().unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.path(), "/cosmos/bank/v1beta1/supply");
    }

    #[tokio::test]
    async fn supply_without_pagination_decodes() {
        let transport = Arc::new(QueuedTransport::new().with_ok(json!({ "supply": [] })));
        let (ctx, _) = test_context(transport);
        let query = SupplyTotalQuery::new(&ctx, TEST_CHAIN_ID).unwrap();

        query.fetch().await;

        assert!(query.error().is_none());
        assert!(query.supply().is_empty());
        assert_eq!(query.total(), None);
    }

    #[tokio::test]
    async fn inflation_is_read_from_response() {
        let transport = Arc::new(
            QueuedTransport::new().with_ok(json!({ "inflation": "0.071400000000000000" })),
        );
        let (ctx, _) = test_context(transport);
        let inflation = QueryMintingInflation::new(ctx, TEST_CHAIN_ID);
        let query = inflation.get_query().unwrap();

        assert_eq!(query.inflation(), None);
        query.fetch().await;
        assert_eq!(query.inflation(), Some("0.071400000000000000".to_string()));
    }
}
