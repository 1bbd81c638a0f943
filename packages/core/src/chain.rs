//! Chain configuration lookup.
//!
//! Queries never reach chain configuration through globals: a
//! [`ChainGetter`] is passed in with the rest of the query context and
//! consulted once, when a query is constructed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Bech32 human-readable prefixes used by a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bech32Config {
    pub bech32_prefix_acc_addr: String,
    pub bech32_prefix_acc_pub: String,
    pub bech32_prefix_val_addr: String,
    pub bech32_prefix_val_pub: String,
    pub bech32_prefix_cons_addr: String,
    pub bech32_prefix_cons_pub: String,
}

impl Bech32Config {
    /// Derive the full prefix set from the main account prefix, following
    /// the Cosmos SDK convention (`cosmos`, `cosmosvaloper`, `cosmosvalcons`).
    pub fn from_prefix(prefix: &str) -> Self {
        Self {
            bech32_prefix_acc_addr: prefix.to_string(),
            bech32_prefix_acc_pub: format!("{prefix}pub"),
            bech32_prefix_val_addr: format!("{prefix}valoper"),
            bech32_prefix_val_pub: format!("{prefix}valoperpub"),
            bech32_prefix_cons_addr: format!("{prefix}valcons"),
            bech32_prefix_cons_pub: format!("{prefix}valconspub"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    pub chain_id: String,
    /// REST (LCD) base URL.
    pub rest: String,
    pub bech32_config: Bech32Config,
}

/// Resolves a chain id to its configuration.
pub trait ChainGetter {
    fn get_chain(&self, chain_id: &str) -> Result<ChainInfo, QueryError>;
}

/// Strip the trailing revision number from a chain id.
///
/// `cosmoshub-4` and `cosmoshub-3` share the identifier `cosmoshub`; ids
/// without a numeric revision suffix are their own identifier.
pub fn chain_identifier(chain_id: &str) -> &str {
    match chain_id.rsplit_once('-') {
        Some((identifier, revision))
            if !identifier.is_empty()
                && !revision.is_empty()
                && revision.chars().all(|c| c.is_ascii_digit()) =>
        {
            identifier
        }
        _ => chain_id,
    }
}

/// Chain getter backed by a fixed set of chain infos.
#[derive(Debug, Default, Clone)]
pub struct StaticChainGetter {
    chains: HashMap<String, ChainInfo>,
}

impl StaticChainGetter {
    pub fn new(chains: impl IntoIterator<Item = ChainInfo>) -> Self {
        Self {
            chains: chains
                .into_iter()
                .map(|info| (info.chain_id.clone(), info))
                .collect(),
        }
    }
}

impl ChainGetter for StaticChainGetter {
    fn get_chain(&self, chain_id: &str) -> Result<ChainInfo, QueryError> {
        if let Some(info) = self.chains.get(chain_id) {
            return Ok(info.clone());
        }

        let identifier = chain_identifier(chain_id);
        self.chains
            .values()
            .find(|info| chain_identifier(&info.chain_id) == identifier)
            .cloned()
            .ok_or_else(|| QueryError::unknown_chain(chain_id))
    }
}
