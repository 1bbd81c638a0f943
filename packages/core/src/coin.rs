use serde::{Deserialize, Serialize};

/// A `{denom, amount}` pair exactly as the REST API returns it. Amounts are
/// kept as strings: they may be integers or 18-decimal fixed-point values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinPrimitive {
    pub denom: String,
    pub amount: String,
}

impl CoinPrimitive {
    pub fn new(denom: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.into(),
        }
    }
}

/// Amount of the first coin with `denom`, or `None` when there is none.
pub fn amount_of(coins: &[CoinPrimitive], denom: &str) -> Option<String> {
    coins
        .iter()
        .find(|coin| coin.denom == denom)
        .map(|coin| coin.amount.clone())
}
