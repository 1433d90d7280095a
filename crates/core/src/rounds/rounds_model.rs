//! Funding round domain models.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::ledger::{Holder, ShareLedger};
use crate::settings::PoolTiming;

fn default_liquidation_multiple() -> Decimal {
    dec!(1)
}

/// Terms granted to the preferred class a round issues.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundTerms {
    #[serde(default = "default_liquidation_multiple")]
    pub liquidation_multiple: Decimal,
    #[serde(default)]
    pub participating: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participation_cap: Option<Decimal>,
    /// Explicit seniority rank. Rounds without one rank at 0 and are stacked
    /// by the configured tie-break.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seniority: Option<i32>,
}

impl Default for RoundTerms {
    fn default() -> Self {
        Self {
            liquidation_multiple: default_liquidation_multiple(),
            participating: false,
            participation_cap: None,
            seniority: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FundingRound {
    pub id: String,
    pub name: String,
    /// Application order. Must be strictly increasing across a scenario.
    pub index: u32,
    pub investment_amount: Decimal,
    pub pre_money_valuation: Decimal,
    #[serde(default)]
    pub terms: RoundTerms,
    /// Target size of the unallocated pool as a fraction of post-money fully
    /// diluted shares. Zero leaves the pool alone.
    #[serde(default)]
    pub option_pool_top_up: Decimal,
    /// Falls back to the engine settings when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_timing: Option<PoolTiming>,
}

impl FundingRound {
    pub fn investor_holder_id(&self) -> String {
        format!("{}:investor", self.id)
    }
}

/// How a round was priced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundPricing {
    pub round_index: u32,
    pub price_per_share: Decimal,
    /// Fully diluted count before the round, pool top-up excluded.
    pub pre_round_fully_diluted_shares: u64,
    pub pool_top_up_shares: u64,
    pub new_investor_shares: u64,
    pub post_money_valuation: Decimal,
}

impl RoundPricing {
    /// Every share the round brought into existence.
    pub fn issued_shares(&self) -> u64 {
        self.pool_top_up_shares + self.new_investor_shares
    }
}

/// Result of applying one round: the next ledger generation, the new investor
/// and the pricing that produced them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundOutcome {
    pub ledger: ShareLedger,
    pub investor: Holder,
    pub pricing: RoundPricing,
}
