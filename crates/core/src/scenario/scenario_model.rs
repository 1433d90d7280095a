//! Scenario domain models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::rounds::FundingRound;
use crate::snapshot::{CapTableSnapshot, DilutionTimeline};
use crate::waterfall::ExitResult;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    pub name: String,
    /// Common shares issued to founders at incorporation.
    pub total_shares: u64,
    /// Founding option pool as a fraction of founding fully diluted shares.
    #[serde(default)]
    pub esop_pool_fraction: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Founder {
    pub id: String,
    pub name: String,
    pub shares: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EsopConfig {
    pub pool_fraction: Decimal,
}

impl From<&Company> for EsopConfig {
    fn from(company: &Company) -> Self {
        Self {
            pool_fraction: company.esop_pool_fraction,
        }
    }
}

/// A saved combination of founders, rounds, ESOP allocation and exit value.
/// The engine only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub company: Company,
    pub founders: Vec<Founder>,
    #[serde(default)]
    pub rounds: Vec<FundingRound>,
    /// Overrides the company's own pool fraction when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub esop: Option<EsopConfig>,
    pub exit_value: Decimal,
}

impl Scenario {
    pub fn esop_config(&self) -> EsopConfig {
        self.esop
            .clone()
            .unwrap_or_else(|| EsopConfig::from(&self.company))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub scenario_id: String,
    /// Cap table after the last round.
    pub snapshot: CapTableSnapshot,
    pub timeline: DilutionTimeline,
    pub exit: ExitResult,
}
