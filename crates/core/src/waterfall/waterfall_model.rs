//! Exit result models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What one holder receives at exit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HolderPayout {
    pub holder_id: String,
    pub name: String,
    pub share_class_id: String,
    pub payout: Decimal,
    /// Payout over invested capital. Only reported for investors.
    pub multiple_on_investment: Option<Decimal>,
    pub converted_to_common: bool,
}

/// How a share class's proceeds break down.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassPayout {
    pub share_class_id: String,
    pub name: String,
    /// Liquidation preference paid out of the stack.
    pub preference_paid: Decimal,
    /// Participation on top of the preference (participating classes that kept it).
    pub participation_paid: Decimal,
    /// Pro-rata common proceeds (common, the pool, and converted classes).
    pub common_paid: Decimal,
    /// Sum of the class's holder payouts.
    pub total: Decimal,
    pub converted_to_common: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExitResult {
    pub exit_value: Decimal,
    pub per_holder: Vec<HolderPayout>,
    pub per_class: Vec<ClassPayout>,
    /// Never exceeds `exit_value`.
    pub total_distributed: Decimal,
}

impl ExitResult {
    pub fn payout_for(&self, holder_id: &str) -> Option<Decimal> {
        self.per_holder
            .iter()
            .find(|p| p.holder_id == holder_id)
            .map(|p| p.payout)
    }

    pub fn class_payout(&self, class_id: &str) -> Option<&ClassPayout> {
        self.per_class.iter().find(|c| c.share_class_id == class_id)
    }

    pub fn converted_classes(&self) -> impl Iterator<Item = &ClassPayout> {
        self.per_class.iter().filter(|c| c.converted_to_common)
    }
}
