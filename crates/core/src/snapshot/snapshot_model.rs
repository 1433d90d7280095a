use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::PERCENTAGE_EPSILON;
use crate::ledger::{Holder, HolderKind, ShareClass, ShareLedger};
use crate::utils::decimal_utils::share_fraction;

/// Ownership of a single holder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HolderOwnership {
    pub holder_id: String,
    pub name: String,
    pub share_class_id: String,
    pub kind: HolderKind,
    pub shares: u64,
    /// Fraction of fully diluted shares, in [0, 1].
    pub percentage: Decimal,
}

/// Ownership of a whole share class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassOwnership {
    pub share_class_id: String,
    pub name: String,
    pub shares: u64,
    pub percentage: Decimal,
}

/// Read-only view of a ledger generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapTableSnapshot {
    pub share_classes: Vec<ShareClass>,
    pub holders: Vec<Holder>,
    pub total_shares: u64,
    pub ownership: Vec<HolderOwnership>,
    pub class_ownership: Vec<ClassOwnership>,
}

impl CapTableSnapshot {
    pub fn from_ledger(ledger: &ShareLedger) -> Self {
        let total_shares = ledger.fully_diluted_shares();

        let ownership = ledger
            .holders
            .iter()
            .map(|holder| HolderOwnership {
                holder_id: holder.id.clone(),
                name: holder.name.clone(),
                share_class_id: holder.share_class_id.clone(),
                kind: holder.kind,
                shares: holder.shares,
                percentage: share_fraction(holder.shares, total_shares),
            })
            .collect();

        let class_ownership = ledger
            .share_classes
            .iter()
            .map(|class| ClassOwnership {
                share_class_id: class.id.clone(),
                name: class.name.clone(),
                shares: class.shares,
                percentage: share_fraction(class.shares, total_shares),
            })
            .collect();

        Self {
            share_classes: ledger.share_classes.clone(),
            holders: ledger.holders.clone(),
            total_shares,
            ownership,
            class_ownership,
        }
    }

    pub fn share_class(&self, class_id: &str) -> Option<&ShareClass> {
        self.share_classes.iter().find(|c| c.id == class_id)
    }

    pub fn holder_percentage(&self, holder_id: &str) -> Option<Decimal> {
        self.ownership
            .iter()
            .find(|o| o.holder_id == holder_id)
            .map(|o| o.percentage)
    }

    pub fn holders_of<'a>(&'a self, class_id: &'a str) -> impl Iterator<Item = &'a Holder> + 'a {
        self.holders
            .iter()
            .filter(move |h| h.share_class_id == class_id)
    }

    /// Sum of holder percentages; one for any non-empty cap table.
    pub fn percentage_total(&self) -> Decimal {
        self.ownership.iter().map(|o| o.percentage).sum()
    }

    /// Whether holder percentages sum to one within `PERCENTAGE_EPSILON`.
    /// An empty cap table has nothing to balance and always passes.
    pub fn is_balanced(&self) -> bool {
        self.total_shares == 0
            || (self.percentage_total() - Decimal::ONE).abs() <= PERCENTAGE_EPSILON
    }
}

impl From<&ShareLedger> for CapTableSnapshot {
    fn from(ledger: &ShareLedger) -> Self {
        CapTableSnapshot::from_ledger(ledger)
    }
}
