//! Ownership over time: one snapshot per ledger generation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::CapTableSnapshot;
use crate::ledger::ShareLedger;
use crate::rounds::{RoundOutcome, RoundPricing};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimelineStep {
    /// `None` for the founding generation.
    pub round_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<RoundPricing>,
    pub snapshot: CapTableSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DilutionTimeline {
    pub steps: Vec<TimelineStep>,
}

impl DilutionTimeline {
    pub fn build(founding: &ShareLedger, outcomes: &[RoundOutcome]) -> Self {
        let mut steps = Vec::with_capacity(outcomes.len() + 1);
        steps.push(TimelineStep {
            round_index: None,
            pricing: None,
            snapshot: CapTableSnapshot::from_ledger(founding),
        });
        steps.extend(outcomes.iter().map(|outcome| TimelineStep {
            round_index: Some(outcome.pricing.round_index),
            pricing: Some(outcome.pricing.clone()),
            snapshot: CapTableSnapshot::from_ledger(&outcome.ledger),
        }));
        Self { steps }
    }

    pub fn founding_snapshot(&self) -> Option<&CapTableSnapshot> {
        self.steps.first().map(|s| &s.snapshot)
    }

    pub fn final_snapshot(&self) -> Option<&CapTableSnapshot> {
        self.steps.last().map(|s| &s.snapshot)
    }

    /// Cap table as it stood right after the last round with index `<= round_index`.
    /// Falls back to the founding snapshot when no round qualifies.
    pub fn snapshot_as_of(&self, round_index: u32) -> Option<&CapTableSnapshot> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.round_index.map_or(true, |idx| idx <= round_index))
            .map(|s| &s.snapshot)
    }

    /// A holder's ownership at every step, zero before the holder existed.
    pub fn holder_series(&self, holder_id: &str) -> Vec<(Option<u32>, Decimal)> {
        self.steps
            .iter()
            .map(|s| {
                (
                    s.round_index,
                    s.snapshot
                        .holder_percentage(holder_id)
                        .unwrap_or(Decimal::ZERO),
                )
            })
            .collect()
    }
}
