//! Orders preferred classes by seniority and walks exit value down the stack.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::ShareClass;
use crate::settings::SeniorityTieBreak;

/// Preference paid to one class for a given exit value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceClaim {
    pub share_class_id: String,
    pub claim: Decimal,
    /// Value left for junior classes and common after this claim.
    pub remaining_after: Decimal,
}

/// Preferred classes, most senior first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceStack {
    classes: Vec<ShareClass>,
}

impl PreferenceStack {
    /// Sorts preferred classes by ascending seniority rank; equal ranks are
    /// ordered by round according to `tie_break`. Common and the pool are ignored.
    pub fn order(share_classes: &[ShareClass], tie_break: SeniorityTieBreak) -> Self {
        let mut classes: Vec<ShareClass> = share_classes
            .iter()
            .filter(|c| c.is_preferred())
            .cloned()
            .collect();

        classes.sort_by_key(|c| {
            let terms = c.preferred_terms();
            let seniority = terms.map(|t| t.seniority).unwrap_or(i32::MAX);
            let round = i64::from(terms.map(|t| t.round_index).unwrap_or(0));
            let round_key = match tie_break {
                SeniorityTieBreak::MostRecentFirst => -round,
                SeniorityTieBreak::OldestFirst => round,
            };
            (seniority, round_key)
        });

        Self { classes }
    }

    pub fn classes(&self) -> &[ShareClass] {
        &self.classes
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Sum of every class's full liquidation preference, saturating at
    /// `Decimal::MAX`.
    pub fn total_preference(&self) -> Decimal {
        self.classes
            .iter()
            .fold(Decimal::ZERO, |total, c| total.saturating_add(c.preference_amount()))
    }

    /// Walks `exit_value` down the stack. Each class takes
    /// `min(remaining, multiple × investment)`; classes for which `skip` returns
    /// true (those that converted) take nothing and leave the remainder intact.
    pub fn claims<F>(&self, exit_value: Decimal, skip: F) -> Vec<PreferenceClaim>
    where
        F: Fn(&ShareClass) -> bool,
    {
        let mut remaining = exit_value.max(Decimal::ZERO);
        self.classes
            .iter()
            .map(|class| {
                let claim = if skip(class) {
                    Decimal::ZERO
                } else {
                    remaining.min(class.preference_amount())
                };
                remaining -= claim;
                PreferenceClaim {
                    share_class_id: class.id.clone(),
                    claim,
                    remaining_after: remaining,
                }
            })
            .collect()
    }

    /// Cumulative preference paid to classes `0..=k` when nobody converts.
    pub fn cumulative_claim(&self, exit_value: Decimal, k: usize) -> Decimal {
        self.claims(exit_value, |_| false)
            .iter()
            .take(k + 1)
            .map(|c| c.claim)
            .sum()
    }
}
