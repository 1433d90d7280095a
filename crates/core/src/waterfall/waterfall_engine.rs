//! Allocates an exit value across every share class and holder.

use std::collections::HashMap;

use log::{debug, warn};
use rust_decimal::Decimal;

use super::{ClassPayout, ExitResult, HolderPayout, PreferenceStack};
use crate::errors::{Error, Result, ValidationError};
use crate::ledger::{HolderKind, ShareClass, ShareClassKind};
use crate::settings::EngineSettings;
use crate::snapshot::CapTableSnapshot;
use crate::utils::decimal_utils::{round_preserving_total, share_fraction};

/// Per-class amounts for one set of conversion decisions, indexed like
/// `CapTableSnapshot::share_classes`.
struct ClassAllocation {
    preference: Vec<Decimal>,
    residual: Vec<Decimal>,
}

impl ClassAllocation {
    fn total(&self, idx: usize) -> Decimal {
        self.preference[idx] + self.residual[idx]
    }
}

/// Decides convert-vs-keep for each preferred class and allocates the full
/// exit value. Holds no state between calls.
#[derive(Debug, Clone, Default)]
pub struct WaterfallEngine {
    settings: EngineSettings,
}

impl WaterfallEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    pub fn preference_stack(&self, snapshot: &CapTableSnapshot) -> PreferenceStack {
        PreferenceStack::order(&snapshot.share_classes, self.settings.seniority_tie_break)
    }

    /// Orders the snapshot's preferred classes with the configured tie-break and
    /// distributes `exit_value`.
    pub fn run(&self, snapshot: &CapTableSnapshot, exit_value: Decimal) -> Result<ExitResult> {
        let stack = self.preference_stack(snapshot);
        self.distribute(snapshot, &stack, exit_value)
    }

    /// Evaluates one cap table at several exit values.
    pub fn payout_curve(
        &self,
        snapshot: &CapTableSnapshot,
        exit_values: &[Decimal],
    ) -> Result<Vec<ExitResult>> {
        let stack = self.preference_stack(snapshot);
        exit_values
            .iter()
            .map(|exit_value| self.distribute(snapshot, &stack, *exit_value))
            .collect()
    }

    pub fn distribute(
        &self,
        snapshot: &CapTableSnapshot,
        stack: &PreferenceStack,
        exit_value: Decimal,
    ) -> Result<ExitResult> {
        if exit_value < Decimal::ZERO {
            return Err(Error::NegativeExitValue(exit_value));
        }
        if snapshot.total_shares == 0 {
            return Err(Error::EmptyCapTable);
        }
        for class in &snapshot.share_classes {
            class.validate_terms()?;
        }

        let positions: HashMap<&str, usize> = snapshot
            .share_classes
            .iter()
            .enumerate()
            .map(|(idx, class)| (class.id.as_str(), idx))
            .collect();
        self.check_stack(snapshot, stack, &positions)?;

        let converted = self.resolve_conversions(snapshot, stack, &positions, exit_value);
        let allocation = self.allocate(snapshot, stack, &positions, exit_value, &converted);

        let mut holder_classes: Vec<usize> = Vec::with_capacity(snapshot.holders.len());
        let mut raw_payouts: Vec<Decimal> = Vec::with_capacity(snapshot.holders.len());
        for holder in &snapshot.holders {
            let idx = *positions.get(holder.share_class_id.as_str()).ok_or_else(|| {
                ValidationError::InvalidInput(format!(
                    "Holder {} references unknown share class {}",
                    holder.id, holder.share_class_id
                ))
            })?;
            let class = &snapshot.share_classes[idx];
            holder_classes.push(idx);
            raw_payouts.push(allocation.total(idx) * share_fraction(holder.shares, class.shares));
        }

        // An exit quoted more finely than the payout precision is paid at its own
        // scale, so nothing is lost to truncation.
        let precision = self.settings.payout_precision.max(exit_value.scale());
        let payouts = round_preserving_total(&raw_payouts, exit_value, precision);

        let per_holder: Vec<HolderPayout> = snapshot
            .holders
            .iter()
            .zip(holder_classes.iter())
            .zip(payouts.iter())
            .map(|((holder, &idx), &payout)| {
                let class = &snapshot.share_classes[idx];
                let multiple_on_investment = match holder.kind {
                    HolderKind::Investor => {
                        let invested =
                            class.original_investment * share_fraction(holder.shares, class.shares);
                        if invested > Decimal::ZERO {
                            payout.checked_div(invested).map(|m| m.round_dp(4))
                        } else {
                            None
                        }
                    }
                    HolderKind::Founder | HolderKind::OptionPool => None,
                };
                HolderPayout {
                    holder_id: holder.id.clone(),
                    name: holder.name.clone(),
                    share_class_id: holder.share_class_id.clone(),
                    payout,
                    multiple_on_investment,
                    converted_to_common: converted[idx],
                }
            })
            .collect();

        let per_class: Vec<ClassPayout> = snapshot
            .share_classes
            .iter()
            .enumerate()
            .map(|(idx, class)| {
                let total: Decimal = per_holder
                    .iter()
                    .zip(holder_classes.iter())
                    .filter(|(_, class_idx)| **class_idx == idx)
                    .map(|(p, _)| p.payout)
                    .sum();
                let residual = allocation.residual[idx].round_dp(precision);
                let (participation_paid, common_paid) = match &class.kind {
                    ShareClassKind::Preferred(_) if !converted[idx] => (residual, Decimal::ZERO),
                    ShareClassKind::Preferred(_)
                    | ShareClassKind::Common
                    | ShareClassKind::OptionPool => (Decimal::ZERO, residual),
                };
                ClassPayout {
                    share_class_id: class.id.clone(),
                    name: class.name.clone(),
                    preference_paid: allocation.preference[idx].round_dp(precision),
                    participation_paid,
                    common_paid,
                    total,
                    converted_to_common: converted[idx],
                }
            })
            .collect();

        let total_distributed: Decimal = per_holder.iter().map(|p| p.payout).sum();
        debug!(
            "Distributed {} of exit value {} across {} holders ({} classes converted)",
            total_distributed,
            exit_value,
            per_holder.len(),
            converted.iter().filter(|c| **c).count()
        );

        Ok(ExitResult {
            exit_value,
            per_holder,
            per_class,
            total_distributed,
        })
    }

    /// Every preferred class in the snapshot must appear in the stack exactly once.
    fn check_stack(
        &self,
        snapshot: &CapTableSnapshot,
        stack: &PreferenceStack,
        positions: &HashMap<&str, usize>,
    ) -> Result<()> {
        let mut seen = vec![false; snapshot.share_classes.len()];
        for class in stack.classes() {
            match positions.get(class.id.as_str()) {
                Some(&idx) if snapshot.share_classes[idx].is_preferred() && !seen[idx] => {
                    seen[idx] = true;
                }
                _ => {
                    return Err(ValidationError::InvalidInput(format!(
                        "Preference stack entry {} is not a distinct preferred class of the cap table",
                        class.id
                    ))
                    .into())
                }
            }
        }
        if let Some(missing) = snapshot
            .share_classes
            .iter()
            .enumerate()
            .find(|(idx, class)| class.is_preferred() && !seen[*idx])
        {
            return Err(ValidationError::InvalidInput(format!(
                "Preferred class {} is missing from the preference stack",
                missing.1.id
            ))
            .into());
        }
        Ok(())
    }

    /// Decides which preferred classes convert.
    ///
    /// Classes are visited in ascending order of conversion price, the per-share
    /// value at which common proceeds overtake what the class can take as
    /// preferred. Equal prices are visited junior first. A class converts when,
    /// with the classes already visited fixed, converting pays strictly more.
    /// Passes from junior to senior then flip any class that would still do
    /// strictly better the other way, until no decision changes.
    fn resolve_conversions(
        &self,
        snapshot: &CapTableSnapshot,
        stack: &PreferenceStack,
        positions: &HashMap<&str, usize>,
        exit_value: Decimal,
    ) -> Vec<bool> {
        let mut converted = vec![false; snapshot.share_classes.len()];

        let junior_first: Vec<usize> = stack
            .classes()
            .iter()
            .rev()
            .filter_map(|class| positions.get(class.id.as_str()).copied())
            .collect();
        let mut by_price = junior_first.clone();
        // Stable sort keeps junior-first order among equal prices; classes that
        // can never do better as common sort last.
        by_price.sort_by_key(|&idx| {
            let price = conversion_price(&snapshot.share_classes[idx]);
            (price.is_none(), price)
        });

        for &idx in &by_price {
            if self.prefers_flip(snapshot, stack, positions, exit_value, &mut converted, idx) {
                converted[idx] = true;
            }
        }

        for _ in 0..junior_first.len() {
            let mut changed = false;
            for &idx in &junior_first {
                if self.prefers_flip(snapshot, stack, positions, exit_value, &mut converted, idx) {
                    converted[idx] = !converted[idx];
                    changed = true;
                }
            }
            if !changed {
                return converted;
            }
        }
        warn!(
            "Conversion decisions did not settle at exit value {}; using the last pass",
            exit_value
        );
        converted
    }

    /// Whether class `idx` would be paid strictly more by reversing its current
    /// decision, with every other decision held fixed. Leaves `converted` as it
    /// found it.
    fn prefers_flip(
        &self,
        snapshot: &CapTableSnapshot,
        stack: &PreferenceStack,
        positions: &HashMap<&str, usize>,
        exit_value: Decimal,
        converted: &mut [bool],
        idx: usize,
    ) -> bool {
        let current = converted[idx];
        converted[idx] = false;
        let keep = self
            .allocate(snapshot, stack, positions, exit_value, converted)
            .total(idx);
        converted[idx] = true;
        let convert = self
            .allocate(snapshot, stack, positions, exit_value, converted)
            .total(idx);
        converted[idx] = current;

        let flip = if current { keep > convert } else { convert > keep };
        if flip {
            debug!(
                "Class {}: keep preference {} vs convert {} -> {}",
                snapshot.share_classes[idx].id,
                keep,
                convert,
                if current { "keep" } else { "convert" }
            );
        }
        flip
    }

    fn allocate(
        &self,
        snapshot: &CapTableSnapshot,
        stack: &PreferenceStack,
        positions: &HashMap<&str, usize>,
        exit_value: Decimal,
        converted: &[bool],
    ) -> ClassAllocation {
        let classes = &snapshot.share_classes;
        let mut preference = vec![Decimal::ZERO; classes.len()];
        let mut residual_paid = vec![Decimal::ZERO; classes.len()];

        let is_converted = |id: &str| positions.get(id).map_or(false, |&idx| converted[idx]);
        let mut remaining = exit_value;
        for claim in stack.claims(exit_value, |class| is_converted(&class.id)) {
            if let Some(&idx) = positions.get(claim.share_class_id.as_str()) {
                preference[idx] = claim.claim;
            }
            remaining = claim.remaining_after;
        }

        // Residual participants and, for capped participating classes, how much
        // more they may receive on top of their preference.
        let mut active: Vec<(usize, Option<Decimal>)> = classes
            .iter()
            .enumerate()
            .filter(|(_, class)| class.shares > 0)
            .filter_map(|(idx, class)| match &class.kind {
                ShareClassKind::Common | ShareClassKind::OptionPool => Some((idx, None)),
                ShareClassKind::Preferred(_) if converted[idx] => Some((idx, None)),
                ShareClassKind::Preferred(terms) if terms.participating => Some((
                    idx,
                    class
                        .payout_ceiling()
                        .map(|ceiling| (ceiling - preference[idx]).max(Decimal::ZERO)),
                )),
                ShareClassKind::Preferred(_) => None,
            })
            .collect();

        let mut residual = remaining;
        while residual > Decimal::ZERO && !active.is_empty() {
            let active_shares: u64 = active.iter().map(|(idx, _)| classes[*idx].shares).sum();
            let pro_rata =
                |idx: usize| residual * share_fraction(classes[idx].shares, active_shares);

            let capped: Vec<(usize, Decimal)> = active
                .iter()
                .filter_map(|&(idx, headroom)| match headroom {
                    Some(room) if pro_rata(idx) > room => Some((idx, room)),
                    _ => None,
                })
                .collect();

            if capped.is_empty() {
                for &(idx, _) in &active {
                    residual_paid[idx] += pro_rata(idx);
                }
                residual = Decimal::ZERO;
                break;
            }

            for &(idx, room) in &capped {
                debug!(
                    "Class {} reached its participation cap; redistributing excess",
                    classes[idx].id
                );
                residual_paid[idx] += room;
                residual -= room;
            }
            active.retain(|(idx, _)| !capped.iter().any(|(capped_idx, _)| capped_idx == idx));
        }

        if residual > Decimal::ZERO {
            warn!(
                "No uncapped participant left to absorb {} of residual value; spreading it across all classes",
                residual
            );
            for (idx, class) in classes.iter().enumerate() {
                residual_paid[idx] +=
                    residual * share_fraction(class.shares, snapshot.total_shares);
            }
        }

        ClassAllocation {
            preference,
            residual: residual_paid,
        }
    }
}

/// Per-share value of common proceeds above which converting beats keeping the
/// preference. `None` for uncapped participating classes, which always do at
/// least as well as preferred, and for classes without shares.
fn conversion_price(class: &ShareClass) -> Option<Decimal> {
    if class.shares == 0 {
        return None;
    }
    let ceiling = match &class.kind {
        ShareClassKind::Preferred(terms) if terms.participating => class.payout_ceiling()?,
        ShareClassKind::Preferred(_) => class.preference_amount(),
        ShareClassKind::Common | ShareClassKind::OptionPool => return None,
    };
    Some(ceiling / Decimal::from(class.shares))
}
