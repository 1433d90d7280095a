//! Decimal helpers shared by the sequencer and the waterfall.

use log::debug;
use num_traits::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a fractional share amount to the nearest whole share.
/// `None` for negative amounts or amounts that do not fit in a `u64`.
pub fn to_whole_shares(raw: Decimal) -> Option<u64> {
    if raw < Decimal::ZERO {
        return None;
    }
    raw.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
}

/// `part / total` as a decimal fraction; zero when `total` is zero.
pub fn share_fraction(part: u64, total: u64) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    Decimal::from(part) / Decimal::from(total)
}

/// Truncates toward zero at `dp` decimal places.
pub fn truncate(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::ToZero)
}

/// Rounds every amount to `dp` places so that the rounded amounts add up to
/// `target` truncated at `dp` places.
///
/// Amounts are first truncated; the missing units are then dealt out evenly,
/// with any leftover units going one each to the entries with the largest
/// truncated remainders (ties to the earlier entry). Only entries with a
/// positive raw amount receive dust. `dp` is capped at 28, the finest scale a
/// `Decimal` holds.
pub fn round_preserving_total(raw: &[Decimal], target: Decimal, dp: u32) -> Vec<Decimal> {
    let dp = dp.min(28);
    let mut rounded: Vec<Decimal> = raw.iter().map(|v| truncate(*v, dp)).collect();
    let unit = Decimal::new(1, dp);
    let target = truncate(target, dp);
    let assigned: Decimal = rounded.iter().copied().sum();

    let mut eligible: Vec<usize> = (0..raw.len()).filter(|i| raw[*i] > Decimal::ZERO).collect();
    if eligible.is_empty() || assigned == target {
        return rounded;
    }

    if assigned < target {
        eligible.sort_by(|a, b| {
            let rem_a = raw[*a] - rounded[*a];
            let rem_b = raw[*b] - rounded[*b];
            rem_b.cmp(&rem_a).then(a.cmp(b))
        });
        let units = ((target - assigned) / unit).trunc().to_u64().unwrap_or(0);
        debug!("Distributing {} units of rounding dust", units);
        let count = eligible.len() as u64;
        let (each, extra) = (units / count, units % count);
        for (position, idx) in eligible.into_iter().enumerate() {
            let share = each + u64::from((position as u64) < extra);
            if share > 0 {
                rounded[idx] += unit * Decimal::from(share);
            }
        }
    } else {
        // Truncation can only overshoot when the raw amounts already exceed the
        // target; take the excess back from the largest amounts.
        eligible.sort_by(|a, b| rounded[*b].cmp(&rounded[*a]).then(a.cmp(b)));
        let mut excess = assigned - target;
        for idx in eligible {
            if excess <= Decimal::ZERO {
                break;
            }
            let taken = excess.min(rounded[idx]);
            rounded[idx] -= taken;
            excess -= taken;
        }
    }
    rounded
}
