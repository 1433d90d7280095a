//! Applies funding rounds to a share ledger, one immutable generation at a time.

use log::debug;
use rust_decimal::Decimal;

use super::{FundingRound, RoundOutcome, RoundPricing};
use crate::constants::{COMMON_CLASS_ID, OPTION_POOL_ID};
use crate::errors::{Error, Result};
use crate::ledger::{Holder, HolderKind, PreferredTerms, ShareClass, ShareLedger};
use crate::settings::{EngineSettings, PoolTiming};
use crate::utils::decimal_utils::to_whole_shares;

/// Prices rounds against the fully diluted share count left by the previous
/// generation. Holds no state between calls.
#[derive(Debug, Clone, Default)]
pub struct RoundSequencer {
    settings: EngineSettings,
}

impl RoundSequencer {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    /// Applies a single round, returning the next ledger generation. The input
    /// ledger is left untouched.
    pub fn apply(&self, ledger: &ShareLedger, round: &FundingRound) -> Result<RoundOutcome> {
        if let Some(previous) = ledger.last_round_index {
            if round.index <= previous {
                return Err(Error::OutOfOrderRound {
                    previous,
                    index: round.index,
                });
            }
        }
        self.validate_round(ledger, round)?;

        let existing_shares = ledger.fully_diluted_shares();
        if existing_shares == 0 {
            return Err(Error::invalid_round(
                round.index,
                "no shares outstanding to price the round against",
            ));
        }

        let timing = round
            .pool_timing
            .unwrap_or(self.settings.default_pool_timing);
        let existing = Decimal::from(existing_shares);
        let existing_pool = Decimal::from(ledger.option_pool_shares());
        let fraction = round.option_pool_top_up;
        let investment = round.investment_amount;
        let pre_money = round.pre_money_valuation;
        let post_money = pre_money
            .checked_add(investment)
            .ok_or_else(|| {
                Error::invalid_round(round.index, "post-money valuation is out of range")
            })?;

        let (pool_top_up_shares, price_per_share, new_investor_shares) = match timing {
            PoolTiming::PreMoney => {
                // Pool and investor shares are solved together: the pool must be
                // `fraction` of post-money shares, and the price is set on the
                // pre-money count that already includes the new pool.
                let k = post_money
                    .checked_div(pre_money)
                    .and_then(|post_to_pre| post_to_pre.checked_mul(fraction))
                    .ok_or_else(|| {
                        Error::invalid_round(
                            round.index,
                            "post-money to pre-money ratio is out of range",
                        )
                    })?;
                if k >= Decimal::ONE {
                    return Err(Error::invalid_round(
                        round.index,
                        format!(
                            "option pool target {} cannot be reached with a pre-money top-up",
                            fraction
                        ),
                    ));
                }
                let top_up = self.pool_shares_needed(round.index, k * existing - existing_pool, k)?;
                let pricing_base = existing + Decimal::from(top_up);
                let price = pre_money / pricing_base;
                let investor_shares = self.investor_shares(round, price)?;
                (top_up, price, investor_shares)
            }
            PoolTiming::PostMoney => {
                let price = pre_money / existing;
                let investor_shares = self.investor_shares(round, price)?;
                let after_issue = existing + Decimal::from(investor_shares);
                let top_up = self.pool_shares_needed(
                    round.index,
                    fraction * after_issue - existing_pool,
                    fraction,
                )?;
                (top_up, price, investor_shares)
            }
        };

        existing_shares
            .checked_add(pool_top_up_shares)
            .and_then(|n| n.checked_add(new_investor_shares))
            .ok_or_else(|| {
                Error::invalid_round(round.index, "fully diluted share count is out of range")
            })?;

        let terms = PreferredTerms {
            seniority: round.terms.seniority.unwrap_or(0),
            liquidation_multiple: round.terms.liquidation_multiple,
            participating: round.terms.participating,
            participation_cap: round.terms.participation_cap,
            round_index: round.index,
        };
        let class = ShareClass::preferred(
            &round.id,
            &round.name,
            new_investor_shares,
            investment,
            terms,
        );
        let investor = Holder::new(
            &round.investor_holder_id(),
            &round.name,
            &round.id,
            HolderKind::Investor,
            new_investor_shares,
        );

        let mut next = ledger
            .with_pool_top_up(pool_top_up_shares)
            .with_issued_class(class, investor.clone());
        next.last_round_index = Some(round.index);
        next.verify_consistency()?;

        let pricing = RoundPricing {
            round_index: round.index,
            price_per_share,
            pre_round_fully_diluted_shares: existing_shares,
            pool_top_up_shares,
            new_investor_shares,
            post_money_valuation: post_money,
        };

        debug!(
            "Applied round {} ({}): price/share {}, {} investor shares, {} pool shares ({:?}), {} fully diluted",
            round.index,
            round.id,
            price_per_share,
            new_investor_shares,
            pool_top_up_shares,
            timing,
            next.fully_diluted_shares()
        );

        Ok(RoundOutcome {
            ledger: next,
            investor,
            pricing,
        })
    }

    /// Applies rounds strictly in the order given, returning one outcome per round.
    /// The last outcome's ledger is the final cap table.
    pub fn apply_all(
        &self,
        ledger: &ShareLedger,
        rounds: &[FundingRound],
    ) -> Result<Vec<RoundOutcome>> {
        let mut outcomes: Vec<RoundOutcome> = Vec::with_capacity(rounds.len());
        for round in rounds {
            let current = outcomes.last().map(|o| &o.ledger).unwrap_or(ledger);
            let outcome = self.apply(current, round)?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Final ledger after every round.
    pub fn final_ledger(
        &self,
        ledger: &ShareLedger,
        rounds: &[FundingRound],
    ) -> Result<ShareLedger> {
        let outcomes = self.apply_all(ledger, rounds)?;
        Ok(outcomes
            .into_iter()
            .last()
            .map(|o| o.ledger)
            .unwrap_or_else(|| ledger.clone()))
    }

    /// Checks that round indices strictly increase without applying anything.
    pub fn ensure_ordered(rounds: &[FundingRound]) -> Result<()> {
        for pair in rounds.windows(2) {
            if pair[1].index <= pair[0].index {
                return Err(Error::OutOfOrderRound {
                    previous: pair[0].index,
                    index: pair[1].index,
                });
            }
        }
        Ok(())
    }

    fn validate_round(&self, ledger: &ShareLedger, round: &FundingRound) -> Result<()> {
        if round.investment_amount <= Decimal::ZERO {
            return Err(Error::invalid_round(
                round.index,
                format!("investment amount must be positive, got {}", round.investment_amount),
            ));
        }
        if round.pre_money_valuation <= Decimal::ZERO {
            return Err(Error::invalid_round(
                round.index,
                format!(
                    "pre-money valuation must be positive, got {}",
                    round.pre_money_valuation
                ),
            ));
        }
        if round.option_pool_top_up < Decimal::ZERO || round.option_pool_top_up >= Decimal::ONE {
            return Err(Error::invalid_round(
                round.index,
                format!(
                    "option pool fraction must be in [0, 1), got {}",
                    round.option_pool_top_up
                ),
            ));
        }
        if round.terms.liquidation_multiple < Decimal::ZERO {
            return Err(Error::invalid_round(
                round.index,
                "liquidation multiple must not be negative",
            ));
        }
        if let Some(cap) = round.terms.participation_cap {
            if cap < round.terms.liquidation_multiple {
                return Err(Error::invalid_round(
                    round.index,
                    format!(
                        "participation cap {} is below the liquidation multiple {}",
                        cap, round.terms.liquidation_multiple
                    ),
                ));
            }
        }
        if round.id == OPTION_POOL_ID || round.id == COMMON_CLASS_ID {
            return Err(Error::invalid_round(
                round.index,
                format!("round id {} is reserved", round.id),
            ));
        }
        if ledger.share_class(&round.id).is_some() {
            return Err(Error::invalid_round(
                round.index,
                format!("share class {} already exists", round.id),
            ));
        }
        let investor_id = round.investor_holder_id();
        if investor_id == OPTION_POOL_ID || ledger.holder(&investor_id).is_some() {
            return Err(Error::invalid_round(
                round.index,
                format!("holder {} already exists", investor_id),
            ));
        }
        Ok(())
    }

    /// Solves `(pool + t) = target_fraction × (base + t)` for `t`, given the
    /// numerator `target_fraction × base - pool`. A pool already at or above the
    /// target needs no top-up.
    fn pool_shares_needed(
        &self,
        index: u32,
        shortfall: Decimal,
        target_fraction: Decimal,
    ) -> Result<u64> {
        if shortfall <= Decimal::ZERO {
            return Ok(0);
        }
        shortfall
            .checked_div(Decimal::ONE - target_fraction)
            .and_then(to_whole_shares)
            .ok_or_else(|| Error::invalid_round(index, "pool top-up share count is out of range"))
    }

    fn investor_shares(&self, round: &FundingRound, price: Decimal) -> Result<u64> {
        if price <= Decimal::ZERO {
            return Err(Error::invalid_round(round.index, "price per share is not positive"));
        }
        let Some(raw) = round.investment_amount.checked_div(price) else {
            return Err(Error::invalid_round(round.index, "new share count is out of range"));
        };
        match to_whole_shares(raw) {
            Some(0) => Err(Error::invalid_round(
                round.index,
                format!(
                    "investment of {} buys no whole shares at {} per share",
                    round.investment_amount, price
                ),
            )),
            Some(shares) => Ok(shares),
            None => Err(Error::invalid_round(
                round.index,
                format!("{} new shares is out of range", raw),
            )),
        }
    }
}
