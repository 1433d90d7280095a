//! Composes the round sequencer, snapshots and the waterfall engine.

use std::collections::HashSet;

use log::{debug, info};
use rayon::prelude::*;
use rust_decimal::Decimal;

use super::{Company, EsopConfig, Founder, Scenario, ScenarioResult};
use crate::constants::{COMMON_CLASS_ID, OPTION_POOL_ID};
use crate::errors::{Error, Result};
use crate::ledger::{Holder, HolderKind, ShareClass, ShareLedger};
use crate::rounds::{FundingRound, RoundSequencer};
use crate::settings::EngineSettings;
use crate::snapshot::{CapTableSnapshot, DilutionTimeline};
use crate::utils::decimal_utils::to_whole_shares;
use crate::waterfall::{ExitResult, WaterfallEngine};

/// Builds the founding ledger: founders' common stock plus the founding pool,
/// sized so it is `esop.pool_fraction` of founding fully diluted shares.
pub fn founding_ledger(
    company: &Company,
    founders: &[Founder],
    esop: &EsopConfig,
) -> Result<ShareLedger> {
    let fraction = esop.pool_fraction;
    if fraction < Decimal::ZERO || fraction >= Decimal::ONE {
        return Err(Error::InvalidCompany(format!(
            "ESOP pool fraction must be in [0, 1), got {}",
            fraction
        )));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for founder in founders {
        if founder.id == OPTION_POOL_ID {
            return Err(Error::InvalidCompany(format!(
                "founder id {} is reserved for the option pool",
                founder.id
            )));
        }
        if !seen.insert(founder.id.as_str()) {
            return Err(Error::InvalidCompany(format!(
                "founder {} listed more than once",
                founder.id
            )));
        }
    }

    let founder_shares = founders
        .iter()
        .try_fold(0u64, |total, f| total.checked_add(f.shares))
        .ok_or_else(|| Error::InvalidCompany("founder share count is out of range".to_string()))?;
    if founder_shares != company.total_shares {
        return Err(Error::InvalidCompany(format!(
            "founders hold {} shares but company {} has {}",
            founder_shares, company.id, company.total_shares
        )));
    }

    let pool_shares = (Decimal::from(company.total_shares) * fraction)
        .checked_div(Decimal::ONE - fraction)
        .and_then(to_whole_shares)
        .filter(|pool| pool.checked_add(company.total_shares).is_some())
        .ok_or_else(|| {
            Error::InvalidCompany("founding pool share count is out of range".to_string())
        })?;

    let holders = founders
        .iter()
        .map(|f| Holder::new(&f.id, &f.name, COMMON_CLASS_ID, HolderKind::Founder, f.shares))
        .collect();
    let ledger = ShareLedger::new(
        vec![ShareClass::common(COMMON_CLASS_ID, "Common", company.total_shares)],
        holders,
    )?;

    debug!(
        "Founding ledger for {}: {} common shares, {} pool shares",
        company.id, company.total_shares, pool_shares
    );
    let founding = ledger.with_pool_top_up(pool_shares);
    founding.verify_consistency()?;
    Ok(founding)
}

/// Full scenario computation: founders and rounds into a final cap table, then
/// the exit value through the waterfall. Pure; arguments are never mutated.
pub fn run(
    company: &Company,
    founders: &[Founder],
    rounds: &[FundingRound],
    esop: &EsopConfig,
    exit_value: Decimal,
    settings: &EngineSettings,
) -> Result<ExitResult> {
    let founding = founding_ledger(company, founders, esop)?;
    let ledger = RoundSequencer::new(settings.clone()).final_ledger(&founding, rounds)?;
    let snapshot = CapTableSnapshot::from_ledger(&ledger);
    WaterfallEngine::new(settings.clone()).run(&snapshot, exit_value)
}

pub trait ScenarioServiceTrait: Send + Sync {
    fn run(
        &self,
        company: &Company,
        founders: &[Founder],
        rounds: &[FundingRound],
        esop: &EsopConfig,
        exit_value: Decimal,
    ) -> Result<ExitResult>;

    /// Final snapshot, dilution timeline and exit result for a saved scenario.
    fn evaluate(&self, scenario: &Scenario) -> Result<ScenarioResult>;

    fn timeline(&self, scenario: &Scenario) -> Result<DilutionTimeline>;

    /// Ownership right after round `round_index` (founding table for indices
    /// before the first round).
    fn snapshot_as_of(&self, scenario: &Scenario, round_index: u32) -> Result<CapTableSnapshot>;

    /// The scenario's final cap table evaluated at each exit value.
    fn payout_curve(&self, scenario: &Scenario, exit_values: &[Decimal])
        -> Result<Vec<ExitResult>>;

    /// Evaluates independent scenarios in parallel. Results keep input order.
    fn evaluate_batch(&self, scenarios: &[Scenario]) -> Vec<Result<ScenarioResult>>;
}

/// Scenario orchestration bound to one set of engine settings.
#[derive(Debug, Clone, Default)]
pub struct ScenarioService {
    settings: EngineSettings,
}

impl ScenarioService {
    pub fn new(settings: EngineSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn sequencer(&self) -> RoundSequencer {
        RoundSequencer::new(self.settings.clone())
    }

    fn waterfall(&self) -> WaterfallEngine {
        WaterfallEngine::new(self.settings.clone())
    }
}

impl ScenarioServiceTrait for ScenarioService {
    fn run(
        &self,
        company: &Company,
        founders: &[Founder],
        rounds: &[FundingRound],
        esop: &EsopConfig,
        exit_value: Decimal,
    ) -> Result<ExitResult> {
        run(company, founders, rounds, esop, exit_value, &self.settings)
    }

    fn evaluate(&self, scenario: &Scenario) -> Result<ScenarioResult> {
        debug!(
            "Evaluating scenario {} with {} rounds at exit {}",
            scenario.id,
            scenario.rounds.len(),
            scenario.exit_value
        );
        let timeline = self.timeline(scenario)?;
        let snapshot = timeline
            .final_snapshot()
            .cloned()
            .ok_or(Error::EmptyCapTable)?;
        let exit = self.waterfall().run(&snapshot, scenario.exit_value)?;

        Ok(ScenarioResult {
            scenario_id: scenario.id.clone(),
            snapshot,
            timeline,
            exit,
        })
    }

    fn timeline(&self, scenario: &Scenario) -> Result<DilutionTimeline> {
        let founding = founding_ledger(
            &scenario.company,
            &scenario.founders,
            &scenario.esop_config(),
        )?;
        let outcomes = self.sequencer().apply_all(&founding, &scenario.rounds)?;
        Ok(DilutionTimeline::build(&founding, &outcomes))
    }

    fn snapshot_as_of(&self, scenario: &Scenario, round_index: u32) -> Result<CapTableSnapshot> {
        RoundSequencer::ensure_ordered(&scenario.rounds)?;
        let founding = founding_ledger(
            &scenario.company,
            &scenario.founders,
            &scenario.esop_config(),
        )?;
        // Later rounds are priced off earlier ones, so only the prefix is applied.
        let prefix: Vec<FundingRound> = scenario
            .rounds
            .iter()
            .take_while(|r| r.index <= round_index)
            .cloned()
            .collect();
        let ledger = self.sequencer().final_ledger(&founding, &prefix)?;
        Ok(CapTableSnapshot::from_ledger(&ledger))
    }

    fn payout_curve(
        &self,
        scenario: &Scenario,
        exit_values: &[Decimal],
    ) -> Result<Vec<ExitResult>> {
        let timeline = self.timeline(scenario)?;
        let snapshot = timeline.final_snapshot().ok_or(Error::EmptyCapTable)?;
        self.waterfall().payout_curve(snapshot, exit_values)
    }

    fn evaluate_batch(&self, scenarios: &[Scenario]) -> Vec<Result<ScenarioResult>> {
        info!("Evaluating {} scenarios in parallel", scenarios.len());
        scenarios
            .par_iter()
            .map(|scenario| self.evaluate(scenario))
            .collect()
    }
}
