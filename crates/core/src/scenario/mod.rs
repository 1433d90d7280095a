//! Scenario orchestration - sequencer, snapshot and waterfall composed for a full scenario.

mod scenario_model;
mod scenario_service;


pub use scenario_model::{Company, EsopConfig, Founder, Scenario, ScenarioResult};
pub use scenario_service::{founding_ledger, run, ScenarioService, ScenarioServiceTrait};
