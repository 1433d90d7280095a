//! Capflow Core - cap-table dilution and exit waterfall engine.
//!
//! This crate models a company's share ledger across funding rounds and
//! distributes exit proceeds through a liquidation-preference waterfall.
//! It is a pure calculation library: callers supply founders, rounds and an
//! exit value, and get back snapshots and payouts. Nothing here performs I/O.

pub mod constants;
pub mod errors;
pub mod ledger;
pub mod rounds;
pub mod scenario;
pub mod settings;
pub mod snapshot;
pub mod utils;
pub mod waterfall;

// Re-export the types most callers need
pub use ledger::{Holder, HolderKind, ShareClass, ShareClassKind, ShareLedger};
pub use rounds::{FundingRound, RoundSequencer, RoundTerms};
pub use scenario::{
    Company, EsopConfig, Founder, Scenario, ScenarioResult, ScenarioService, ScenarioServiceTrait,
};
pub use settings::{EngineSettings, PoolTiming, SeniorityTieBreak};
pub use snapshot::{CapTableSnapshot, DilutionTimeline};
pub use waterfall::{ExitResult, WaterfallEngine};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
