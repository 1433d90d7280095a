//! Funding rounds and the sequencer that applies them to a share ledger.

mod round_sequencer;
mod rounds_model;


pub use round_sequencer::RoundSequencer;
pub use rounds_model::{FundingRound, RoundOutcome, RoundPricing, RoundTerms};
