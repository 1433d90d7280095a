//! Exit waterfall - preference stacking, convert-vs-keep decisions and payouts.

mod preference_stack;
mod waterfall_engine;
mod waterfall_model;

#[cfg(test)]
mod waterfall_engine_tests;

pub use preference_stack::{PreferenceClaim, PreferenceStack};
pub use waterfall_engine::WaterfallEngine;
pub use waterfall_model::{ClassPayout, ExitResult, HolderPayout};
