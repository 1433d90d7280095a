//! Engine settings - the policy knobs for conventions that differ between cap tables.

mod settings_model;

pub use settings_model::{EngineSettings, PoolTiming, SeniorityTieBreak};
