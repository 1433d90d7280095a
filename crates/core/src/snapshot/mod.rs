//! Cap table snapshots and the dilution timeline built from them.

mod dilution_timeline;
mod snapshot_model;


pub use dilution_timeline::{DilutionTimeline, TimelineStep};
pub use snapshot_model::{CapTableSnapshot, ClassOwnership, HolderOwnership};
