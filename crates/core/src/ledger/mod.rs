//! Share ledger - immutable share classes and holders, one generation per round.

mod ledger_model;


pub use ledger_model::{Holder, HolderKind, PreferredTerms, ShareClass, ShareClassKind, ShareLedger};
