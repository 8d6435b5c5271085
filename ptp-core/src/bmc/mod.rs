//! The Best Master Clock algorithm: foreign-master bookkeeping, data-set
//! comparison, and the state-decision algorithm (`spec.md` §4.3-§4.4).

pub mod dataset_comparison;
pub mod foreign_master;
pub mod state_decision;

pub use dataset_comparison::{compare, ComparisonRecord};
pub use foreign_master::{ForeignMasterRecord, ForeignMasterTable};
pub use state_decision::{decide, BmcAction};
