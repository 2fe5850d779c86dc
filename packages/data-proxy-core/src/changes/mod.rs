//! Pending per-row changes layered over the base table.

mod cache;
mod change_set;
mod record;

pub use cache::ChangeCache;
pub use change_set::{CancelOutcome, ChangeSet, DeleteOutcome, RecordKey, TableContext};
pub use record::{ChangeRecord, ChangeValue};
