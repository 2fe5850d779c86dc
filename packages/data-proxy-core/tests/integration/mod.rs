//! Integration tests for the data proxy.
//!
//! Organized by area:
//! 1. Reference scenarios (paging, append, type errors, filtering, batch commit)
//! 2. Editing properties (set/cancel, delete marks, appends)
//! 3. Commit and base table contract handling
//! 4. Base table notifications and the change cache
//! 5. Windows, deferred resync and filters

pub mod base_events_tests;
pub mod commit_tests;
pub mod editing_tests;
pub mod helpers;
pub mod window_tests;
