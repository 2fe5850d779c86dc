//! Visible row windows and their incremental resynchronization.
//!
//! A window maps proxy rows (without the synthetic leading row) to absolute
//! rows. Changing the page replaces the target window; the displayed window
//! then catches up through a bounded, resumable two-pointer diff that emits
//! one row notification per differing position.

mod resync;
#[allow(clippy::module_inception)]
mod window;

pub use resync::{ResyncProgress, RowChange, WindowState};
pub use window::{recompute, SampleBounds, Window, WindowParams};
