//! Change-tracking and windowing engine over a read-mostly base table.
//!
//! Provides the row address spaces, the pending-change overlay, paginated
//! windows with incremental resync, delegated filtering, and commit of
//! pending changes back to the base table.

pub mod address;
pub mod changes;
pub mod commit;
pub mod config;
pub mod error;
pub mod filter;
pub mod proxy;
pub mod table;
pub mod types;
pub mod window;

pub use config::ProxyConfig;
pub use error::{FilterError, ProxyError, TableError};
pub use filter::{FilterExpr, ParseMode, QueryExecutor, ScanExecutor};
pub use proxy::{DataProxy, ProxyEvent};
pub use table::{AccessFlags, BaseTable, ColumnSpec, MemoryTable, TableDocument};
pub use types::{Value, ValueAttributes, ValueType};
pub use window::ResyncProgress;
