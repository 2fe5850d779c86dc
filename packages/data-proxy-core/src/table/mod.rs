//! Base table collaborator interface and a flat in-memory implementation.

mod column;
mod memory;

use std::sync::mpsc::Receiver;

pub use column::ColumnSpec;
pub use memory::{MemoryTable, TableDocument};

use crate::error::TableError;
use crate::types::Value;

/// Capabilities offered by a base table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessFlags {
    pub random_access: bool,
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
}

impl AccessFlags {
    /// Every capability.
    pub const ALL: AccessFlags = AccessFlags {
        random_access: true,
        insert: true,
        update: true,
        delete: true,
    };

    /// Random access reads only.
    pub const READ_ONLY: AccessFlags = AccessFlags {
        random_access: true,
        insert: false,
        update: false,
        delete: false,
    };
}

impl Default for AccessFlags {
    fn default() -> Self {
        Self::ALL
    }
}

/// Change notification sent by a base table, in model row numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableEvent {
    RowInserted(usize),
    RowUpdated(usize),
    RowRemoved(usize),
    /// The whole table changed shape
    Reset,
}

/// Advisory hint forwarded to a base table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableHint {
    /// A series of writes follows
    StartBatch,
    /// The series of writes is over
    EndBatch,
}

/// A read-mostly table the proxy sits on top of.
///
/// Writes are synchronous. After a successful write the table must have sent
/// the matching [`TableEvent`] to every subscriber before returning.
pub trait BaseTable {
    /// Number of rows, or `None` when the table cannot tell.
    fn row_count(&self) -> Option<usize>;

    /// Column definitions, in column order.
    fn columns(&self) -> &[ColumnSpec];

    fn column_count(&self) -> usize {
        self.columns().len()
    }

    fn access_flags(&self) -> AccessFlags;

    /// Reads one cell.
    fn get_value(&self, col: usize, row: usize) -> Result<Value, TableError>;

    /// Replaces every column of `row`. A `None` entry asks for the column default.
    fn set_row_values(&self, row: usize, values: Vec<Option<Value>>) -> Result<(), TableError>;

    /// Appends a row and returns its model row. A `None` entry asks for the column default.
    fn append_row(&self, values: Vec<Option<Value>>) -> Result<usize, TableError>;

    fn remove_row(&self, row: usize) -> Result<(), TableError>;

    /// Advisory; tables may ignore hints.
    fn send_hint(&self, _hint: TableHint) {}

    /// Registers a new notification channel.
    fn subscribe(&self) -> Receiver<TableEvent>;
}
