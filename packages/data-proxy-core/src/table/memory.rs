//! Flat array-of-rows table.

use std::sync::mpsc::{channel, Receiver, Sender};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::{AccessFlags, BaseTable, ColumnSpec, TableEvent, TableHint};
use crate::error::TableError;
use crate::types::Value;

/// Serialized form of a [`MemoryTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDocument {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

/// In-memory base table holding every row as a vector of values.
///
/// Writes validate types and nullability, fill defaults, and notify all
/// subscribers synchronously.
#[derive(Debug)]
pub struct MemoryTable {
    /// Table name
    pub name: String,
    columns: Vec<ColumnSpec>,
    access: AccessFlags,
    rows: RwLock<Vec<Vec<Value>>>,
    subscribers: Mutex<Vec<Sender<TableEvent>>>,
    hints: Mutex<Vec<TableHint>>,
}

impl MemoryTable {
    /// Creates an empty table with every capability.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            name: name.into(),
            columns,
            access: AccessFlags::ALL,
            rows: RwLock::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
            hints: Mutex::new(Vec::new()),
        }
    }

    pub fn with_access(mut self, access: AccessFlags) -> Self {
        self.access = access;
        self
    }

    /// Loads initial rows without sending notifications.
    ///
    /// # Returns
    /// `Result<Self, TableError>`, failing on the first invalid row.
    pub fn with_rows(self, rows: Vec<Vec<Value>>) -> Result<Self, TableError> {
        let mut checked = Vec::with_capacity(rows.len());
        for row in rows {
            checked.push(self.check_row(row)?);
        }
        *self.rows.write() = checked;
        Ok(self)
    }

    pub fn from_document(doc: TableDocument) -> Result<Self, TableError> {
        MemoryTable::new(doc.name, doc.columns).with_rows(doc.rows)
    }

    pub fn to_document(&self) -> TableDocument {
        TableDocument {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: self.rows.read().clone(),
        }
    }

    /// Returns a copy of one row.
    pub fn row(&self, row: usize) -> Option<Vec<Value>> {
        self.rows.read().get(row).cloned()
    }

    /// Returns a copy of all rows.
    pub fn rows(&self) -> Vec<Vec<Value>> {
        self.rows.read().clone()
    }

    /// Hints received so far, oldest first.
    pub fn hints(&self) -> Vec<TableHint> {
        self.hints.lock().clone()
    }

    /// Overwrites one cell from outside the proxy and notifies subscribers.
    pub fn update_cell(&self, col: usize, row: usize, value: Value) -> Result<(), TableError> {
        self.check_col(col)?;
        let value = self.check_value(col, value)?;
        {
            let mut rows = self.rows.write();
            let count = rows.len();
            let target = rows
                .get_mut(row)
                .ok_or(TableError::RowOutOfRange { row, count })?;
            target[col] = value;
        }
        self.notify(TableEvent::RowUpdated(row));
        Ok(())
    }

    /// Inserts a complete row at `row` from outside the proxy and notifies subscribers.
    pub fn insert_row_at(&self, row: usize, values: Vec<Value>) -> Result<(), TableError> {
        let values = self.check_row(values)?;
        {
            let mut rows = self.rows.write();
            if row > rows.len() {
                return Err(TableError::RowOutOfRange {
                    row,
                    count: rows.len(),
                });
            }
            rows.insert(row, values);
        }
        self.notify(TableEvent::RowInserted(row));
        Ok(())
    }

    /// Replaces the whole content and sends a reset notification.
    pub fn replace_rows(&self, rows: Vec<Vec<Value>>) -> Result<(), TableError> {
        let mut checked = Vec::with_capacity(rows.len());
        for row in rows {
            checked.push(self.check_row(row)?);
        }
        *self.rows.write() = checked;
        self.notify(TableEvent::Reset);
        Ok(())
    }

    fn notify(&self, event: TableEvent) {
        tracing::debug!("table '{}' event {:?}", self.name, event);
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event).is_ok());
    }

    fn check_col(&self, col: usize) -> Result<(), TableError> {
        if col >= self.columns.len() {
            return Err(TableError::ColumnOutOfRange {
                col,
                count: self.columns.len(),
            });
        }
        Ok(())
    }

    fn check_value(&self, col: usize, value: Value) -> Result<Value, TableError> {
        let spec = &self.columns[col];
        if value.is_null() && !spec.allow_null {
            return Err(TableError::InvalidValue {
                column: spec.name.clone(),
                reason: "NULL not allowed".to_string(),
            });
        }
        if !value.fits(spec.value_type) {
            return Err(TableError::InvalidValue {
                column: spec.name.clone(),
                reason: format!("expected {}, got {}", spec.value_type, value.value_type()),
            });
        }
        Ok(value)
    }

    fn check_row(&self, values: Vec<Value>) -> Result<Vec<Value>, TableError> {
        if values.len() != self.columns.len() {
            return Err(TableError::ArityMismatch {
                expected: self.columns.len(),
                got: values.len(),
            });
        }
        values
            .into_iter()
            .enumerate()
            .map(|(col, value)| self.check_value(col, value))
            .collect()
    }

    /// Fills defaults (`None` entries) and validates a written row.
    fn resolve_row(
        &self,
        values: Vec<Option<Value>>,
        rows: &[Vec<Value>],
    ) -> Result<Vec<Value>, TableError> {
        if values.len() != self.columns.len() {
            return Err(TableError::ArityMismatch {
                expected: self.columns.len(),
                got: values.len(),
            });
        }
        let mut resolved = Vec::with_capacity(values.len());
        for (col, value) in values.into_iter().enumerate() {
            let spec = &self.columns[col];
            let value = match value {
                Some(v) => v,
                None if spec.auto_increment => Value::Int(next_serial(rows, col)),
                None => spec.default.clone().unwrap_or(Value::Null),
            };
            resolved.push(self.check_value(col, value)?);
        }
        Ok(resolved)
    }
}

fn next_serial(rows: &[Vec<Value>], col: usize) -> i64 {
    rows.iter()
        .filter_map(|r| match r.get(col) {
            Some(Value::Int(i)) => Some(*i),
            _ => None,
        })
        .max()
        .map_or(1, |m| m + 1)
}

impl BaseTable for MemoryTable {
    fn row_count(&self) -> Option<usize> {
        Some(self.rows.read().len())
    }

    fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    fn access_flags(&self) -> AccessFlags {
        self.access
    }

    fn get_value(&self, col: usize, row: usize) -> Result<Value, TableError> {
        self.check_col(col)?;
        let rows = self.rows.read();
        rows.get(row)
            .map(|r| r[col].clone())
            .ok_or(TableError::RowOutOfRange {
                row,
                count: rows.len(),
            })
    }

    fn set_row_values(&self, row: usize, values: Vec<Option<Value>>) -> Result<(), TableError> {
        if !self.access.update {
            return Err(TableError::Unsupported("update"));
        }
        {
            let mut rows = self.rows.write();
            let count = rows.len();
            if row >= count {
                return Err(TableError::RowOutOfRange { row, count });
            }
            let resolved = self.resolve_row(values, &rows)?;
            rows[row] = resolved;
        }
        self.notify(TableEvent::RowUpdated(row));
        Ok(())
    }

    fn append_row(&self, values: Vec<Option<Value>>) -> Result<usize, TableError> {
        if !self.access.insert {
            return Err(TableError::Unsupported("insert"));
        }
        let row = {
            let mut rows = self.rows.write();
            let resolved = self.resolve_row(values, &rows)?;
            rows.push(resolved);
            rows.len() - 1
        };
        self.notify(TableEvent::RowInserted(row));
        Ok(row)
    }

    fn remove_row(&self, row: usize) -> Result<(), TableError> {
        if !self.access.delete {
            return Err(TableError::Unsupported("delete"));
        }
        {
            let mut rows = self.rows.write();
            let count = rows.len();
            if row >= count {
                return Err(TableError::RowOutOfRange { row, count });
            }
            rows.remove(row);
        }
        self.notify(TableEvent::RowRemoved(row));
        Ok(())
    }

    fn send_hint(&self, hint: TableHint) {
        self.hints.lock().push(hint);
    }

    fn subscribe(&self) -> Receiver<TableEvent> {
        let (tx, rx) = channel();
        self.subscribers.lock().push(tx);
        rx
    }
}
