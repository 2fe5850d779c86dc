//! Conversions between model, absolute, and proxy row numbers.
//!
//! * model row: index into the base table
//! * absolute row: base rows first, then uncommitted new rows in order
//! * proxy row: index as shown to consumers, after the optional synthetic
//!   leading row and the current window

use crate::changes::{ChangeRecord, ChangeSet};
use crate::window::WindowState;

/// Read-only view over the data needed to translate row numbers.
#[derive(Clone, Copy)]
pub struct RowAddressTranslator<'a> {
    base_count: Option<usize>,
    changes: &'a ChangeSet,
    window: &'a WindowState,
    null_offset: usize,
}

impl<'a> RowAddressTranslator<'a> {
    pub fn new(
        base_count: Option<usize>,
        changes: &'a ChangeSet,
        window: &'a WindowState,
        add_null_entry: bool,
    ) -> Self {
        Self {
            base_count,
            changes,
            window,
            null_offset: usize::from(add_null_entry),
        }
    }

    /// Base rows plus new rows, `None` if the base count is unknown.
    pub fn total_rows(&self) -> Option<usize> {
        self.base_count.map(|n| n + self.changes.count_new())
    }

    /// 1 when a synthetic leading row is shown.
    pub fn null_offset(&self) -> usize {
        self.null_offset
    }

    pub fn is_synthetic(&self, proxy_row: usize) -> bool {
        proxy_row < self.null_offset
    }

    pub fn model_row_to_absolute(&self, row: usize) -> Option<usize> {
        match self.base_count {
            Some(n) if row >= n => None,
            _ => Some(row),
        }
    }

    /// Model row (for base rows) and pending record of an absolute row.
    pub fn absolute_to_model_row(&self, abs: usize) -> (Option<usize>, Option<&'a ChangeRecord>) {
        let model_row = match self.base_count {
            Some(n) if abs >= n => None,
            _ => Some(abs),
        };
        (model_row, self.changes.record_for(abs, self.base_count))
    }

    pub fn proxy_to_absolute(&self, proxy_row: usize) -> Option<usize> {
        let index = proxy_row.checked_sub(self.null_offset)?;
        self.window.get(index, self.total_rows())
    }

    pub fn absolute_to_proxy(&self, abs: usize) -> Option<usize> {
        self.window
            .position(abs, self.total_rows())
            .map(|i| i + self.null_offset)
    }

    /// Rows shown to consumers, synthetic row included.
    pub fn row_count(&self) -> Option<usize> {
        self.window
            .len(self.total_rows())
            .map(|n| n + self.null_offset)
    }
}
