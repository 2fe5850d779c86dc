//! Overlay of pending inserts, updates and deletes.

use std::collections::HashMap;

use super::record::{ChangeRecord, ChangeValue};
use crate::error::ProxyError;
use crate::table::{AccessFlags, BaseTable, ColumnSpec};
use crate::types::{Value, ValueAttributes};

/// Read access to the base table as the overlay needs it.
#[derive(Clone, Copy)]
pub struct TableContext<'a> {
    pub base: &'a dyn BaseTable,
    pub columns: &'a [ColumnSpec],
    pub access: AccessFlags,
    pub base_count: Option<usize>,
}

impl<'a> TableContext<'a> {
    pub fn column(&self, col: usize) -> Result<&'a ColumnSpec, ProxyError> {
        self.columns.get(col).ok_or(ProxyError::ColumnOutOfRange {
            col,
            count: self.columns.len(),
        })
    }

    /// Reads a cell of the base table.
    pub fn read(&self, col: usize, row: usize) -> Result<Value, ProxyError> {
        self.base
            .get_value(col, row)
            .map_err(|source| ProxyError::BaseRead { row, col, source })
    }

    /// Reads a whole base row.
    pub fn snapshot(&self, row: usize) -> Result<Vec<Value>, ProxyError> {
        (0..self.columns.len()).map(|col| self.read(col, row)).collect()
    }

    fn base_len(&self) -> usize {
        self.base_count.unwrap_or(usize::MAX)
    }
}

/// Where a record lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKey {
    /// Record of an existing base row
    Existing(usize),
    /// Record of the n-th uncommitted new row
    New(usize),
}

/// Result of [`ChangeSet::mark_delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Marked,
    AlreadyMarked,
    /// The row was an uncommitted insert at this new-row index and is gone
    DiscardedInsert(usize),
}

/// Result of [`ChangeSet::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Unchanged,
    /// The row now reads differently
    Reverted,
    /// The row was an uncommitted insert at this new-row index and is gone
    DiscardedInsert(usize),
}

/// All pending changes, addressed by absolute row.
///
/// Absolute rows below the base row count are base rows; above it they
/// index the list of new rows.
#[derive(Debug, Default)]
pub struct ChangeSet {
    existing: HashMap<usize, ChangeRecord>,
    inserted: Vec<ChangeRecord>,
    next_seq: u64,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Key of the record for `abs`, if any.
    pub fn key_for(&self, abs: usize, base_count: Option<usize>) -> Option<RecordKey> {
        let base_len = base_count.unwrap_or(usize::MAX);
        if abs < base_len {
            self.existing
                .contains_key(&abs)
                .then_some(RecordKey::Existing(abs))
        } else {
            let index = abs - base_len;
            (index < self.inserted.len()).then_some(RecordKey::New(index))
        }
    }

    pub fn record(&self, key: RecordKey) -> Option<&ChangeRecord> {
        match key {
            RecordKey::Existing(row) => self.existing.get(&row),
            RecordKey::New(index) => self.inserted.get(index),
        }
    }

    pub fn record_for(&self, abs: usize, base_count: Option<usize>) -> Option<&ChangeRecord> {
        self.key_for(abs, base_count).and_then(|k| self.record(k))
    }

    /// Removes a record, returning it.
    pub fn remove(&mut self, key: RecordKey) -> Option<ChangeRecord> {
        match key {
            RecordKey::Existing(row) => self.existing.remove(&row),
            RecordKey::New(index) if index < self.inserted.len() => {
                Some(self.inserted.remove(index))
            }
            RecordKey::New(_) => None,
        }
    }

    /// Key of the record created with sequence number `seq`.
    pub fn key_of_seq(&self, seq: u64) -> Option<RecordKey> {
        self.existing
            .iter()
            .find(|(_, r)| r.seq == seq)
            .map(|(&row, _)| RecordKey::Existing(row))
            .or_else(|| {
                self.inserted
                    .iter()
                    .position(|r| r.seq == seq)
                    .map(RecordKey::New)
            })
    }

    /// Most recently created record.
    pub fn latest_key(&self) -> Option<RecordKey> {
        let existing = self
            .existing
            .iter()
            .map(|(&row, r)| (r.seq, RecordKey::Existing(row)));
        let inserted = self
            .inserted
            .iter()
            .enumerate()
            .map(|(i, r)| (r.seq, RecordKey::New(i)));
        existing.chain(inserted).max_by_key(|(seq, _)| *seq).map(|(_, k)| k)
    }

    /// Whether `abs` is a valid absolute row.
    pub fn contains_row(&self, abs: usize, base_count: Option<usize>) -> bool {
        match base_count {
            Some(n) => abs < n + self.inserted.len(),
            None => true,
        }
    }

    pub fn is_new_row(&self, abs: usize, base_count: Option<usize>) -> bool {
        matches!(self.key_for(abs, base_count), Some(RecordKey::New(_)))
    }

    pub fn is_marked_delete(&self, abs: usize, base_count: Option<usize>) -> bool {
        self.record_for(abs, base_count)
            .is_some_and(|r| r.marked_for_delete)
    }

    pub fn has_pending_changes(&self, abs: usize, base_count: Option<usize>) -> bool {
        self.record_for(abs, base_count).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.existing.is_empty() && self.inserted.is_empty()
    }

    pub fn count_new(&self) -> usize {
        self.inserted.len()
    }

    /// Number of rows with pending changes, new rows included.
    pub fn count_modified(&self) -> usize {
        self.existing.len() + self.inserted.len()
    }

    /// Current value of a cell.
    pub fn get_value(
        &self,
        abs: usize,
        col: usize,
        ctx: &TableContext<'_>,
    ) -> Result<Value, ProxyError> {
        let spec = ctx.column(col)?;
        let record = self.record_for(abs, ctx.base_count);
        if let Some(cv) = record.and_then(|r| r.overrides.get(&col)) {
            return Ok(cv.current());
        }
        if abs < ctx.base_len() {
            return ctx.read(col, abs);
        }
        if record.is_none() {
            return Err(ProxyError::RowOutOfRange { row: abs });
        }
        Ok(spec.default.clone().unwrap_or(Value::Null))
    }

    /// Value the cell had before any pending change.
    pub fn get_original_value(
        &self,
        abs: usize,
        col: usize,
        ctx: &TableContext<'_>,
    ) -> Result<Value, ProxyError> {
        ctx.column(col)?;
        if abs >= ctx.base_len() {
            return Ok(Value::Null);
        }
        match self.record_for(abs, ctx.base_count).and_then(|r| r.original_value(col)) {
            Some(value) => Ok(value.clone()),
            None => ctx.read(col, abs),
        }
    }

    /// Attribute flags of a cell.
    pub fn get_attributes(
        &self,
        abs: usize,
        col: usize,
        ctx: &TableContext<'_>,
    ) -> Result<ValueAttributes, ProxyError> {
        let spec = ctx.column(col)?;
        let is_new = abs >= ctx.base_len();
        let mut attrs = spec.base_attributes();
        match self
            .record_for(abs, ctx.base_count)
            .and_then(|r| r.overrides.get(&col))
        {
            Some(cv) => attrs |= cv.attributes - ValueAttributes::IS_NULL,
            None => attrs |= ValueAttributes::IS_UNCHANGED,
        }
        if self.get_value(abs, col, ctx)?.is_null() {
            attrs |= ValueAttributes::IS_NULL;
        }
        if !is_new {
            attrs |= ValueAttributes::HAS_VALUE_ORIG;
            if !ctx.access.update {
                attrs |= ValueAttributes::READ_ONLY;
            }
        }
        if !spec.allow_null
            && attrs.contains(ValueAttributes::IS_NULL)
            && !attrs.contains(ValueAttributes::IS_DEFAULT)
        {
            attrs |= ValueAttributes::DATA_NON_VALID;
        }
        Ok(attrs)
    }

    fn check_writable<'a>(
        &self,
        abs: usize,
        col: usize,
        ctx: &TableContext<'a>,
    ) -> Result<&'a ColumnSpec, ProxyError> {
        let spec = ctx.column(col)?;
        if !self.contains_row(abs, ctx.base_count) {
            return Err(ProxyError::RowOutOfRange { row: abs });
        }
        let is_new = abs >= ctx.base_len();
        if spec.read_only || (!is_new && !ctx.access.update) {
            return Err(ProxyError::ColumnReadOnly { column: col });
        }
        Ok(spec)
    }

    /// Record for `abs`, created with a snapshot of the base row if missing.
    fn record_mut(
        &mut self,
        abs: usize,
        ctx: &TableContext<'_>,
    ) -> Result<&mut ChangeRecord, ProxyError> {
        if abs >= ctx.base_len() {
            let index = abs - ctx.base_len();
            return self
                .inserted
                .get_mut(index)
                .ok_or(ProxyError::RowOutOfRange { row: abs });
        }
        if !self.existing.contains_key(&abs) {
            let original = ctx.snapshot(abs)?;
            let seq = self.seq();
            self.existing
                .insert(abs, ChangeRecord::for_base_row(abs, original, seq));
        }
        self.existing
            .get_mut(&abs)
            .ok_or(ProxyError::RowOutOfRange { row: abs })
    }

    fn drop_if_empty(&mut self, abs: usize, ctx: &TableContext<'_>) {
        if abs < ctx.base_len() && self.existing.get(&abs).is_some_and(ChangeRecord::is_empty) {
            self.existing.remove(&abs);
        }
    }

    /// Writes a cell.
    ///
    /// # Returns
    /// `Ok(true)` if the row now reads differently, `Ok(false)` for a no-op.
    pub fn set_value(
        &mut self,
        abs: usize,
        col: usize,
        value: Value,
        ctx: &TableContext<'_>,
    ) -> Result<bool, ProxyError> {
        let spec = self.check_writable(abs, col, ctx)?;
        let type_ok = if value.is_null() {
            spec.allow_null
        } else {
            value.fits(spec.value_type)
        };
        if !type_ok {
            return Err(ProxyError::TypeMismatch {
                column: col,
                expected: spec.value_type,
                got: value.value_type(),
            });
        }
        if self.get_value(abs, col, ctx)?.same_as(&value) {
            return Ok(false);
        }

        let base_attrs = spec.base_attributes();
        let record = self.record_mut(abs, ctx)?;
        if record.original_value(col).is_some_and(|v| v.same_as(&value)) {
            record.overrides.remove(&col);
        } else {
            let mut attrs = base_attrs;
            if record.base_row.is_some() {
                attrs |= ValueAttributes::HAS_VALUE_ORIG;
            }
            record.overrides.insert(col, ChangeValue::new(value, attrs));
        }
        self.drop_if_empty(abs, ctx);
        Ok(true)
    }

    /// Makes a cell take the column default on commit.
    pub fn set_default(
        &mut self,
        abs: usize,
        col: usize,
        ctx: &TableContext<'_>,
    ) -> Result<bool, ProxyError> {
        let spec = self.check_writable(abs, col, ctx)?;
        if !spec.can_be_default() {
            return Err(ProxyError::NoDefault { column: col });
        }
        if self
            .record_for(abs, ctx.base_count)
            .and_then(|r| r.overrides.get(&col))
            .is_some_and(ChangeValue::is_default)
        {
            return Ok(false);
        }
        let default = spec.default.clone();
        let mut attrs = spec.base_attributes();
        let record = self.record_mut(abs, ctx)?;
        if record.base_row.is_some() {
            attrs |= ValueAttributes::HAS_VALUE_ORIG;
        }
        record
            .overrides
            .insert(col, ChangeValue::default_of(default, attrs));
        Ok(true)
    }

    /// Adds an uncommitted row; returns its absolute row.
    ///
    /// Columns with a default start out as "use default".
    pub fn append_new_row(&mut self, ctx: &TableContext<'_>) -> Result<usize, ProxyError> {
        if !ctx.access.insert {
            return Err(ProxyError::InsertNotSupported);
        }
        let base_count = ctx.base_count.ok_or(ProxyError::UnknownRowCount)?;
        let mut record = ChangeRecord::for_new_row(self.seq());
        for (col, spec) in ctx.columns.iter().enumerate() {
            if spec.can_be_default() {
                record.overrides.insert(
                    col,
                    ChangeValue::default_of(spec.default.clone(), spec.base_attributes()),
                );
            }
        }
        self.inserted.push(record);
        Ok(base_count + self.inserted.len() - 1)
    }

    /// Flags a row for deletion, or drops it if it is an uncommitted insert.
    pub fn mark_delete(
        &mut self,
        abs: usize,
        ctx: &TableContext<'_>,
    ) -> Result<DeleteOutcome, ProxyError> {
        if !self.contains_row(abs, ctx.base_count) {
            return Err(ProxyError::RowOutOfRange { row: abs });
        }
        if abs >= ctx.base_len() {
            let index = abs - ctx.base_len();
            self.inserted.remove(index);
            return Ok(DeleteOutcome::DiscardedInsert(index));
        }
        if !ctx.access.delete {
            return Err(ProxyError::DeleteNotSupported);
        }
        let record = self.record_mut(abs, ctx)?;
        if record.marked_for_delete {
            return Ok(DeleteOutcome::AlreadyMarked);
        }
        record.marked_for_delete = true;
        Ok(DeleteOutcome::Marked)
    }

    /// Clears a delete flag; returns whether one was set.
    pub fn unmark_delete(&mut self, abs: usize, base_count: Option<usize>) -> bool {
        let Some(RecordKey::Existing(row)) = self.key_for(abs, base_count) else {
            return false;
        };
        let Some(record) = self.existing.get_mut(&row) else {
            return false;
        };
        if !record.marked_for_delete {
            return false;
        }
        record.marked_for_delete = false;
        if record.is_empty() {
            self.existing.remove(&row);
        }
        true
    }

    /// Drops pending values of one column, or of the whole row when `col` is `None`.
    pub fn cancel(
        &mut self,
        abs: usize,
        col: Option<usize>,
        base_count: Option<usize>,
    ) -> CancelOutcome {
        let Some(key) = self.key_for(abs, base_count) else {
            return CancelOutcome::Unchanged;
        };
        let discard = match (col, self.record_mut_by_key(key)) {
            (_, None) => return CancelOutcome::Unchanged,
            (None, Some(_)) => true,
            (Some(col), Some(record)) => {
                if record.overrides.remove(&col).is_none() {
                    return CancelOutcome::Unchanged;
                }
                record.is_empty()
            }
        };
        if discard {
            self.remove(key);
            if let RecordKey::New(index) = key {
                return CancelOutcome::DiscardedInsert(index);
            }
        }
        CancelOutcome::Reverted
    }

    fn record_mut_by_key(&mut self, key: RecordKey) -> Option<&mut ChangeRecord> {
        match key {
            RecordKey::Existing(row) => self.existing.get_mut(&row),
            RecordKey::New(index) => self.inserted.get_mut(index),
        }
    }

    /// Base rows with a record, ascending.
    pub fn existing_rows(&self) -> Vec<usize> {
        let mut rows: Vec<usize> = self.existing.keys().copied().collect();
        rows.sort_unstable();
        rows
    }

    /// Renumbers records after a base row was inserted at `row`.
    pub fn on_base_row_inserted(&mut self, row: usize) {
        self.existing = std::mem::take(&mut self.existing)
            .into_iter()
            .map(|(r, mut rec)| {
                let r = if r >= row { r + 1 } else { r };
                rec.base_row = Some(r);
                (r, rec)
            })
            .collect();
    }

    /// Drops the record of a removed base row and renumbers those after it.
    pub fn on_base_row_removed(&mut self, row: usize) -> Option<ChangeRecord> {
        let removed = self.existing.remove(&row);
        self.existing = std::mem::take(&mut self.existing)
            .into_iter()
            .map(|(r, mut rec)| {
                let r = if r > row { r - 1 } else { r };
                rec.base_row = Some(r);
                (r, rec)
            })
            .collect();
        removed
    }

    /// Removes every record: existing rows ascending, then new rows in order.
    pub fn drain(&mut self) -> (Vec<ChangeRecord>, Vec<ChangeRecord>) {
        let mut existing: Vec<ChangeRecord> =
            std::mem::take(&mut self.existing).into_values().collect();
        existing.sort_by_key(|r| r.base_row);
        (existing, std::mem::take(&mut self.inserted))
    }

    /// Re-attaches a record, as when restoring cached changes.
    pub(crate) fn restore(&mut self, mut record: ChangeRecord) {
        record.seq = self.seq();
        match record.base_row {
            Some(row) => {
                self.existing.insert(row, record);
            }
            None => self.inserted.push(record),
        }
    }
}
