//! Writing pending changes back to the base table, or discarding them.

use crate::changes::{CancelOutcome, ChangeRecord, RecordKey};
use crate::error::ProxyError;
use crate::proxy::state::ProxyState;
use crate::proxy::ProxyEvent;
use crate::table::{BaseTable, ColumnSpec, TableEvent};
use crate::types::Value;

/// A record about to be committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingCommit {
    pub key: RecordKey,
    /// Identity of the record across renumbering
    pub seq: u64,
    pub abs: usize,
    pub proxy_row: Option<usize>,
    pub model_row: Option<usize>,
}

/// Full row for updating an existing base row.
///
/// Columns without a pending value keep their original snapshot value;
/// `None` asks the table for the column default.
pub fn update_values(record: &ChangeRecord, columns: &[ColumnSpec]) -> Vec<Option<Value>> {
    (0..columns.len())
        .map(|col| match record.overrides.get(&col) {
            Some(cv) if cv.is_default() => None,
            Some(cv) => Some(cv.current()),
            None => Some(record.original_value(col).cloned().unwrap_or_default()),
        })
        .collect()
}

/// Full row for appending a new row.
pub fn insert_values(record: &ChangeRecord, columns: &[ColumnSpec]) -> Vec<Option<Value>> {
    columns
        .iter()
        .enumerate()
        .map(|(col, spec)| match record.overrides.get(&col) {
            Some(cv) if cv.is_default() => None,
            Some(cv) => Some(cv.current()),
            None if spec.can_be_default() => None,
            None => Some(Value::Null),
        })
        .collect()
}

/// Applies or discards pending records while keeping window and overlay in step.
pub(crate) struct CommitCoordinator<'s> {
    state: &'s mut ProxyState,
    base: &'s dyn BaseTable,
}

impl<'s> CommitCoordinator<'s> {
    pub fn new(state: &'s mut ProxyState, base: &'s dyn BaseTable) -> Self {
        Self { state, base }
    }

    fn check_unlocked(&self) -> Result<(), ProxyError> {
        match &self.state.commit_lock {
            Some(reason) => Err(ProxyError::CommitsLocked(reason.clone())),
            None => Ok(()),
        }
    }

    fn describe(&self, key: RecordKey) -> PendingCommit {
        let abs = self.state.key_to_absolute(key);
        PendingCommit {
            key,
            seq: self.state.changes.record(key).map_or(0, |r| r.seq),
            abs,
            proxy_row: self.state.translator().absolute_to_proxy(abs),
            model_row: match key {
                RecordKey::Existing(row) => Some(row),
                RecordKey::New(_) => None,
            },
        }
    }

    /// Record shown at `proxy_row`, if it has pending changes.
    pub fn pending_for_row(&mut self, proxy_row: usize) -> Result<Option<PendingCommit>, ProxyError> {
        self.check_unlocked()?;
        self.state.finish_resync();
        let abs = self.state.resolve_row(proxy_row)?;
        Ok(self
            .state
            .changes
            .key_for(abs, self.state.shape.base_count)
            .map(|key| self.describe(key)))
    }

    /// Next record in processing order (most recently created first).
    pub fn next_pending(&mut self) -> Result<Option<PendingCommit>, ProxyError> {
        self.check_unlocked()?;
        self.state.finish_resync();
        Ok(self.state.changes.latest_key().map(|key| self.describe(key)))
    }

    /// Where the record behind `pending` is now; `None` once it is gone.
    pub fn refresh(&mut self, pending: &PendingCommit) -> Result<Option<PendingCommit>, ProxyError> {
        self.check_unlocked()?;
        self.state.finish_resync();
        Ok(self
            .state
            .changes
            .key_of_seq(pending.seq)
            .map(|key| self.describe(key)))
    }

    /// Writes one record to the base table.
    ///
    /// On failure the record is left untouched.
    pub fn commit(&mut self, key: RecordKey) -> Result<(), ProxyError> {
        self.check_unlocked()?;
        self.state.finish_resync();
        let Some(record) = self.state.changes.record(key).cloned() else {
            return Ok(());
        };
        let pending = self.describe(key);
        tracing::debug!("committing {:?}", pending);

        let model_row = match (record.base_row, record.marked_for_delete) {
            (Some(row), true) => {
                self.commit_delete(row, pending.abs)?;
                row
            }
            (Some(row), false) => {
                self.commit_update(row, &record, pending.abs)?;
                row
            }
            (None, _) => self.commit_insert(key, &record, pending.abs)?,
        };

        self.state.emit(ProxyEvent::RowChangesApplied {
            row: pending.proxy_row,
            model_row: Some(model_row),
        });
        Ok(())
    }

    fn commit_delete(&mut self, row: usize, abs: usize) -> Result<(), ProxyError> {
        self.base
            .remove_row(row)
            .map_err(|source| ProxyError::WriteBackFailed { row: abs, source })?;
        let seen = self.state.drain_base_events(self.base);
        if !seen.contains(&TableEvent::RowRemoved(row)) {
            tracing::warn!("base table removed row {} without notification", row);
            self.state
                .handle_base_event(TableEvent::RowRemoved(row), self.base);
        }
        Ok(())
    }

    fn commit_update(
        &mut self,
        row: usize,
        record: &ChangeRecord,
        abs: usize,
    ) -> Result<(), ProxyError> {
        let values = update_values(record, &self.state.shape.columns);
        self.base
            .set_row_values(row, values)
            .map_err(|source| ProxyError::WriteBackFailed { row: abs, source })?;
        let seen = self.state.drain_base_events(self.base);
        if !seen.contains(&TableEvent::RowUpdated(row)) {
            tracing::warn!("base table updated row {} without notification", row);
            self.state
                .handle_base_event(TableEvent::RowUpdated(row), self.base);
        }
        Ok(())
    }

    /// Appends a new row; returns the model row the base table assigned.
    fn commit_insert(
        &mut self,
        key: RecordKey,
        record: &ChangeRecord,
        abs: usize,
    ) -> Result<usize, ProxyError> {
        let RecordKey::New(index) = key else {
            return Err(ProxyError::RowOutOfRange { row: abs });
        };
        let values = insert_values(record, &self.state.shape.columns);

        self.state.deferred_insert = Some(None);
        let result = self.base.append_row(values);
        self.state.drain_base_events(self.base);
        let caught = self.state.deferred_insert.take().flatten();
        result.map_err(|source| ProxyError::WriteBackFailed { row: abs, source })?;

        let Some(model_row) = caught else {
            let reason = format!(
                "base table accepted new row {} but never reported its insertion",
                abs
            );
            tracing::error!("{}", reason);
            self.state.commit_lock = Some(reason.clone());
            return Err(ProxyError::ConsistencyViolation(reason));
        };

        // The insertion notification already renumbered rows at or after
        // `model_row`, so the committed row now sits at `abs + 1`.
        let moved = abs + 1;
        self.state.changes.remove(RecordKey::New(index));
        let was_direct = self.state.window.current().is_direct();
        self.state.window.remap(|r| match r {
            r if r == moved => Some(model_row),
            r if r > moved => Some(r - 1),
            r => Some(r),
        });
        if was_direct && model_row < abs {
            let offset = self.state.null_offset();
            for p in model_row..=abs {
                self.state.emit(ProxyEvent::RowUpdated(p + offset));
            }
        }
        Ok(model_row)
    }

    /// Discards the pending changes of the row shown at `proxy_row`.
    pub fn cancel_row(&mut self, proxy_row: usize, col: Option<usize>) -> Result<(), ProxyError> {
        self.state.finish_resync();
        let abs = self.state.resolve_row(proxy_row)?;
        match self
            .state
            .changes
            .cancel(abs, col, self.state.shape.base_count)
        {
            CancelOutcome::Unchanged => {}
            CancelOutcome::Reverted => self.state.emit(ProxyEvent::RowUpdated(proxy_row)),
            CancelOutcome::DiscardedInsert(_) => {
                self.state.window.remove_abs(abs);
                self.state.emit(ProxyEvent::RowRemoved(proxy_row));
            }
        }
        Ok(())
    }

    /// Discards every pending change and recomputes the window.
    ///
    /// New rows are removed in descending proxy row order. Reverted rows are
    /// announced at their positions after the removals.
    pub fn cancel_all(&mut self) {
        self.state.finish_resync();
        let base_count = self.state.shape.base_count.unwrap_or(0);
        let mut new_rows: Vec<(Option<usize>, usize)> = (0..self.state.changes.count_new())
            .map(|i| {
                let abs = base_count + i;
                (self.state.translator().absolute_to_proxy(abs), abs)
            })
            .collect();
        new_rows.sort_unstable_by(|a, b| b.cmp(a));
        let reverted = self.state.changes.existing_rows();

        self.state.changes.drain();
        let mut removed: Vec<usize> = Vec::with_capacity(new_rows.len());
        for (proxy_row, abs) in new_rows {
            let shifted = abs - removed.iter().filter(|&&r| r < abs).count();
            self.state.window.remove_abs(shifted);
            removed.push(abs);
            if let Some(p) = proxy_row {
                self.state.emit(ProxyEvent::RowRemoved(p));
            }
        }

        let mut updated: Vec<usize> = reverted
            .into_iter()
            .filter_map(|row| self.state.translator().absolute_to_proxy(row))
            .collect();
        updated.sort_unstable();
        for p in updated {
            self.state.emit(ProxyEvent::RowUpdated(p));
        }
        self.state.adjust_window();
    }
}
