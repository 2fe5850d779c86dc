//! Pending changes kept across base table resets.

use super::change_set::{ChangeSet, TableContext};
use super::record::ChangeRecord;
use crate::error::ProxyError;
use crate::types::ValueType;

/// Records waiting for the base table to come back in a compatible shape.
#[derive(Debug, Default)]
pub struct ChangeCache {
    /// Column types at the time the records were stashed
    column_types: Vec<ValueType>,
    modified: Vec<ChangeRecord>,
    inserted: Vec<ChangeRecord>,
}

impl ChangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.modified.len() + self.inserted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.modified.clear();
        self.inserted.clear();
    }

    /// Moves every record of `changes` into the cache.
    pub fn stash(&mut self, changes: &mut ChangeSet, column_types: Vec<ValueType>) {
        let (modified, inserted) = changes.drain();
        if !modified.is_empty() || !inserted.is_empty() {
            self.column_types = column_types;
        }
        self.modified.extend(modified);
        self.inserted.extend(inserted);
    }

    /// Moves matching records back into `changes`; returns how many were restored.
    ///
    /// New rows come back when the column layout is unchanged. Records of
    /// existing rows are attached to the first free base row whose values
    /// equal their original snapshot.
    pub fn restore(
        &mut self,
        changes: &mut ChangeSet,
        ctx: &TableContext<'_>,
    ) -> Result<usize, ProxyError> {
        if self.is_empty() {
            return Ok(0);
        }
        let types: Vec<ValueType> = ctx.columns.iter().map(|c| c.value_type).collect();
        if types != self.column_types {
            tracing::debug!("column layout changed; {} cached records kept", self.len());
            return Ok(0);
        }

        let mut restored = 0;
        if ctx.access.insert && ctx.base_count.is_some() {
            for record in self.inserted.drain(..) {
                changes.restore(record);
                restored += 1;
            }
        }

        let Some(base_count) = ctx.base_count else {
            return Ok(restored);
        };
        let mut pending = Vec::new();
        let mut records = std::mem::take(&mut self.modified).into_iter();
        while let Some(mut record) = records.next() {
            match find_base_row(&record, changes, ctx, base_count) {
                Ok(Some(row)) => {
                    record.base_row = Some(row);
                    changes.restore(record);
                    restored += 1;
                }
                Ok(None) => pending.push(record),
                Err(e) => {
                    pending.push(record);
                    pending.extend(records);
                    self.modified = pending;
                    return Err(e);
                }
            }
        }
        self.modified = pending;
        Ok(restored)
    }
}

fn find_base_row(
    record: &ChangeRecord,
    changes: &ChangeSet,
    ctx: &TableContext<'_>,
    base_count: usize,
) -> Result<Option<usize>, ProxyError> {
    let Some(original) = &record.original else {
        return Ok(None);
    };
    for row in 0..base_count {
        if changes.has_pending_changes(row, ctx.base_count) {
            continue;
        }
        let current = ctx.snapshot(row)?;
        if current.len() == original.len()
            && current.iter().zip(original).all(|(a, b)| a.same_as(b))
        {
            return Ok(Some(row));
        }
    }
    Ok(None)
}
