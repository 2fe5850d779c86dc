//! The proxy's unfiltered contents as a relation for the query executor.

use super::state::ProxyState;
use crate::error::{FilterError, ProxyError, TableError};
use crate::filter::SourceView;
use crate::table::BaseTable;
use crate::types::Value;

/// Unfiltered rows, pending changes included, numbered by absolute row.
pub(crate) struct ProxySource<'s> {
    state: &'s ProxyState,
    base: &'s dyn BaseTable,
}

impl<'s> ProxySource<'s> {
    pub fn new(state: &'s ProxyState, base: &'s dyn BaseTable) -> Self {
        Self { state, base }
    }
}

impl SourceView for ProxySource<'_> {
    fn name(&self) -> &str {
        crate::filter::SOURCE_NAME
    }

    fn column_names(&self) -> Vec<&str> {
        self.state
            .shape
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect()
    }

    fn row_count(&self) -> Option<usize> {
        self.state.total_rows()
    }

    fn value(&self, col: usize, row: usize) -> Result<Option<Value>, FilterError> {
        if !self
            .state
            .changes
            .contains_row(row, self.state.shape.base_count)
        {
            return Ok(None);
        }
        let ctx = self.state.shape.ctx(self.base);
        match self.state.changes.get_value(row, col, &ctx) {
            Ok(value) => Ok(Some(value)),
            Err(ProxyError::BaseRead {
                source: TableError::RowOutOfRange { .. },
                ..
            }) => Ok(None),
            Err(e) => Err(FilterError::Execution(e.to_string())),
        }
    }
}
