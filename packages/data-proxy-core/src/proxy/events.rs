//! Notifications emitted by the proxy and the hooks that receive them.

use std::sync::Arc;

/// Change notification, in proxy rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyEvent {
    RowInserted(usize),
    RowUpdated(usize),
    RowRemoved(usize),
    /// Page bounds changed; `last` is `None` for an empty page
    SampleChanged { first: usize, last: Option<usize> },
    SampleSizeChanged(usize),
    FilterChanged,
    DeleteMarkChanged { row: usize, marked: bool },
    /// A row's pending changes were written; `row` is `None` when it was not visible
    RowChangesApplied {
        row: Option<usize>,
        model_row: Option<usize>,
    },
    /// Everything may have changed
    Reset,
}

/// Event subscriber.
pub type Listener = Arc<dyn Fn(&ProxyEvent) + Send + Sync>;

/// Commit veto hook, called with the proxy row (if visible) and the model
/// row (if the row exists in the base table).
pub type Validator = Arc<dyn Fn(Option<usize>, Option<usize>) -> Result<(), String> + Send + Sync>;
