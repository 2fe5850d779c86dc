//! Editable, paginated, filterable view over a base table.
//!
//! Every public call takes the proxy's reentrant lock, first applies any
//! queued base table notifications, and delivers its own notifications to
//! subscribers once its internal state is consistent again. Subscribers and
//! validators may therefore call back into the proxy.

mod events;
mod source;
pub(crate) mod state;

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::ReentrantMutex;

pub use events::{Listener, ProxyEvent, Validator};

use self::source::ProxySource;
use self::state::ProxyState;
use crate::changes::DeleteOutcome;
use crate::commit::{CommitCoordinator, PendingCommit};
use crate::config::ProxyConfig;
use crate::error::{FilterError, ProxyError};
use crate::filter::{parse_filter, FilterExpr, ParseMode, QueryExecutor};
use crate::table::{BaseTable, ColumnSpec, TableHint};
use crate::types::{Value, ValueAttributes};
use crate::window::{ResyncProgress, Window};

/// Change-tracking proxy over a borrowed base table.
pub struct DataProxy<'a> {
    base: &'a dyn BaseTable,
    executor: Arc<dyn QueryExecutor>,
    state: ReentrantMutex<RefCell<ProxyState>>,
}

impl<'a> DataProxy<'a> {
    /// Creates a proxy with the default configuration.
    pub fn new(base: &'a dyn BaseTable, executor: Arc<dyn QueryExecutor>) -> Result<Self, ProxyError> {
        Self::with_config(base, executor, ProxyConfig::default())
    }

    /// Creates a proxy.
    ///
    /// # Arguments
    /// * `base` - Table to proxy; must offer random access
    /// * `executor` - Runs filters against the proxy contents
    /// * `config` - Paging and sync settings
    pub fn with_config(
        base: &'a dyn BaseTable,
        executor: Arc<dyn QueryExecutor>,
        config: ProxyConfig,
    ) -> Result<Self, ProxyError> {
        config.validate()?;
        if !base.access_flags().random_access {
            return Err(ProxyError::RandomAccessRequired);
        }
        let state = ProxyState::new(base, &config);
        tracing::debug!(
            "proxy created: {} columns, {:?} rows, sample size {}",
            state.shape.columns.len(),
            state.shape.base_count,
            config.sample_size
        );
        Ok(Self {
            base,
            executor,
            state: ReentrantMutex::new(RefCell::new(state)),
        })
    }

    /// Runs `f` on the state, then delivers queued notifications.
    fn with_state<R>(&self, f: impl FnOnce(&mut ProxyState, &dyn BaseTable) -> R) -> R {
        let guard = self.state.lock();
        let (result, events, listeners) = {
            let mut state = guard.borrow_mut();
            state.drain_base_events(self.base);
            let result = f(&mut state, self.base);
            let events = std::mem::take(&mut state.events);
            let listeners = if events.is_empty() {
                Vec::new()
            } else {
                state.listeners.clone()
            };
            (result, events, listeners)
        };
        for event in &events {
            for listener in &listeners {
                listener(event);
            }
        }
        result
    }

    /// Registers an event subscriber.
    pub fn subscribe(&self, listener: impl Fn(&ProxyEvent) + Send + Sync + 'static) {
        let guard = self.state.lock();
        guard.borrow_mut().listeners.push(Arc::new(listener));
    }

    /// Registers a commit veto hook; hooks run in registration order.
    pub fn add_validator(
        &self,
        hook: impl Fn(Option<usize>, Option<usize>) -> Result<(), String> + Send + Sync + 'static,
    ) {
        let guard = self.state.lock();
        guard.borrow_mut().validators.push(Arc::new(hook));
    }

    /// Applies queued base table notifications.
    pub fn process_base_events(&self) {
        self.with_state(|_, _| ());
    }

    pub fn row_count(&self) -> Option<usize> {
        self.with_state(|st, _| st.translator().row_count())
    }

    pub fn column_count(&self) -> usize {
        self.with_state(|st, _| st.shape.columns.len())
    }

    pub fn columns(&self) -> Vec<ColumnSpec> {
        self.with_state(|st, _| st.shape.columns.clone())
    }

    pub fn get_value(&self, row: usize, col: usize) -> Result<Value, ProxyError> {
        self.with_state(|st, base| read_value(st, base, row, col))
    }

    pub fn get_values(&self, row: usize, cols: &[usize]) -> Result<Vec<Value>, ProxyError> {
        self.with_state(|st, base| {
            cols.iter()
                .map(|&col| read_value(st, base, row, col))
                .collect()
        })
    }

    /// Value of a cell before any pending change.
    pub fn get_original_value(&self, row: usize, col: usize) -> Result<Value, ProxyError> {
        self.with_state(|st, base| {
            let ctx = st.shape.ctx(base);
            ctx.column(col)?;
            if st.translator().is_synthetic(row) {
                return Ok(Value::Null);
            }
            let abs = st.resolve_row(row)?;
            st.changes.get_original_value(abs, col, &ctx)
        })
    }

    pub fn get_attributes(&self, row: usize, col: usize) -> Result<ValueAttributes, ProxyError> {
        self.with_state(|st, base| {
            let ctx = st.shape.ctx(base);
            let spec = ctx.column(col)?;
            if st.translator().is_synthetic(row) {
                return Ok(spec.base_attributes()
                    | ValueAttributes::IS_NULL
                    | ValueAttributes::IS_UNCHANGED
                    | ValueAttributes::READ_ONLY);
            }
            let abs = st.resolve_row(row)?;
            st.changes.get_attributes(abs, col, &ctx)
        })
    }

    /// First proxy row whose `cols` hold `values`.
    pub fn find_row(&self, values: &[Value], cols: &[usize]) -> Result<Option<usize>, ProxyError> {
        if values.len() != cols.len() {
            return Err(ProxyError::ColumnOutOfRange {
                col: values.len(),
                count: cols.len(),
            });
        }
        self.with_state(|st, base| {
            let start = st.null_offset();
            let end = st.translator().row_count().unwrap_or(usize::MAX);
            for row in start..end {
                let mut matched = true;
                for (value, &col) in values.iter().zip(cols) {
                    match read_value(st, base, row, col) {
                        Ok(v) if v.same_as(value) => {}
                        Ok(_) => {
                            matched = false;
                            break;
                        }
                        Err(ProxyError::RowOutOfRange { .. }) | Err(ProxyError::BaseRead { .. })
                            if end == usize::MAX =>
                        {
                            return Ok(None)
                        }
                        Err(e) => return Err(e),
                    }
                }
                if matched {
                    return Ok(Some(row));
                }
            }
            Ok(None)
        })
    }

    /// Base table row shown at `row`, `None` for new rows.
    pub fn proxied_model_row(&self, row: usize) -> Option<usize> {
        self.with_state(|st, _| {
            let abs = st.resolve_row(row).ok()?;
            st.translator().absolute_to_model_row(abs).0
        })
    }

    /// Whether any change is pending.
    pub fn is_modified(&self) -> bool {
        self.with_state(|st, _| !st.changes.is_empty())
    }

    pub fn row_has_changed(&self, row: usize) -> bool {
        self.with_state(|st, _| {
            st.resolve_row(row)
                .is_ok_and(|abs| st.changes.has_pending_changes(abs, st.shape.base_count))
        })
    }

    pub fn row_is_new(&self, row: usize) -> bool {
        self.with_state(|st, _| {
            st.resolve_row(row)
                .is_ok_and(|abs| st.changes.is_new_row(abs, st.shape.base_count))
        })
    }

    pub fn row_is_marked_delete(&self, row: usize) -> bool {
        self.with_state(|st, _| {
            st.resolve_row(row)
                .is_ok_and(|abs| st.changes.is_marked_delete(abs, st.shape.base_count))
        })
    }

    pub fn count_new(&self) -> usize {
        self.with_state(|st, _| st.changes.count_new())
    }

    pub fn count_modified(&self) -> usize {
        self.with_state(|st, _| st.changes.count_modified())
    }

    /// Writes a cell; a no-op when the value is already there.
    pub fn set_value(&self, row: usize, col: usize, value: Value) -> Result<(), ProxyError> {
        self.with_state(|st, base| write_value(st, base, row, col, value))
    }

    /// Writes several cells of one row; `None` entries are left alone.
    pub fn set_values(&self, row: usize, values: Vec<Option<Value>>) -> Result<(), ProxyError> {
        self.with_state(|st, base| {
            for (col, value) in values.into_iter().enumerate() {
                if let Some(value) = value {
                    write_value(st, base, row, col, value)?;
                }
            }
            Ok(())
        })
    }

    /// Changes a cell through its attributes.
    ///
    /// `IS_NULL` writes NULL, `IS_DEFAULT` asks for the column default on
    /// commit, and `IS_UNCHANGED` drops the cell's pending value.
    pub fn alter_attributes(
        &self,
        row: usize,
        col: usize,
        attrs: ValueAttributes,
    ) -> Result<(), ProxyError> {
        self.with_state(|st, base| {
            if attrs.contains(ValueAttributes::IS_NULL) {
                write_value(st, base, row, col, Value::Null)?;
            }
            if attrs.contains(ValueAttributes::IS_DEFAULT) {
                st.finish_resync();
                let abs = st.resolve_row(row)?;
                let ctx = st.shape.ctx(base);
                if st.changes.set_default(abs, col, &ctx)? {
                    st.emit(ProxyEvent::RowUpdated(row));
                }
            }
            if attrs.contains(ValueAttributes::IS_UNCHANGED) {
                st.shape.columns.get(col).ok_or(ProxyError::ColumnOutOfRange {
                    col,
                    count: st.shape.columns.len(),
                })?;
                CommitCoordinator::new(st, base).cancel_row(row, Some(col))?;
            }
            Ok(())
        })
    }

    /// Adds an empty row; returns its proxy row.
    pub fn append_row(&self) -> Result<usize, ProxyError> {
        self.with_state(append_new_row)
    }

    /// Adds a row and sets its values; returns its proxy row.
    ///
    /// If a value is rejected the row is dropped again.
    pub fn append_values(&self, values: Vec<Option<Value>>) -> Result<usize, ProxyError> {
        self.with_state(|st, base| {
            let row = append_new_row(st, base)?;
            for (col, value) in values.into_iter().enumerate() {
                if let Some(value) = value {
                    if let Err(e) = write_value(st, base, row, col, value) {
                        CommitCoordinator::new(st, base).cancel_row(row, None)?;
                        return Err(e);
                    }
                }
            }
            Ok(row)
        })
    }

    /// Flags a row for deletion; an uncommitted new row is dropped instead.
    pub fn mark_delete(&self, row: usize) -> Result<(), ProxyError> {
        self.with_state(|st, base| {
            st.finish_resync();
            let abs = st.resolve_row(row)?;
            let ctx = st.shape.ctx(base);
            match st.changes.mark_delete(abs, &ctx)? {
                DeleteOutcome::Marked => {
                    st.emit(ProxyEvent::RowUpdated(row));
                    st.emit(ProxyEvent::DeleteMarkChanged { row, marked: true });
                }
                DeleteOutcome::AlreadyMarked => {}
                DeleteOutcome::DiscardedInsert(_) => {
                    st.window.remove_abs(abs);
                    st.emit(ProxyEvent::RowRemoved(row));
                }
            }
            Ok(())
        })
    }

    pub fn unmark_delete(&self, row: usize) -> Result<(), ProxyError> {
        self.with_state(|st, _| {
            st.finish_resync();
            let abs = st.resolve_row(row)?;
            if st.changes.unmark_delete(abs, st.shape.base_count) {
                st.emit(ProxyEvent::RowUpdated(row));
                st.emit(ProxyEvent::DeleteMarkChanged { row, marked: false });
            }
            Ok(())
        })
    }

    /// Drops the pending value of one column, or all of the row's changes.
    pub fn cancel(&self, row: usize, col: Option<usize>) -> Result<(), ProxyError> {
        self.with_state(|st, base| CommitCoordinator::new(st, base).cancel_row(row, col))
    }

    pub fn cancel_row(&self, row: usize) -> Result<(), ProxyError> {
        self.cancel(row, None)
    }

    /// Drops every pending change.
    pub fn cancel_all(&self) {
        self.with_state(|st, base| CommitCoordinator::new(st, base).cancel_all())
    }

    fn validate(&self, pending: &PendingCommit) -> Result<(), ProxyError> {
        let validators = {
            let guard = self.state.lock();
            let validators = guard.borrow().validators.clone();
            validators
        };
        for hook in validators {
            hook(pending.proxy_row, pending.model_row).map_err(|reason| {
                ProxyError::ValidationRejected {
                    row: pending.abs,
                    reason,
                }
            })?;
        }
        Ok(())
    }

    /// Runs the validators on `pending` and commits it.
    ///
    /// Validators may change the proxy. A record that moved meanwhile is
    /// validated again at its new place; one that disappeared is skipped.
    fn validate_and_commit(&self, mut pending: PendingCommit) -> Result<(), ProxyError> {
        loop {
            self.validate(&pending)?;
            let moved = self.with_state(|st, base| -> Result<Option<PendingCommit>, ProxyError> {
                let mut coordinator = CommitCoordinator::new(st, base);
                match coordinator.refresh(&pending)? {
                    Some(current) if current == pending => {
                        coordinator.commit(current.key)?;
                        Ok(None)
                    }
                    Some(current) => Ok(Some(current)),
                    None => Ok(None),
                }
            })?;
            match moved {
                Some(current) => {
                    tracing::debug!("{:?} moved during validation, now {:?}", pending, current);
                    pending = current;
                }
                None => return Ok(()),
            }
        }
    }

    /// Writes the pending changes of one row to the base table.
    pub fn apply_row(&self, row: usize) -> Result<(), ProxyError> {
        let _guard = self.state.lock();
        let Some(pending) =
            self.with_state(|st, base| CommitCoordinator::new(st, base).pending_for_row(row))?
        else {
            return Ok(());
        };
        self.validate_and_commit(pending)?;
        self.with_state(|st, _| st.adjust_window());
        Ok(())
    }

    /// Writes every pending change, newest first, stopping at the first failure.
    ///
    /// Rows committed before the failure stay committed; the failing row and
    /// all rows after it stay pending.
    pub fn apply_all(&self) -> Result<(), ProxyError> {
        let _guard = self.state.lock();
        self.with_state(|st, base| {
            CommitCoordinator::new(st, base).next_pending().map(|_| ())?;
            base.send_hint(TableHint::StartBatch);
            Ok::<(), ProxyError>(())
        })?;

        let result = loop {
            let next = self.with_state(|st, base| CommitCoordinator::new(st, base).next_pending());
            let pending = match next {
                Ok(Some(pending)) => pending,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };
            if let Err(e) = self.validate_and_commit(pending) {
                break Err(e);
            }
        };

        self.with_state(|st, base| {
            base.send_hint(TableHint::EndBatch);
            st.adjust_window();
        });
        if let Err(e) = &result {
            tracing::debug!("apply_all stopped: {}", e);
        }
        result
    }

    pub fn sample_size(&self) -> usize {
        self.with_state(|st, _| st.sample_size)
    }

    pub fn sample_start(&self) -> usize {
        self.with_state(|st, _| st.sample_start)
    }

    /// Last base row of the page, `None` when the page is empty or unbounded.
    pub fn sample_end(&self) -> Option<usize> {
        self.with_state(|st, _| st.sample_end)
    }

    /// Sets the page size (0 = unpaginated) and moves to the new window.
    ///
    /// A resync still in progress is abandoned in favour of the new target.
    pub fn set_sample_size(&self, size: usize) {
        self.with_state(|st, _| {
            if st.sample_size == size {
                return;
            }
            st.sample_size = size;
            st.emit(ProxyEvent::SampleSizeChanged(size));
            st.adjust_window();
        })
    }

    /// Sets the first base row of the page and moves to the new window.
    pub fn set_sample_start(&self, start: usize) {
        self.with_state(|st, _| {
            if st.sample_start == start {
                return;
            }
            st.sample_start = start;
            st.adjust_window();
        })
    }

    /// When set, window changes wait for [`DataProxy::step_resync`] calls.
    pub fn set_defer_sync(&self, defer: bool) {
        self.with_state(|st, _| {
            st.defer_sync = defer;
            if !defer {
                st.finish_resync();
            }
        })
    }

    pub fn resync_pending(&self) -> bool {
        self.with_state(|st, _| st.window.is_resyncing())
    }

    /// Advances a pending resync by at most `max_items` rows.
    pub fn step_resync(&self, max_items: usize) -> ResyncProgress {
        self.with_state(|st, _| st.step_resync(max_items))
    }

    /// One scheduler tick worth of resync work.
    pub fn tick(&self) -> ResyncProgress {
        self.with_state(|st, _| {
            let step = st.resync_step;
            st.step_resync(step)
        })
    }

    /// Completes any pending resync.
    pub fn ensure_resync_complete(&self) {
        self.with_state(|st, _| st.finish_resync())
    }

    /// Shows or hides the synthetic leading blank row.
    pub fn set_null_entry(&self, enabled: bool) {
        self.with_state(|st, _| {
            if st.add_null_entry == enabled {
                return;
            }
            st.finish_resync();
            st.add_null_entry = enabled;
            st.emit(if enabled {
                ProxyEvent::RowInserted(0)
            } else {
                ProxyEvent::RowRemoved(0)
            });
        })
    }

    pub fn null_entry(&self) -> bool {
        self.with_state(|st, _| st.add_null_entry)
    }

    /// Keeps pending changes across base table resets when enabled.
    pub fn set_cache_changes(&self, enabled: bool) {
        self.with_state(|st, _| {
            st.cache_changes = enabled;
            if !enabled {
                st.cache.clear();
            }
        })
    }

    /// Number of pending records waiting in the change cache.
    pub fn cached_changes(&self) -> usize {
        self.with_state(|st, _| st.cache.len())
    }

    /// Discards all pending changes, the filter, and any commit lock.
    pub fn reset(&self) {
        self.with_state(|st, base| st.reinit(base, false))
    }

    /// Replaces the filter, or clears it with `None`.
    ///
    /// On failure the previous filter and window stay in place.
    pub fn apply_filter(&self, expr: Option<FilterExpr>) -> Result<(), FilterError> {
        self.with_state(|st, base| {
            st.finish_resync();
            let Some(expr) = expr else {
                if st.filter.take().is_some() {
                    st.rebuild_window();
                    st.emit(ProxyEvent::FilterChanged);
                    st.emit(ProxyEvent::Reset);
                }
                return Ok(());
            };

            let rows = {
                let source = ProxySource::new(st, base);
                self.executor.execute_ordered_filter(&expr, &source)?
            };
            if let Some(total) = st.total_rows() {
                if let Some(bad) = rows.iter().find(|&&r| r >= total) {
                    return Err(FilterError::Execution(format!(
                        "executor returned row {} of {}",
                        bad, total
                    )));
                }
            }
            tracing::debug!("filter '{}' selects {} rows", expr, rows.len());
            st.filter = Some(expr);
            st.window.replace(Window::Mapped(rows));
            st.adjust_window();
            st.emit(ProxyEvent::FilterChanged);
            st.emit(ProxyEvent::Reset);
            Ok(())
        })
    }

    /// Parses and applies filter text; `None` or blank text clears the filter.
    pub fn set_filter_text(&self, text: Option<&str>) -> Result<(), FilterError> {
        self.set_filter_text_with_mode(text, ParseMode::Full)
    }

    /// Like [`DataProxy::set_filter_text`]; [`ParseMode::Strict`] accepts only
    /// equality, `AND` and boolean literals.
    pub fn set_filter_text_with_mode(
        &self,
        text: Option<&str>,
        mode: ParseMode,
    ) -> Result<(), FilterError> {
        match text.map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => self.apply_filter(Some(parse_filter(text, mode)?)),
            None => self.apply_filter(None),
        }
    }

    /// Orders by `col`, flipping the direction if the filter already orders by it alone.
    pub fn set_order_column(&self, col: usize) -> Result<(), FilterError> {
        let _guard = self.state.lock();
        let expr = self.with_state(|st, _| {
            let names: Vec<&str> = st.shape.columns.iter().map(|c| c.name.as_str()).collect();
            if col >= names.len() {
                return Err(FilterError::UnknownColumn(format!("_{}", col + 1)));
            }
            Ok(match &st.filter {
                Some(current) => {
                    let mut expr = current.clone();
                    expr.toggle_order(col, &names);
                    expr
                }
                None => FilterExpr::order_by_column(col),
            })
        })?;
        self.apply_filter(Some(expr))
    }

    /// Active filter.
    pub fn filter_expr(&self) -> Option<FilterExpr> {
        self.with_state(|st, _| st.filter.clone())
    }

    /// Rows selected by the filter, `None` without a filter.
    pub fn filtered_row_count(&self) -> Option<usize> {
        self.with_state(|st, _| {
            let total = st.total_rows();
            st.filter.as_ref().and(st.window.len(total))
        })
    }
}

fn read_value(
    st: &ProxyState,
    base: &dyn BaseTable,
    row: usize,
    col: usize,
) -> Result<Value, ProxyError> {
    let ctx = st.shape.ctx(base);
    ctx.column(col)?;
    if st.translator().is_synthetic(row) {
        return Ok(Value::Null);
    }
    let abs = st.resolve_row(row)?;
    st.changes.get_value(abs, col, &ctx).map_err(|e| match e {
        ProxyError::BaseRead {
            source: crate::error::TableError::RowOutOfRange { .. },
            ..
        } => ProxyError::RowOutOfRange { row },
        other => other,
    })
}

fn write_value(
    st: &mut ProxyState,
    base: &dyn BaseTable,
    row: usize,
    col: usize,
    value: Value,
) -> Result<(), ProxyError> {
    st.finish_resync();
    let abs = st.resolve_row(row)?;
    let ctx = st.shape.ctx(base);
    if st.changes.set_value(abs, col, value, &ctx)? {
        st.emit(ProxyEvent::RowUpdated(row));
    }
    Ok(())
}

fn append_new_row(st: &mut ProxyState, base: &dyn BaseTable) -> Result<usize, ProxyError> {
    st.finish_resync();
    let ctx = st.shape.ctx(base);
    let abs = st.changes.append_new_row(&ctx)?;
    let index = st.window.push(abs).unwrap_or(abs);
    let row = index + st.null_offset();
    st.emit(ProxyEvent::RowInserted(row));
    Ok(row)
}
