//! Mutable state behind the proxy lock.

use std::sync::mpsc::Receiver;

use super::events::{Listener, ProxyEvent, Validator};
use crate::address::RowAddressTranslator;
use crate::changes::{ChangeCache, ChangeSet, RecordKey, TableContext};
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::filter::FilterExpr;
use crate::table::{AccessFlags, BaseTable, ColumnSpec, TableEvent};
use crate::window::{recompute, ResyncProgress, RowChange, Window, WindowParams, WindowState};

/// What the proxy knows about the base table.
#[derive(Debug, Clone)]
pub(crate) struct TableShape {
    pub columns: Vec<ColumnSpec>,
    pub access: AccessFlags,
    pub base_count: Option<usize>,
}

impl TableShape {
    fn read(base: &dyn BaseTable) -> Self {
        Self {
            columns: base.columns().to_vec(),
            access: base.access_flags(),
            base_count: base.row_count(),
        }
    }

    pub fn ctx<'a>(&'a self, base: &'a dyn BaseTable) -> TableContext<'a> {
        TableContext {
            base,
            columns: &self.columns,
            access: self.access,
            base_count: self.base_count,
        }
    }
}

pub(crate) struct ProxyState {
    pub shape: TableShape,
    pub changes: ChangeSet,
    pub window: WindowState,
    pub filter: Option<FilterExpr>,
    pub sample_start: usize,
    pub sample_end: Option<usize>,
    pub sample_size: usize,
    pub defer_sync: bool,
    pub resync_step: usize,
    pub add_null_entry: bool,
    pub cache_changes: bool,
    pub cache: ChangeCache,
    /// Set after a consistency violation; refuses commits until reset
    pub commit_lock: Option<String>,
    /// `Some` while an insert is being committed; holds the caught model row
    pub deferred_insert: Option<Option<usize>>,
    pub events: Vec<ProxyEvent>,
    pub listeners: Vec<Listener>,
    pub validators: Vec<Validator>,
    base_events: Receiver<TableEvent>,
}

impl ProxyState {
    pub fn new(base: &dyn BaseTable, config: &ProxyConfig) -> Self {
        let mut state = Self {
            shape: TableShape::read(base),
            changes: ChangeSet::new(),
            window: WindowState::new(Window::Direct),
            filter: None,
            sample_start: config.sample_start,
            sample_end: None,
            sample_size: config.sample_size,
            defer_sync: config.defer_sync,
            resync_step: config.resync_step,
            add_null_entry: config.add_null_entry,
            cache_changes: config.cache_changes,
            cache: ChangeCache::new(),
            commit_lock: None,
            deferred_insert: None,
            events: Vec::new(),
            listeners: Vec::new(),
            validators: Vec::new(),
            base_events: base.subscribe(),
        };
        state.rebuild_window();
        state
    }

    pub fn translator(&self) -> RowAddressTranslator<'_> {
        RowAddressTranslator::new(
            self.shape.base_count,
            &self.changes,
            &self.window,
            self.add_null_entry,
        )
    }

    pub fn total_rows(&self) -> Option<usize> {
        self.shape.base_count.map(|n| n + self.changes.count_new())
    }

    pub fn null_offset(&self) -> usize {
        usize::from(self.add_null_entry)
    }

    pub fn emit(&mut self, event: ProxyEvent) {
        self.events.push(event);
    }

    /// Absolute row shown at `proxy_row`.
    pub fn resolve_row(&self, proxy_row: usize) -> Result<usize, ProxyError> {
        let translator = self.translator();
        if translator.is_synthetic(proxy_row) {
            return Err(ProxyError::SyntheticRow);
        }
        translator
            .proxy_to_absolute(proxy_row)
            .ok_or(ProxyError::RowOutOfRange { row: proxy_row })
    }

    /// Absolute row of a record key.
    pub fn key_to_absolute(&self, key: RecordKey) -> usize {
        match key {
            RecordKey::Existing(row) => row,
            RecordKey::New(index) => self.shape.base_count.unwrap_or(0) + index,
        }
    }

    fn emit_row_changes(&mut self, changes: Vec<RowChange>) {
        let offset = self.null_offset();
        for change in changes {
            self.emit(match change {
                RowChange::Inserted(i) => ProxyEvent::RowInserted(i + offset),
                RowChange::Updated(i) => ProxyEvent::RowUpdated(i + offset),
                RowChange::Removed(i) => ProxyEvent::RowRemoved(i + offset),
            });
        }
    }

    /// Completes any pending resync.
    pub fn finish_resync(&mut self) {
        if !self.window.is_resyncing() {
            return;
        }
        let mut changes = Vec::new();
        let total = self.total_rows();
        self.window.finish(total, &mut changes);
        self.emit_row_changes(changes);
    }

    pub fn step_resync(&mut self, max_items: usize) -> ResyncProgress {
        let mut changes = Vec::new();
        let total = self.total_rows();
        let progress = self.window.step(max_items, total, &mut changes);
        tracing::debug!("resync step: {} changes, {:?}", changes.len(), progress);
        self.emit_row_changes(changes);
        progress
    }

    fn window_params(&self) -> WindowParams {
        WindowParams {
            base_count: self.shape.base_count,
            new_count: self.changes.count_new(),
            sample_start: self.sample_start,
            sample_size: self.sample_size,
        }
    }

    fn sync_filter_bounds(&mut self) {
        self.sample_start = 0;
        self.sample_end = self
            .window
            .len(self.total_rows())
            .and_then(|n| n.checked_sub(1));
    }

    /// Moves towards the window the paging parameters ask for.
    ///
    /// A filtered window is kept as is.
    pub fn adjust_window(&mut self) {
        if self.filter.is_some() {
            self.sync_filter_bounds();
            return;
        }
        let (target, bounds) = recompute(self.window_params(), None);
        self.sample_start = bounds.first;
        self.sample_end = bounds.last;
        if self.window.begin(target, self.total_rows()) {
            self.emit(ProxyEvent::SampleChanged {
                first: bounds.first,
                last: bounds.last,
            });
            if !self.defer_sync {
                self.finish_resync();
            }
        }
    }

    /// Replaces the window without row notifications.
    pub fn rebuild_window(&mut self) {
        let (target, bounds) = recompute(self.window_params(), None);
        self.sample_start = bounds.first;
        self.sample_end = bounds.last;
        self.window.replace(target);
    }

    /// Discards overlay, filter and window and reads the base table again.
    pub fn reinit(&mut self, base: &dyn BaseTable, keep_changes: bool) {
        self.finish_resync();
        if keep_changes {
            let types = self.shape.columns.iter().map(|c| c.value_type).collect();
            self.cache.stash(&mut self.changes, types);
        } else {
            self.changes = ChangeSet::new();
        }
        self.shape = TableShape::read(base);
        self.filter = None;
        self.commit_lock = None;
        self.deferred_insert = None;

        if keep_changes {
            let ctx = self.shape.ctx(base);
            match self.cache.restore(&mut self.changes, &ctx) {
                Ok(n) => tracing::debug!("restored {} cached changes", n),
                Err(e) => tracing::warn!("restoring cached changes failed: {}", e),
            }
        }
        self.rebuild_window();
        self.emit(ProxyEvent::Reset);
    }

    /// Applies every queued base table notification.
    ///
    /// # Returns
    /// The notifications, in arrival order.
    pub fn drain_base_events(&mut self, base: &dyn BaseTable) -> Vec<TableEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = self.base_events.try_recv() {
            self.handle_base_event(event, base);
            seen.push(event);
        }
        seen
    }

    pub fn handle_base_event(&mut self, event: TableEvent, base: &dyn BaseTable) {
        tracing::debug!("base table event {:?}", event);
        self.finish_resync();
        match event {
            TableEvent::RowInserted(row) => {
                let catching = self.deferred_insert == Some(None);
                if catching {
                    self.deferred_insert = Some(Some(row));
                }
                let was_direct = self.window.current().is_direct();
                self.window.shift_up_from(row);
                self.changes.on_base_row_inserted(row);
                self.shape.base_count = self.shape.base_count.map(|n| n + 1);
                if catching {
                    return;
                }
                if was_direct {
                    self.emit(ProxyEvent::RowInserted(row + self.null_offset()));
                }
                self.adjust_window();
            }
            TableEvent::RowUpdated(row) => {
                self.changes.remove(RecordKey::Existing(row));
                if let Some(p) = self.translator().absolute_to_proxy(row) {
                    self.emit(ProxyEvent::RowUpdated(p));
                }
            }
            TableEvent::RowRemoved(row) => {
                let proxy_row = self.translator().absolute_to_proxy(row);
                self.window.remove_abs(row);
                self.changes.on_base_row_removed(row);
                self.shape.base_count = self.shape.base_count.map(|n| n.saturating_sub(1));
                if let Some(p) = proxy_row {
                    self.emit(ProxyEvent::RowRemoved(p));
                }
                self.adjust_window();
            }
            TableEvent::Reset => self.reinit(base, self.cache_changes),
        }
    }
}
