//! Shared fixtures and fault-injecting base tables.

use std::collections::HashSet;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use parking_lot::Mutex;

use data_proxy_core::error::{FilterError, TableError};
use data_proxy_core::filter::{FilterExpr, QueryExecutor, SourceView};
use data_proxy_core::table::{AccessFlags, BaseTable, ColumnSpec, MemoryTable, TableEvent, TableHint};
use data_proxy_core::{DataProxy, ProxyConfig, ProxyEvent, ScanExecutor, Value, ValueType};

pub const NAMES: [&str; 10] = [
    "ann", "bob", "cid", "dan", "eve", "fay", "gus", "hal", "ida", "jon",
];

/// `id, name, age` with `rows` rows; ids start at 1, ages at 20 in steps of 7 mod 50.
pub fn people(rows: usize) -> MemoryTable {
    MemoryTable::new(
        "people",
        vec![
            ColumnSpec::new("id", ValueType::Int).not_null().auto_increment(),
            ColumnSpec::new("name", ValueType::Text),
            ColumnSpec::new("age", ValueType::Int).with_default(Value::Int(18)),
        ],
    )
    .with_rows(
        (0..rows)
            .map(|i| {
                vec![
                    Value::Int(i as i64 + 1),
                    Value::from(NAMES[i % NAMES.len()]),
                    Value::Int(20 + (i as i64 * 7) % 50),
                ]
            })
            .collect(),
    )
    .unwrap()
}

pub fn open(table: &dyn BaseTable, config: ProxyConfig) -> DataProxy<'_> {
    DataProxy::with_config(table, Arc::new(ScanExecutor), config).unwrap()
}

pub fn paged(sample_size: usize) -> ProxyConfig {
    ProxyConfig {
        sample_size,
        ..ProxyConfig::default()
    }
}

pub fn record_events(proxy: &DataProxy<'_>) -> Arc<Mutex<Vec<ProxyEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    proxy.subscribe(move |e| sink.lock().push(*e));
    events
}

pub fn take(events: &Mutex<Vec<ProxyEvent>>) -> Vec<ProxyEvent> {
    std::mem::take(&mut *events.lock())
}

/// Model rows shown by the proxy, in proxy order.
pub fn visible_rows(proxy: &DataProxy<'_>) -> Vec<Option<usize>> {
    let start = usize::from(proxy.null_entry());
    (start..proxy.row_count().unwrap())
        .map(|r| proxy.proxied_model_row(r))
        .collect()
}

/// Returns a fixed row list whatever the filter says.
pub struct FixedExecutor(pub Vec<usize>);

impl QueryExecutor for FixedExecutor {
    fn execute_ordered_filter(
        &self,
        _expr: &FilterExpr,
        _source: &dyn SourceView,
    ) -> Result<Vec<usize>, FilterError> {
        Ok(self.0.clone())
    }
}

/// [`MemoryTable`] wrapper that can fail writes and swallow notifications.
pub struct FaultyTable {
    pub inner: MemoryTable,
    inner_events: Mutex<Receiver<TableEvent>>,
    subscribers: Mutex<Vec<Sender<TableEvent>>>,
    failing_rows: Mutex<HashSet<usize>>,
    silent_inserts: Mutex<bool>,
    silent_updates: Mutex<bool>,
}

impl FaultyTable {
    pub fn new(inner: MemoryTable) -> Self {
        let inner_events = Mutex::new(inner.subscribe());
        Self {
            inner,
            inner_events,
            subscribers: Mutex::new(Vec::new()),
            failing_rows: Mutex::new(HashSet::new()),
            silent_inserts: Mutex::new(false),
            silent_updates: Mutex::new(false),
        }
    }

    /// Updates and removals of `row` fail.
    pub fn fail_row(&self, row: usize) {
        self.failing_rows.lock().insert(row);
    }

    pub fn heal_row(&self, row: usize) {
        self.failing_rows.lock().remove(&row);
    }

    /// Appends succeed without a notification.
    pub fn silence_inserts(&self, silent: bool) {
        *self.silent_inserts.lock() = silent;
    }

    /// Updates succeed without a notification.
    pub fn silence_updates(&self, silent: bool) {
        *self.silent_updates.lock() = silent;
    }

    fn check(&self, row: usize) -> Result<(), TableError> {
        if self.failing_rows.lock().contains(&row) {
            return Err(TableError::Other(format!("row {} is locked", row)));
        }
        Ok(())
    }

    fn forward(&self) {
        let rx = self.inner_events.lock();
        while let Ok(event) = rx.try_recv() {
            let silent = match event {
                TableEvent::RowInserted(_) => *self.silent_inserts.lock(),
                TableEvent::RowUpdated(_) => *self.silent_updates.lock(),
                _ => false,
            };
            if !silent {
                self.subscribers.lock().retain(|tx| tx.send(event).is_ok());
            }
        }
    }
}

impl BaseTable for FaultyTable {
    fn row_count(&self) -> Option<usize> {
        self.inner.row_count()
    }

    fn columns(&self) -> &[ColumnSpec] {
        self.inner.columns()
    }

    fn access_flags(&self) -> AccessFlags {
        self.inner.access_flags()
    }

    fn get_value(&self, col: usize, row: usize) -> Result<Value, TableError> {
        self.inner.get_value(col, row)
    }

    fn set_row_values(&self, row: usize, values: Vec<Option<Value>>) -> Result<(), TableError> {
        self.check(row)?;
        let result = self.inner.set_row_values(row, values);
        self.forward();
        result
    }

    fn append_row(&self, values: Vec<Option<Value>>) -> Result<usize, TableError> {
        let result = self.inner.append_row(values);
        self.forward();
        result
    }

    fn remove_row(&self, row: usize) -> Result<(), TableError> {
        self.check(row)?;
        let result = self.inner.remove_row(row);
        self.forward();
        result
    }

    fn send_hint(&self, hint: TableHint) {
        self.inner.send_hint(hint);
    }

    fn subscribe(&self) -> Receiver<TableEvent> {
        let (tx, rx) = channel();
        self.subscribers.lock().push(tx);
        rx
    }
}
