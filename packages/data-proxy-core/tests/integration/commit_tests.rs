//! Commits, validation hooks and base table contract slips.

use std::sync::Arc;

use ntest::timeout;
use parking_lot::Mutex;

use data_proxy_core::error::ProxyError;
use data_proxy_core::table::{BaseTable, TableHint};
use data_proxy_core::{ProxyConfig, ProxyEvent, Value};

use super::helpers::{open, paged, people, record_events, take, visible_rows, FaultyTable};

#[timeout(1000)]
#[test]
fn test_commit_delete_removes_row() {
    let table = people(5);
    let proxy = open(&table, ProxyConfig::default());
    proxy.mark_delete(1).unwrap();
    let events = record_events(&proxy);

    proxy.apply_row(1).unwrap();

    assert_eq!(
        take(&events),
        vec![
            ProxyEvent::RowRemoved(1),
            ProxyEvent::RowChangesApplied {
                row: Some(1),
                model_row: Some(1)
            },
        ]
    );
    assert_eq!(table.row_count(), Some(4));
    assert_eq!(visible_rows(&proxy), vec![Some(0), Some(1), Some(2), Some(3)]);
    assert_eq!(proxy.get_value(1, 1).unwrap(), Value::from("cid"));
    assert!(!proxy.is_modified());
}

#[timeout(1000)]
#[test]
fn test_committed_row_leaves_page() {
    let table = people(5);
    let proxy = open(&table, paged(2));

    let row = proxy
        .append_values(vec![None, Some("new".into()), None])
        .unwrap();
    assert_eq!(row, 2);
    assert_eq!(visible_rows(&proxy), vec![Some(0), Some(1), None]);
    let events = record_events(&proxy);

    proxy.apply_row(2).unwrap();

    assert_eq!(
        take(&events),
        vec![
            ProxyEvent::RowChangesApplied {
                row: Some(2),
                model_row: Some(5)
            },
            ProxyEvent::SampleChanged {
                first: 0,
                last: Some(1)
            },
            ProxyEvent::RowRemoved(2),
        ]
    );
    assert_eq!(visible_rows(&proxy), vec![Some(0), Some(1)]);
    assert_eq!(table.get_value(1, 5).unwrap(), Value::from("new"));
}

#[timeout(1000)]
#[test]
fn test_apply_all_goes_newest_first() {
    let table = people(5);
    let proxy = open(&table, ProxyConfig::default());
    let calls = Arc::new(Mutex::new(Vec::new()));
    let seen = calls.clone();
    proxy.add_validator(move |row, model_row| {
        seen.lock().push((row, model_row));
        Ok(())
    });

    proxy.set_value(3, 1, "d".into()).unwrap();
    proxy.set_value(1, 1, "b".into()).unwrap();
    proxy.append_row().unwrap();
    proxy.apply_all().unwrap();

    assert_eq!(
        *calls.lock(),
        vec![(Some(5), None), (Some(1), Some(1)), (Some(3), Some(3))]
    );
    assert_eq!(table.hints(), vec![TableHint::StartBatch, TableHint::EndBatch]);
    assert_eq!(table.row_count(), Some(6));
    assert!(!proxy.is_modified());
}

#[timeout(1000)]
#[test]
fn test_validator_moving_record_commits_right_row() {
    let table = Arc::new(people(5));
    let proxy = open(&*table, ProxyConfig::default());
    let calls = Arc::new(Mutex::new(Vec::new()));
    let seen = calls.clone();
    let hook_table = table.clone();
    proxy.add_validator(move |row, model_row| {
        let mut calls = seen.lock();
        if calls.is_empty() {
            hook_table.remove_row(0).map_err(|e| e.to_string())?;
        }
        calls.push((row, model_row));
        Ok(())
    });

    proxy.set_value(3, 1, "dee".into()).unwrap();
    proxy.apply_row(3).unwrap();

    assert_eq!(
        *calls.lock(),
        vec![(Some(3), Some(3)), (Some(2), Some(2))]
    );
    assert_eq!(table.row_count(), Some(4));
    assert_eq!(table.get_value(1, 2).unwrap(), Value::from("dee"));
    assert_eq!(table.get_value(1, 1).unwrap(), Value::from("cid"));
    assert!(!proxy.is_modified());
}

#[timeout(1000)]
#[test]
fn test_rejected_row_stops_batch() {
    let table = people(5);
    let proxy = open(&table, ProxyConfig::default());
    proxy.add_validator(|_, model_row| match model_row {
        Some(1) => Err("row 1 is frozen".to_string()),
        _ => Ok(()),
    });

    proxy.set_value(1, 1, "b".into()).unwrap();
    proxy.set_value(3, 1, "d".into()).unwrap();
    let err = proxy.apply_all().unwrap_err();

    assert!(matches!(err, ProxyError::ValidationRejected { row: 1, .. }));
    assert_eq!(table.get_value(1, 3).unwrap(), Value::from("d"));
    assert_eq!(table.get_value(1, 1).unwrap(), Value::from("bob"));
    assert!(proxy.row_has_changed(1));
    assert_eq!(proxy.count_modified(), 1);
}

#[timeout(1000)]
#[test]
fn test_write_failure_keeps_record() {
    let table = FaultyTable::new(people(5));
    table.fail_row(2);
    let proxy = open(&table, ProxyConfig::default());

    proxy.set_value(2, 1, "cy".into()).unwrap();
    let err = proxy.apply_row(2).unwrap_err();
    assert!(matches!(err, ProxyError::WriteBackFailed { row: 2, .. }));
    assert_eq!(proxy.get_value(2, 1).unwrap(), Value::from("cy"));

    proxy.mark_delete(2).unwrap();
    assert!(proxy.apply_row(2).is_err());
    assert!(proxy.row_is_marked_delete(2));
    assert_eq!(table.row_count(), Some(5));
}

#[timeout(1000)]
#[test]
fn test_silent_insert_locks_commits_until_reset() {
    let table = FaultyTable::new(people(5));
    table.silence_inserts(true);
    let proxy = open(&table, ProxyConfig::default());

    let row = proxy
        .append_values(vec![None, Some("ghost".into()), None])
        .unwrap();
    proxy.set_value(0, 1, "a2".into()).unwrap();

    let err = proxy.apply_row(row).unwrap_err();
    assert!(matches!(err, ProxyError::ConsistencyViolation(_)));
    assert!(matches!(
        proxy.apply_row(0),
        Err(ProxyError::CommitsLocked(_))
    ));
    assert!(matches!(proxy.apply_all(), Err(ProxyError::CommitsLocked(_))));

    let events = record_events(&proxy);
    proxy.reset();
    assert_eq!(take(&events), vec![ProxyEvent::Reset]);
    assert!(!proxy.is_modified());
    assert_eq!(proxy.row_count(), Some(6));

    proxy.set_value(0, 1, "a3".into()).unwrap();
    proxy.apply_row(0).unwrap();
    assert_eq!(table.get_value(1, 0).unwrap(), Value::from("a3"));
}

#[timeout(1000)]
#[test]
fn test_silent_update_is_tolerated() {
    let table = FaultyTable::new(people(5));
    table.silence_updates(true);
    let proxy = open(&table, ProxyConfig::default());
    proxy.set_value(2, 1, "cy".into()).unwrap();
    let events = record_events(&proxy);

    proxy.apply_row(2).unwrap();

    assert_eq!(
        take(&events),
        vec![
            ProxyEvent::RowUpdated(2),
            ProxyEvent::RowChangesApplied {
                row: Some(2),
                model_row: Some(2)
            },
        ]
    );
    assert!(!proxy.is_modified());
    assert_eq!(proxy.get_value(2, 1).unwrap(), Value::from("cy"));
}
