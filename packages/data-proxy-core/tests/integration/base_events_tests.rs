//! Changes made to the base table behind the proxy's back.

use ntest::timeout;

use data_proxy_core::table::BaseTable;
use data_proxy_core::{ProxyConfig, ProxyEvent, Value};

use super::helpers::{open, paged, people, record_events, take, visible_rows};

fn row_of(id: i64, name: &str, age: i64) -> Vec<Value> {
    vec![Value::Int(id), Value::from(name), Value::Int(age)]
}

#[timeout(1000)]
#[test]
fn test_external_insert_shifts_pending_rows() {
    let table = people(5);
    let proxy = open(&table, paged(0));
    proxy.set_value(2, 1, "cy".into()).unwrap();
    let events = record_events(&proxy);

    table.insert_row_at(0, row_of(10, "zoe", 33)).unwrap();
    proxy.process_base_events();

    assert_eq!(take(&events), vec![ProxyEvent::RowInserted(0)]);
    assert_eq!(proxy.row_count(), Some(6));
    assert!(proxy.row_has_changed(3));
    assert!(!proxy.row_has_changed(2));
    assert_eq!(proxy.get_value(3, 1).unwrap(), Value::from("cy"));
    assert_eq!(proxy.get_original_value(3, 1).unwrap(), Value::from("cid"));
}

#[timeout(1000)]
#[test]
fn test_external_insert_moves_page() {
    let table = people(5);
    let proxy = open(&table, paged(2));
    let events = record_events(&proxy);

    table.insert_row_at(0, row_of(10, "zoe", 33)).unwrap();

    assert_eq!(proxy.get_value(0, 1).unwrap(), Value::from("zoe"));
    assert_eq!(visible_rows(&proxy), vec![Some(0), Some(1)]);
    assert_eq!(
        take(&events),
        vec![
            ProxyEvent::SampleChanged {
                first: 0,
                last: Some(1)
            },
            ProxyEvent::RowUpdated(0),
            ProxyEvent::RowUpdated(1),
        ]
    );
}

#[timeout(1000)]
#[test]
fn test_external_update_drops_pending_change() {
    let table = people(5);
    let proxy = open(&table, ProxyConfig::default());
    proxy.set_value(1, 1, "bb".into()).unwrap();
    let events = record_events(&proxy);

    table.update_cell(1, 1, "bobby".into()).unwrap();
    proxy.process_base_events();

    assert_eq!(take(&events), vec![ProxyEvent::RowUpdated(1)]);
    assert_eq!(proxy.get_value(1, 1).unwrap(), Value::from("bobby"));
    assert!(!proxy.row_has_changed(1));
}

#[timeout(1000)]
#[test]
fn test_external_remove_renumbers_pending_rows() {
    let table = people(5);
    let proxy = open(&table, ProxyConfig::default());
    proxy.set_value(3, 1, "dd".into()).unwrap();
    proxy.set_value(1, 1, "bb".into()).unwrap();

    table.remove_row(1).unwrap();

    assert_eq!(proxy.row_count(), Some(4));
    assert_eq!(proxy.count_modified(), 1);
    assert_eq!(proxy.get_value(2, 1).unwrap(), Value::from("dd"));
    assert!(proxy.row_has_changed(2));
}

#[timeout(1000)]
#[test]
fn test_base_reset_discards_changes() {
    let table = people(5);
    let proxy = open(&table, ProxyConfig::default());
    proxy.set_value(1, 1, "bb".into()).unwrap();
    proxy.append_row().unwrap();
    let events = record_events(&proxy);

    table.replace_rows(vec![row_of(1, "solo", 40)]).unwrap();
    proxy.process_base_events();

    assert_eq!(take(&events), vec![ProxyEvent::Reset]);
    assert!(!proxy.is_modified());
    assert_eq!(proxy.row_count(), Some(1));
    assert_eq!(proxy.cached_changes(), 0);
}

#[timeout(1000)]
#[test]
fn test_change_cache_survives_reset() {
    let table = people(5);
    let proxy = open(
        &table,
        ProxyConfig {
            cache_changes: true,
            ..ProxyConfig::default()
        },
    );
    proxy.set_value(1, 1, "bobby".into()).unwrap();
    proxy
        .append_values(vec![None, Some("new".into()), None])
        .unwrap();

    let mut rows = table.rows();
    rows.reverse();
    table.replace_rows(rows).unwrap();
    proxy.process_base_events();

    assert_eq!(proxy.cached_changes(), 0);
    assert_eq!(proxy.count_new(), 1);
    assert_eq!(proxy.row_count(), Some(6));
    assert!(proxy.row_has_changed(3));
    assert_eq!(proxy.get_value(3, 1).unwrap(), Value::from("bobby"));
    assert_eq!(proxy.get_value(5, 1).unwrap(), Value::from("new"));
}

#[timeout(1000)]
#[test]
fn test_change_cache_keeps_unmatched_records() {
    let table = people(5);
    let proxy = open(
        &table,
        ProxyConfig {
            cache_changes: true,
            ..ProxyConfig::default()
        },
    );
    proxy.set_value(1, 1, "bobby".into()).unwrap();

    table.replace_rows(vec![row_of(1, "solo", 40)]).unwrap();
    proxy.process_base_events();

    assert_eq!(proxy.cached_changes(), 1);
    assert!(!proxy.is_modified());

    proxy.set_cache_changes(false);
    assert_eq!(proxy.cached_changes(), 0);
}
