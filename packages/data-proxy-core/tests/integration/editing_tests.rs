//! Pending edits: values, delete marks, appends and cancellation.

use ntest::timeout;

use data_proxy_core::error::ProxyError;
use data_proxy_core::table::{AccessFlags, ColumnSpec, MemoryTable};
use data_proxy_core::{ProxyConfig, ProxyEvent, Value, ValueAttributes, ValueType};

use super::helpers::{open, people, record_events, take};

#[timeout(1000)]
#[test]
fn test_cancel_restores_base_value() {
    let table = people(5);
    let proxy = open(&table, ProxyConfig::default());

    proxy.set_value(1, 2, Value::Int(99)).unwrap();
    assert_eq!(proxy.get_value(1, 2).unwrap(), Value::Int(99));

    proxy.cancel(1, Some(2)).unwrap();
    assert_eq!(proxy.get_value(1, 2).unwrap(), Value::Int(27));
    assert!(!proxy.is_modified());
}

#[timeout(1000)]
#[test]
fn test_apply_row_writes_through() {
    let table = people(5);
    let proxy = open(&table, ProxyConfig::default());
    let events = record_events(&proxy);

    proxy.set_value(1, 2, Value::Int(99)).unwrap();
    proxy.apply_row(1).unwrap();

    assert_eq!(
        take(&events),
        vec![
            ProxyEvent::RowUpdated(1),
            ProxyEvent::RowUpdated(1),
            ProxyEvent::RowChangesApplied {
                row: Some(1),
                model_row: Some(1)
            },
        ]
    );
    assert!(!proxy.is_modified());
    assert_eq!(
        table.row(1).unwrap(),
        vec![Value::Int(2), Value::from("bob"), Value::Int(99)]
    );
    assert_eq!(proxy.get_value(1, 2).unwrap(), Value::Int(99));
}

#[timeout(1000)]
#[test]
fn test_writing_original_value_back_drops_record() {
    let table = people(5);
    let proxy = open(&table, ProxyConfig::default());

    proxy.set_value(0, 1, "zed".into()).unwrap();
    proxy.set_value(0, 1, "ann".into()).unwrap();

    assert!(!proxy.row_has_changed(0));
    assert_eq!(proxy.count_modified(), 0);
}

#[timeout(1000)]
#[test]
fn test_mark_then_unmark_leaves_no_change() {
    let table = people(5);
    let proxy = open(&table, ProxyConfig::default());
    let events = record_events(&proxy);

    proxy.mark_delete(1).unwrap();
    assert!(proxy.row_is_marked_delete(1));
    proxy.mark_delete(1).unwrap();
    proxy.unmark_delete(1).unwrap();
    proxy.unmark_delete(1).unwrap();

    assert!(!proxy.row_is_marked_delete(1));
    assert!(!proxy.is_modified());
    assert_eq!(
        take(&events),
        vec![
            ProxyEvent::RowUpdated(1),
            ProxyEvent::DeleteMarkChanged {
                row: 1,
                marked: true
            },
            ProxyEvent::RowUpdated(1),
            ProxyEvent::DeleteMarkChanged {
                row: 1,
                marked: false
            },
        ]
    );
}

#[timeout(1000)]
#[test]
fn test_unmark_keeps_other_edits() {
    let table = people(5);
    let proxy = open(&table, ProxyConfig::default());

    proxy.set_value(2, 1, "cy".into()).unwrap();
    proxy.mark_delete(2).unwrap();
    proxy.unmark_delete(2).unwrap();

    assert!(proxy.row_has_changed(2));
    assert_eq!(proxy.get_value(2, 1).unwrap(), Value::from("cy"));
}

#[timeout(1000)]
#[test]
fn test_deleting_new_row_discards_it() {
    let table = people(5);
    let proxy = open(&table, ProxyConfig::default());
    let events = record_events(&proxy);

    let row = proxy.append_row().unwrap();
    proxy.mark_delete(row).unwrap();

    assert_eq!(proxy.count_new(), 0);
    assert_eq!(proxy.row_count(), Some(5));
    assert_eq!(
        take(&events),
        vec![ProxyEvent::RowInserted(5), ProxyEvent::RowRemoved(5)]
    );
}

#[timeout(1000)]
#[test]
fn test_cancel_all_round_trip() {
    let table = people(6);
    let proxy = open(&table, ProxyConfig::default());
    let before = table.rows();

    proxy.set_value(0, 1, "zz".into()).unwrap();
    proxy.set_value(2, 2, Value::Int(99)).unwrap();
    proxy.mark_delete(4).unwrap();
    assert_eq!(
        proxy
            .append_values(vec![None, Some("new".into()), None])
            .unwrap(),
        6
    );
    assert_eq!(proxy.append_row().unwrap(), 7);
    let events = record_events(&proxy);

    proxy.cancel_all();

    assert_eq!(
        take(&events),
        vec![
            ProxyEvent::RowRemoved(7),
            ProxyEvent::RowRemoved(6),
            ProxyEvent::RowUpdated(0),
            ProxyEvent::RowUpdated(2),
            ProxyEvent::RowUpdated(4),
        ]
    );
    assert_eq!(proxy.row_count(), Some(6));
    assert!(!proxy.is_modified());
    for (row, values) in before.iter().enumerate() {
        assert_eq!(&proxy.get_values(row, &[0, 1, 2]).unwrap(), values);
    }
}

#[timeout(1000)]
#[test]
fn test_cancel_all_in_sorted_filter_replays() {
    let table = people(3);
    let proxy = open(&table, ProxyConfig::default());
    proxy
        .append_values(vec![None, Some("aaa".into()), None])
        .unwrap();
    proxy
        .append_values(vec![None, Some("zzz".into()), None])
        .unwrap();
    proxy.set_filter_text(Some("ORDER BY name DESC")).unwrap();

    let names = |proxy: &data_proxy_core::DataProxy<'_>| -> Vec<Value> {
        (0..proxy.row_count().unwrap())
            .map(|r| proxy.get_value(r, 1).unwrap())
            .collect()
    };
    let mut replay = names(&proxy);
    assert_eq!(
        replay,
        ["zzz", "cid", "bob", "ann", "aaa"].map(Value::from).to_vec()
    );
    proxy.set_value(2, 2, Value::Int(99)).unwrap();
    let events = record_events(&proxy);

    proxy.cancel_all();

    let events = take(&events);
    assert_eq!(
        events,
        vec![
            ProxyEvent::RowRemoved(4),
            ProxyEvent::RowRemoved(0),
            ProxyEvent::RowUpdated(1),
        ]
    );
    let after = names(&proxy);
    for event in events {
        match event {
            ProxyEvent::RowRemoved(row) => {
                replay.remove(row);
            }
            ProxyEvent::RowUpdated(row) => replay[row] = after[row].clone(),
            _ => {}
        }
    }
    assert_eq!(replay, after);
    assert_eq!(after, ["cid", "bob", "ann"].map(Value::from).to_vec());
    assert_eq!(proxy.get_value(1, 2).unwrap(), Value::Int(27));
}

#[timeout(1000)]
#[test]
fn test_bulk_reads_and_writes() {
    let table = people(3);
    let proxy = open(&table, ProxyConfig::default());

    proxy
        .set_values(1, vec![None, Some("bo".into()), Some(Value::Int(50))])
        .unwrap();

    assert_eq!(
        proxy.get_values(1, &[0, 1, 2]).unwrap(),
        vec![Value::Int(2), Value::from("bo"), Value::Int(50)]
    );
    assert_eq!(proxy.get_original_value(1, 1).unwrap(), Value::from("bob"));
}

#[timeout(1000)]
#[test]
fn test_cell_attributes() {
    let table = people(3);
    let proxy = open(&table, ProxyConfig::default());

    let unchanged = proxy.get_attributes(0, 1).unwrap();
    assert!(unchanged.contains(ValueAttributes::IS_UNCHANGED | ValueAttributes::HAS_VALUE_ORIG));
    assert!(!unchanged.contains(ValueAttributes::IS_NULL));

    proxy.set_value(0, 1, Value::Null).unwrap();
    let nulled = proxy.get_attributes(0, 1).unwrap();
    assert!(nulled.contains(ValueAttributes::IS_NULL));
    assert!(!nulled.contains(ValueAttributes::IS_UNCHANGED));

    let row = proxy.append_row().unwrap();
    let id = proxy.get_attributes(row, 0).unwrap();
    assert!(id.contains(ValueAttributes::IS_DEFAULT | ValueAttributes::IS_NULL));
    assert!(!id.intersects(ValueAttributes::DATA_NON_VALID | ValueAttributes::HAS_VALUE_ORIG));
}

#[timeout(1000)]
#[test]
fn test_read_only_column_and_table() {
    let table = MemoryTable::new(
        "codes",
        vec![
            ColumnSpec::new("code", ValueType::Int).read_only(),
            ColumnSpec::new("label", ValueType::Text),
        ],
    )
    .with_rows(vec![vec![Value::Int(7), "seven".into()]])
    .unwrap();
    let proxy = open(&table, ProxyConfig::default());
    assert!(matches!(
        proxy.set_value(0, 0, Value::Int(8)),
        Err(ProxyError::ColumnReadOnly { column: 0 })
    ));
    assert!(proxy
        .get_attributes(0, 0)
        .unwrap()
        .contains(ValueAttributes::READ_ONLY));

    let locked = super::helpers::people(2).with_access(AccessFlags::READ_ONLY);
    let proxy = open(&locked, ProxyConfig::default());
    assert!(matches!(
        proxy.append_row(),
        Err(ProxyError::InsertNotSupported)
    ));
    assert!(matches!(
        proxy.mark_delete(0),
        Err(ProxyError::DeleteNotSupported)
    ));
    assert!(matches!(
        proxy.set_value(0, 1, "x".into()),
        Err(ProxyError::ColumnReadOnly { column: 1 })
    ));
}

#[timeout(1000)]
#[test]
fn test_out_of_range_access() {
    let table = people(3);
    let proxy = open(&table, ProxyConfig::default());

    assert!(matches!(
        proxy.get_value(3, 0),
        Err(ProxyError::RowOutOfRange { row: 3 })
    ));
    assert!(matches!(
        proxy.get_value(0, 3),
        Err(ProxyError::ColumnOutOfRange { col: 3, count: 3 })
    ));
    assert!(matches!(
        proxy.set_value(4, 0, Value::Int(1)),
        Err(ProxyError::RowOutOfRange { row: 4 })
    ));
}
