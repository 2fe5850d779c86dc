//! Paging, deferred resync and filter windows.

use ntest::timeout;

use data_proxy_core::table::BaseTable;
use data_proxy_core::{ProxyConfig, ProxyEvent, ResyncProgress, Value};

use super::helpers::{open, paged, people, record_events, take, visible_rows};

fn deferred(sample_size: usize, resync_step: usize) -> ProxyConfig {
    ProxyConfig {
        sample_size,
        resync_step,
        defer_sync: true,
        ..ProxyConfig::default()
    }
}

#[timeout(1000)]
#[test]
fn test_window_length_matches_row_count() {
    let table = people(7);
    for (size, start, expected_start, expected_len) in [
        (3, 0, 0, 3),
        (3, 6, 6, 1),
        (3, 10, 6, 1),
        (0, 4, 0, 7),
        (10, 0, 0, 7),
    ] {
        let proxy = open(
            &table,
            ProxyConfig {
                sample_size: size,
                sample_start: start,
                add_null_entry: true,
                ..ProxyConfig::default()
            },
        );
        assert_eq!(proxy.sample_start(), expected_start, "size {} start {}", size, start);
        assert_eq!(visible_rows(&proxy).len(), expected_len);
        assert_eq!(proxy.row_count(), Some(expected_len + 1));

        proxy.append_row().unwrap();
        assert_eq!(proxy.row_count(), Some(expected_len + 2));
        assert_eq!(visible_rows(&proxy).last(), Some(&None));
    }
}

#[timeout(1000)]
#[test]
fn test_new_rows_stay_visible_across_pages() {
    let table = people(5);
    let proxy = open(&table, paged(2));

    assert_eq!(proxy.append_row().unwrap(), 2);
    proxy.set_sample_start(4);

    assert_eq!(visible_rows(&proxy), vec![Some(4), None]);
    assert!(proxy.row_is_new(1));
    assert_eq!(proxy.sample_end(), Some(4));
}

#[timeout(1000)]
#[test]
fn test_unbounded_sample_size_shows_rest_of_table() {
    let table = people(5);
    let proxy = open(&table, paged(2));

    proxy.set_sample_start(2);
    proxy.set_sample_size(usize::MAX);

    assert_eq!(visible_rows(&proxy), vec![Some(2), Some(3), Some(4)]);
    assert_eq!(proxy.sample_start(), 2);
    assert_eq!(proxy.sample_end(), Some(4));
}

#[timeout(1000)]
#[test]
fn test_growing_page_inserts_rows() {
    let table = people(5);
    let proxy = open(&table, paged(2));
    let events = record_events(&proxy);

    proxy.set_sample_size(4);

    assert_eq!(
        take(&events),
        vec![
            ProxyEvent::SampleSizeChanged(4),
            ProxyEvent::SampleChanged {
                first: 0,
                last: Some(3)
            },
            ProxyEvent::RowInserted(2),
            ProxyEvent::RowInserted(3),
        ]
    );

    proxy.set_sample_size(0);
    assert_eq!(
        take(&events),
        vec![
            ProxyEvent::SampleSizeChanged(0),
            ProxyEvent::SampleChanged {
                first: 0,
                last: Some(4)
            },
            ProxyEvent::RowInserted(4),
        ]
    );
    assert_eq!(proxy.row_count(), Some(5));
}

#[timeout(1000)]
#[test]
fn test_abandoned_resync_restarts_from_displayed_rows() {
    let table = people(6);
    let proxy = open(&table, deferred(2, 50));

    proxy.set_sample_start(2);
    assert_eq!(proxy.step_resync(1), ResyncProgress::Pending);
    assert_eq!(proxy.get_value(0, 0).unwrap(), Value::Int(3));
    assert_eq!(proxy.get_value(1, 0).unwrap(), Value::Int(2));

    let events = record_events(&proxy);
    proxy.set_sample_start(4);
    proxy.ensure_resync_complete();

    assert_eq!(
        take(&events),
        vec![
            ProxyEvent::SampleChanged {
                first: 4,
                last: Some(5)
            },
            ProxyEvent::RowUpdated(0),
            ProxyEvent::RowUpdated(1),
        ]
    );
    assert_eq!(visible_rows(&proxy), vec![Some(4), Some(5)]);
}

#[timeout(1000)]
#[test]
fn test_tick_uses_configured_step() {
    let table = people(6);
    let proxy = open(&table, deferred(3, 1));

    proxy.set_sample_start(3);
    let mut ticks = 0;
    while proxy.tick() == ResyncProgress::Pending {
        ticks += 1;
    }

    assert_eq!(ticks, 3);
    assert!(!proxy.resync_pending());
    assert_eq!(visible_rows(&proxy), vec![Some(3), Some(4), Some(5)]);
}

#[timeout(1000)]
#[test]
fn test_edit_finishes_pending_resync() {
    let table = people(6);
    let proxy = open(&table, deferred(3, 1));

    proxy.set_sample_start(3);
    proxy.set_value(0, 1, "dd".into()).unwrap();

    assert!(!proxy.resync_pending());
    assert_eq!(table.get_value(1, 3).unwrap(), Value::from("dan"));
    assert!(proxy.row_has_changed(0));
    assert_eq!(proxy.proxied_model_row(0), Some(3));
}

#[timeout(1000)]
#[test]
fn test_filter_window_is_maintained() {
    let table = people(6);
    let proxy = open(&table, ProxyConfig::default());
    proxy.set_filter_text(Some("age > 30")).unwrap();
    assert_eq!(visible_rows(&proxy), vec![Some(2), Some(3), Some(4), Some(5)]);

    let row = proxy
        .append_values(vec![None, Some("zed".into()), Some(Value::Int(10))])
        .unwrap();
    assert_eq!(row, 4);
    proxy.apply_row(row).unwrap();
    assert_eq!(
        visible_rows(&proxy),
        vec![Some(2), Some(3), Some(4), Some(5), Some(6)]
    );

    let events = record_events(&proxy);
    proxy.mark_delete(0).unwrap();
    proxy.apply_row(0).unwrap();

    assert!(take(&events).contains(&ProxyEvent::RowRemoved(0)));
    assert_eq!(visible_rows(&proxy), vec![Some(2), Some(3), Some(4), Some(5)]);
    assert_eq!(proxy.filtered_row_count(), Some(4));
    assert_eq!(proxy.get_value(3, 1).unwrap(), Value::from("zed"));
}
