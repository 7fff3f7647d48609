use bubblelog_core::history::HistoryBuffer;
use pretty_assertions::assert_eq;

#[test]
fn test_capacity_from_window() {
    assert_eq!(HistoryBuffer::capacity_for(7200.0, 1000), 7200);
    assert_eq!(HistoryBuffer::capacity_for(10.0, 300), 33);
    assert_eq!(HistoryBuffer::capacity_for(0.0, 1000), 1);
    assert_eq!(HistoryBuffer::capacity_for(10.0, 0), 1);
}

#[test]
fn test_eviction_keeps_last_entries_in_order() {
    for capacity in [1usize, 2, 7, 50] {
        for extra in [0usize, 1, 3, 100] {
            let mut buffer = HistoryBuffer::new(capacity);
            let total = capacity + extra;
            for i in 0..total {
                buffer.append(i as f64, i as f64 * 10.0);
                assert!(buffer.len() <= capacity);
            }

            let expected: Vec<(f64, f64)> = (extra..total)
                .map(|i| (i as f64, i as f64 * 10.0))
                .collect();
            assert_eq!(buffer.snapshot(), expected);
            assert_eq!(buffer.latest(), expected.last().copied());
        }
    }
}

#[test]
fn test_out_of_order_times_are_stored_verbatim() {
    let mut buffer = HistoryBuffer::new(3);
    buffer.append(5.0, 1.0);
    buffer.append(2.0, 2.0);
    buffer.append(f64::NAN, 3.0);

    let points = buffer.snapshot();
    assert_eq!(points[0], (5.0, 1.0));
    assert_eq!(points[1], (2.0, 2.0));
    assert!(points[2].0.is_nan());
}

#[test]
fn test_clear() {
    let mut buffer = HistoryBuffer::with_window(1.0, 100);
    assert_eq!(buffer.capacity(), 10);
    buffer.append(0.0, 1.0);
    buffer.clear();
    assert!(buffer.is_empty());
    assert_eq!(buffer.latest(), None);
    assert_eq!(buffer.capacity(), 10);
}
