use super::*;
use crate::types::TOMBSTONE;
use std::io::Write;

fn tree_with(buffer_max_entries: usize, depth: usize, fanout: usize) -> LsmTree {
    LsmTree::new(LsmTreeConfig {
        buffer_max_entries,
        depth,
        fanout,
        thread_count: 2,
        bf_bits_per_entry: 0.5,
    })
}

fn default_tree() -> LsmTree {
    tree_with(4, 3, 2)
}

#[test]
fn buffer_hit() {
    let tree = default_tree();
    tree.put(1, 10).unwrap();
    tree.put(2, 20).unwrap();
    assert_eq!(tree.get(2), Some(20));
    assert_eq!(tree.get(3), None);
}

#[test]
fn overwrite_returns_latest_value() {
    let tree = default_tree();
    tree.put(5, 50).unwrap();
    tree.put(5, 55).unwrap();
    assert_eq!(tree.get(5), Some(55));
}

#[test]
fn delete_then_read_is_absent_and_excluded_from_range() {
    let tree = default_tree();
    tree.put(7, 70).unwrap();
    tree.delete(7).unwrap();
    assert_eq!(tree.get(7), None);
    let got: Vec<Key> = tree.range(0, 11).iter().map(|e| e.key).collect();
    assert!(!got.contains(&7));
}

#[test]
fn flush_triggers_l0_run_and_both_halves_stay_visible() {
    let tree = default_tree();
    for k in 1..=5 {
        tree.put(k, k).unwrap();
    }
    assert_eq!(tree.get(1), Some(1));
    assert_eq!(tree.get(5), Some(5));
}

#[test]
fn cascade_respects_level_capacities_and_every_key_remains_gettable() {
    let tree = tree_with(2, 3, 2);
    for k in 1..=9 {
        tree.put(k, k * 100).unwrap();
    }
    {
        let levels = tree.levels.lock().unwrap();
        assert!(levels[0].runs.len() <= 2);
        assert!(levels[1].runs.len() <= 2);
    }
    for k in 1..=9 {
        assert_eq!(tree.get(k), Some(k * 100), "key {k} should still be gettable");
    }
}

#[test]
fn range_across_buffer_and_runs_is_exact() {
    let tree = default_tree();
    for k in 1..=10 {
        tree.put(k, k).unwrap();
    }
    let got: Vec<(Key, Value)> = tree.range(3, 8).into_iter().map(|e| (e.key, e.value)).collect();
    assert_eq!(got, vec![(3, 3), (4, 4), (5, 5), (6, 6), (7, 7)]);
}

#[test]
fn range_end_not_greater_than_start_is_empty() {
    let tree = default_tree();
    tree.put(1, 1).unwrap();
    assert!(tree.range(5, 5).is_empty());
    assert!(tree.range(5, 1).is_empty());
}

#[test]
fn tombstone_survives_non_final_levels_and_is_gced_at_the_last() {
    let tree = tree_with(2, 2, 2);
    tree.put(1, 100).unwrap();
    tree.put(2, 200).unwrap();
    tree.put(3, 300).unwrap(); // flushes {1,2} to level 0
    tree.put(4, 400).unwrap();
    tree.delete(3).unwrap();
    tree.put(5, 500).unwrap(); // flushes {3:tombstone,4} to level 0 (now 2 runs)
    tree.put(6, 600).unwrap(); // forces cascade of level 0 into level 1 (final)

    assert_eq!(tree.get(3), None);
    assert_eq!(tree.get(1), Some(100));
    assert_eq!(tree.get(2), Some(200));
    assert_eq!(tree.get(4), Some(400));

    let levels = tree.levels.lock().unwrap();
    let last = levels.last().unwrap();
    assert!(!last.runs.is_empty(), "cascade should have populated level 1");
    for run in &last.runs {
        run.map_read().unwrap();
        let entries = run.mapped_entries();
        run.unmap();
        assert!(
            entries.iter().all(|e| e.key != 3),
            "tombstone for key 3 must be garbage-collected at the final level"
        );
    }
}

#[test]
fn capacity_exhaustion_is_a_fatal_error() {
    // depth=1, fanout=1: level 0 is also the deepest level and holds exactly
    // one run of one entry, so the third distinct key has nowhere to go.
    let tree = tree_with(1, 1, 1);
    tree.put(1, 1).unwrap();
    tree.put(2, 2).unwrap();
    let err = tree.put(3, 3).unwrap_err();
    assert!(matches!(err, TreeError::CapacityExhausted));
}

#[test]
fn load_replays_records_equivalent_to_direct_puts() {
    let tree = default_tree();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for (k, v) in [(1i64, 11i64), (2, 22), (3, 33)] {
        file.write_all(&Entry::new(k, v).encode()).unwrap();
    }
    file.flush().unwrap();

    tree.load(file.path()).unwrap();
    assert_eq!(tree.get(1), Some(11));
    assert_eq!(tree.get(2), Some(22));
    assert_eq!(tree.get(3), Some(33));
}

#[test]
fn load_missing_file_is_an_error() {
    let tree = default_tree();
    assert!(tree.load("/nonexistent/path/to/a/load/file").is_err());
}

#[test]
fn concurrent_get_returns_the_newest_value() {
    let tree = Arc::new(tree_with(3, 3, 3));
    for k in 0..20 {
        tree.put(k, k).unwrap();
    }
    for k in 0..20 {
        tree.put(k, k + 1000).unwrap();
    }
    std::thread::scope(|scope| {
        for _ in 0..4 {
            let tree = Arc::clone(&tree);
            scope.spawn(move || {
                for k in 0..20 {
                    assert_eq!(tree.get(k), Some(k + 1000));
                }
            });
        }
    });
}

#[test]
fn tombstone_value_is_never_observable_even_through_buffer() {
    let tree = default_tree();
    tree.delete(42).unwrap();
    assert_eq!(tree.get(42), None);
    assert_eq!(tree.get(42), None);
    let _ = TOMBSTONE;
}
