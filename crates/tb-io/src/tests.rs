//! Unit tests for tb-io.

#[cfg(test)]
mod csv_tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use tb_core::RowId;
    use tb_store::{Store, StoreError, StoreView};
    use tempfile::TempDir;

    use crate::{IoError, ROW_COLUMN, export_csv, export_csv_path, import_csv, import_csv_path};

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    /// Three rows with one released, so row 1 is skipped on export.
    fn people() -> Store {
        let store = Store::new("person", 8);
        let age = store.add_int("age").unwrap();
        let name = store.add_string("name").unwrap();
        let friends = store.add_ref_list("friends").unwrap();
        let alive = store.add_bool("alive").unwrap();

        let a = store.allocate();
        let b = store.allocate();
        let c = store.allocate();
        age.set(a, 34);
        name.set(a, Some("Ada, Countess"));
        friends.set_ids(a, &[c, RowId(40)]);
        alive.set(a, true);
        age.set(b, 1);
        age.set(c, 51);
        alive.set(c, false);
        store.release(b);
        store
    }

    fn empty_people() -> Store {
        let store = Store::new("person", 8);
        store.add_int("age").unwrap();
        store.add_string("name").unwrap();
        store.add_ref_list("friends").unwrap();
        store.add_bool("alive").unwrap();
        store
    }

    #[test]
    fn export_writes_header_and_present_rows() {
        let mut out = Vec::new();
        let written = export_csv(&people(), &mut out).unwrap();
        assert_eq!(written, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "_row,age,name,friends,alive");
        assert_eq!(lines[1], "0,34,\"Ada, Countess\",\"2,14\",true");
        assert_eq!(lines[2], "2,51,,,false");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn file_round_trip_preserves_every_cell() {
        let dir = tmp();
        let path = dir.path().join("person.csv");
        let source = people();
        export_csv_path(&source, &path).unwrap();

        let target = empty_people();
        let read = import_csv_path(&target, &path, &[]).unwrap();
        assert_eq!(read, 2);
        assert_eq!(target.count(), 3);

        for row in source.row_ids() {
            for column in source.attributes() {
                let loaded = target.get(column.name()).unwrap();
                assert_eq!(loaded.get_string(row), column.get_string(row), "{} {row}", column.name());
            }
        }
        assert!(!target.is_row_present(RowId(1)));
    }

    #[test]
    fn import_fires_once_over_the_touched_range() {
        let store = empty_people();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.add_listener(Arc::new(move |_: &Store, from: usize, to: usize| {
            sink.lock().push((from, to));
        }));

        let input = "_row,age\n3,10\na,11\n5,12\n";
        assert_eq!(import_csv(&store, input.as_bytes(), &[]).unwrap(), 3);
        assert_eq!(*seen.lock(), vec![(3, 11)]);
        assert_eq!(store.count(), 11);
        assert_eq!(store.get("age").unwrap().get_string(RowId(10)), "11");
    }

    #[test]
    fn excluded_listener_is_skipped() {
        let store = empty_people();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let id = store.add_listener(Arc::new(move |_: &Store, _: usize, _: usize| {
            h.fetch_add(1, Ordering::Relaxed);
        }));

        import_csv(&store, "_row,age\n0,1\n".as_bytes(), &[id]).unwrap();
        assert_eq!(hits.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn header_only_input_fires_nothing() {
        let store = empty_people();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        store.add_listener(Arc::new(move |_: &Store, _: usize, _: usize| {
            h.fetch_add(1, Ordering::Relaxed);
        }));

        assert_eq!(import_csv(&store, "_row,age\n".as_bytes(), &[]).unwrap(), 0);
        assert_eq!(hits.load(Ordering::Relaxed), 0);
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn unknown_column_is_rejected() {
        let store = empty_people();
        let err = import_csv(&store, "_row,height\n0,3\n".as_bytes(), &[]).unwrap_err();
        assert!(matches!(err, IoError::Store(StoreError::UnknownColumn(ref n)) if n == "height"));
    }

    #[test]
    fn missing_row_column_is_rejected() {
        let store = empty_people();
        let err = import_csv(&store, "age\n3\n".as_bytes(), &[]).unwrap_err();
        assert!(matches!(err, IoError::MissingRowColumn(ROW_COLUMN)));
    }

    #[test]
    fn bad_row_id_reports_the_record() {
        let store = empty_people();
        let err = import_csv(&store, "_row,age\n0,1\n-4,2\n".as_bytes(), &[]).unwrap_err();
        match err {
            IoError::BadRowId { record, text } => {
                assert_eq!(record, 2);
                assert_eq!(text, "-4");
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn unparseable_cell_surfaces_store_error() {
        let store = empty_people();
        let err = import_csv(&store, "_row,alive\n0,maybe\n".as_bytes(), &[]).unwrap_err();
        assert!(matches!(err, IoError::Store(StoreError::Parse { .. })));
    }
}
