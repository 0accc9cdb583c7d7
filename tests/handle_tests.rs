//! End-to-end tests for the handle against in-memory and on-disk stores.

#[cfg(test)]
mod handle_tests {
    use ntlite::{named_params, Handle, HandleConfig, NtliteError, TransactionMode, Value};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use tempfile::TempDir;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn table_t() -> Handle {
        init_tracing();
        let handle = Handle::open_in_memory().unwrap();
        handle.exec_script("CREATE TABLE t(a INT, b TEXT)").unwrap();
        handle
    }

    #[test]
    fn test_insert_commit_get_scenario() {
        let handle = table_t();
        handle.exec("INSERT INTO t VALUES (?, ?)", (1, "x")).unwrap();
        handle.commit().unwrap();

        let record = handle.get("SELECT a,b FROM t", []).unwrap().unwrap();
        assert_eq!(record.names(), &["a".to_string(), "b".to_string()]);
        assert_eq!(record.get("a"), Some(&Value::Integer(1)));
        assert_eq!(record.get("b"), Some(&Value::Text("x".to_string())));
    }

    #[test]
    fn test_rollback_discards_uncommitted_insert() {
        let handle = table_t();
        handle.exec("INSERT INTO t VALUES (?, ?)", (1, "x")).unwrap();
        handle.rollback().unwrap();

        assert!(handle.get_all("SELECT * FROM t", []).unwrap().is_empty());
    }

    #[test]
    fn test_empty_results() {
        let handle = table_t();
        assert!(handle.get("SELECT * FROM t", []).unwrap().is_none());

        let all = handle.get_all("SELECT * FROM t", []).unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn test_get_all_preserves_order_and_reexecutes() {
        let handle = table_t();
        handle
            .exec_many(
                "INSERT INTO t VALUES (?1, ?2)",
                vec![(3, "c"), (1, "a"), (2, "b")],
            )
            .unwrap();

        let first: Vec<i64> = handle
            .get_all("SELECT a FROM t", [])
            .unwrap()
            .iter()
            .map(|r| r.get_as("a").unwrap())
            .collect();
        assert_eq!(first, vec![3, 1, 2]);

        handle.exec("DELETE FROM t WHERE a = 1", []).unwrap();
        let second = handle.get_all("SELECT a FROM t", []).unwrap();
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn test_cursor_reports_columns_and_changes() {
        let handle = table_t();
        let insert = handle
            .exec("INSERT INTO t VALUES (:a, :b)", named_params! { ":a": 9, ":b": "z" })
            .unwrap();
        assert_eq!(insert.rows_affected(), Some(1));
        assert_eq!(insert.last_insert_rowid(), 1);

        let select = handle.exec("SELECT b AS label, a FROM t", []).unwrap();
        assert_eq!(select.columns(), &["label", "a"]);
        assert_eq!(select.rows_affected(), None);
        let records: Vec<_> = select.collect();
        assert_eq!(records[0].to_json().unwrap(), r#"{"label":"z","a":9}"#);
    }

    #[test]
    fn test_statement_errors_carry_native_error() {
        let handle = table_t();

        let err = handle.exec("SELEC 1", []).unwrap_err();
        assert!(matches!(err, NtliteError::Statement(_)));
        assert_eq!(err.sqlite_code(), Some(rusqlite::ErrorCode::Unknown));

        let err = handle.exec("INSERT INTO t VALUES (?1)", (1, 2)).unwrap_err();
        assert!(matches!(err, NtliteError::Statement(_)));
        assert!(err.sqlite_error().is_some());

        handle
            .exec_script("CREATE TABLE u(id INTEGER PRIMARY KEY)")
            .unwrap();
        handle.exec("INSERT INTO u VALUES (1)", []).unwrap();
        let err = handle.exec("INSERT INTO u VALUES (1)", []).unwrap_err();
        assert_eq!(err.sqlite_code(), Some(rusqlite::ErrorCode::ConstraintViolation));
    }

    #[test]
    fn test_multiple_statements_rejected_without_running() {
        let handle = table_t();

        let err = handle
            .exec("INSERT INTO t VALUES (1, 'a'); INSERT INTO t VALUES (2, 'b')", [])
            .unwrap_err();
        assert!(matches!(err, NtliteError::Statement(_)));
        assert_eq!(err.sqlite_code(), Some(rusqlite::ErrorCode::ApiMisuse));
        assert!(handle.get("SELECT 1; SELECT 2", []).is_err());
        assert!(handle.get_all("SELECT 1; SELECT 2", []).is_err());

        assert!(handle.get_all("SELECT * FROM t", []).unwrap().is_empty());
        assert!(!handle.in_transaction().unwrap());

        // Trailing terminators and comments are not extra statements
        handle.exec("INSERT INTO t VALUES (3, 'c'); -- done", []).unwrap();
        assert_eq!(handle.get_all("SELECT * FROM t;;", []).unwrap().len(), 1);
    }

    #[test]
    fn test_trigger_body_is_one_statement() {
        let handle = table_t();
        handle.exec_script("CREATE TABLE log(msg TEXT)").unwrap();
        handle
            .exec(
                "CREATE TRIGGER t_log AFTER INSERT ON t BEGIN \
                 INSERT INTO log VALUES (NEW.b); \
                 INSERT INTO log VALUES ('again'); \
                 END;",
                [],
            )
            .unwrap();

        handle.exec("INSERT INTO t VALUES (1, 'x')", []).unwrap();
        assert_eq!(handle.get_all("SELECT msg FROM log", []).unwrap().len(), 2);
    }

    #[test]
    fn test_blank_sql_returns_empty_results() {
        let handle = table_t();

        let cursor = handle.exec("", []).unwrap();
        assert!(cursor.columns().is_empty());
        assert_eq!(cursor.remaining(), 0);

        assert!(handle.get("-- hi", []).unwrap().is_none());
        assert!(handle.get_all("   ", []).unwrap().is_empty());
        assert!(!handle.in_transaction().unwrap());
    }

    #[test]
    fn test_exec_many_with_no_parameter_sets() {
        let handle = table_t();
        let cursor = handle
            .exec_many("INSERT INTO t VALUES (?1, ?2)", Vec::<(i64, &str)>::new())
            .unwrap();

        assert_eq!(cursor.rows_affected(), Some(0));
        assert!(!handle.in_transaction().unwrap());
    }

    #[test]
    fn test_exec_many_failure_is_partial() {
        let handle = table_t();
        handle
            .exec_script("CREATE TABLE u(id INTEGER PRIMARY KEY)")
            .unwrap();

        let result = handle.exec_many("INSERT INTO u VALUES (?1)", vec![[1], [2], [2], [3]]);
        assert!(result.is_err());

        // Rows before the failing set stay inside the open transaction
        assert!(handle.in_transaction().unwrap());
        assert_eq!(handle.get_all("SELECT id FROM u", []).unwrap().len(), 2);
    }

    #[test]
    fn test_commit_without_transaction_fails() {
        let handle = table_t();
        let err = handle.commit().unwrap_err();
        match err {
            NtliteError::Transaction(e) => assert!(e.to_string().contains("no transaction")),
            other => panic!("Expected Transaction error, got {:?}", other),
        }
    }

    #[test]
    fn test_autocommit_mode_persists_each_statement() {
        init_tracing();
        let config = HandleConfig::default().with_transaction_mode(TransactionMode::Autocommit);
        let handle = Handle::open_with_config(config).unwrap();
        handle.exec_script("CREATE TABLE t(a INT)").unwrap();
        handle.exec("INSERT INTO t VALUES (1)", []).unwrap();

        assert!(!handle.in_transaction().unwrap());
        assert!(handle.rollback().is_err());
        assert_eq!(handle.get_all("SELECT a FROM t", []).unwrap().len(), 1);
    }

    #[test]
    fn test_file_store_persists_committed_rows_only() {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.db").to_str().unwrap().to_string();

        let mut handle = Handle::open(path.clone()).unwrap();
        assert_eq!(handle.path(), path);
        handle.exec_script("CREATE TABLE t(a INT, b TEXT)").unwrap();
        handle.exec("INSERT INTO t VALUES (1, 'kept')", []).unwrap();
        handle.commit().unwrap();
        handle.exec("INSERT INTO t VALUES (2, 'lost')", []).unwrap();
        handle.close().unwrap();

        let rows = Handle::scope(path, |h| h.get_all("SELECT b FROM t", [])).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_as::<String>("b").unwrap(), "kept");
    }

    #[test]
    fn test_handle_dropped_without_close() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("drop.db").to_str().unwrap().to_string();
        {
            let handle = Handle::open(path.clone()).unwrap();
            handle.exec_script("CREATE TABLE t(a INT)").unwrap();
        }
        let handle = Handle::open(path).unwrap();
        assert!(handle.get_all("SELECT * FROM t", []).unwrap().is_empty());
    }

    #[test]
    fn test_not_a_database_fails_to_open_or_query() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, vec![0x42u8; 4096]).unwrap();

        // SQLite may defer reading the header until the first statement
        let outcome = Handle::open(path.to_str().unwrap())
            .and_then(|h| h.get_all("SELECT * FROM sqlite_master", []));
        assert_eq!(
            outcome.unwrap_err().sqlite_code(),
            Some(rusqlite::ErrorCode::NotADatabase)
        );
    }

    #[test]
    fn test_serialized_use_across_threads() {
        let handle = Arc::new(Mutex::new(table_t()));

        let workers: Vec<_> = (0..4)
            .map(|i| {
                let handle = Arc::clone(&handle);
                thread::spawn(move || {
                    let guard = handle.lock().unwrap();
                    guard.exec("INSERT INTO t VALUES (?1, 'w')", [i]).unwrap();
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let guard = handle.lock().unwrap();
        guard.commit().unwrap();
        assert_eq!(guard.get_all("SELECT a FROM t", []).unwrap().len(), 4);
    }
}
