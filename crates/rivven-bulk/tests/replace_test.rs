//! Tests for the `replace into` strategy

use rivven_bulk::dialect::DISABLE_FOREIGN_KEY_CHECKS;
use rivven_bulk::prelude::*;
use rivven_bulk::testing::*;
use std::sync::Arc;

fn replace_loader(conn: &MockConnection, rows: Vec<Row>) -> BulkLoader {
    let source = MockRowSource::new().with_table("users", &["id", "name"], rows);
    BulkLoader::new(
        Arc::new(conn.clone()),
        Arc::new(source),
        LoaderConfig::default().with_strategy(WriteStrategy::Replace),
    )
    .unwrap()
}

#[tokio::test]
async fn test_statement_shape() {
    let conn = MockConnection::new();
    let rows = vec![
        Row::new().with("id", "1").with("name", "'alice'"),
        Row::new().with("id", "2"),
    ];
    replace_loader(&conn, rows).load_table("users").await.unwrap();

    let transactions = conn.transactions();
    let tx = &transactions[0];
    assert_eq!(tx.statements[0], DISABLE_FOREIGN_KEY_CHECKS);
    assert_eq!(
        tx.statements[1],
        "replace into users values (1,'alice'),(2,NULL)"
    );
}

#[tokio::test]
async fn test_values_are_not_escaped() {
    let conn = MockConnection::new();
    let rows = vec![Row::new().with("id", "1").with("name", "a,b")];
    replace_loader(&conn, rows).load_table("users").await.unwrap();

    assert_eq!(
        conn.transactions()[0].statements[1],
        "replace into users values (1,a,b)"
    );

    // the comma splits the value into two fields
    let stored = conn.committed_rows("users");
    assert_eq!(stored[0].len(), 3);
}

#[tokio::test]
async fn test_replace_does_not_touch_local_infile() {
    let conn = MockConnection::new();
    let rows = vec![Row::new().with("id", "1").with("name", "'x'")];
    let loader = replace_loader(&conn, rows);

    loader.load_table("users").await.unwrap();
    loader.close().await.unwrap();

    assert!(!conn.local_infile_enabled());
    assert_eq!(conn.local_infile_queries(), 0);
}
