//! Prepared statement lifecycle: prepare, execute many times, close once.

mod common;

use common::{MockConnector, MockState, People, Person, logged_pool, quiet_pool};
use dmlkit::{Args, ColumnMapper, Cond, ConnPool, DmlError, Executor, PoolConfig, QueryBuilder, qb};

#[tokio::test]
async fn insert_prepared_once_executed_many_times() {
    let (pool, state) = quiet_pool();
    state.set_last_insert_id(21);

    let stmt = qb::insert_into("dml_people")
        .add_columns(["name", "email"])
        .prepare(&pool)
        .await
        .unwrap();
    assert_eq!(stmt.record_columns(), ["name", "email"]);

    stmt.execute(&Args::new().text("A").null()).await.unwrap();
    let mut b = Person::new("B", Some("b@example.com"));
    stmt.execute_record(&mut b).await.unwrap();
    assert_eq!(b.id, 21);

    stmt.close().await.unwrap();
    assert_eq!(
        state.calls(),
        vec![
            "prepare INSERT INTO `dml_people` (`name`,`email`) VALUES (?,?)",
            "stmt exec ['A', NULL]",
            "stmt exec ['B', 'b@example.com']",
            "stmt close",
        ]
    );
}

#[tokio::test]
async fn multi_row_insert_takes_all_records_in_one_execution() {
    let (pool, state) = quiet_pool();
    state.set_last_insert_id(5);

    let stmt = qb::insert_into("dml_people")
        .add_columns(["name", "email"])
        .set_row_count(2)
        .prepare(&pool)
        .await
        .unwrap();

    let mut a = Person::new("A", None);
    let mut b = Person::new("B", None);
    let mut records: [&mut dyn ColumnMapper; 2] = [&mut a, &mut b];
    stmt.execute_records(&mut records).await.unwrap();

    assert_eq!(a.id, 0);
    assert_eq!(b.id, 0);
    assert_eq!(
        state.calls(),
        vec![
            "prepare INSERT INTO `dml_people` (`name`,`email`) VALUES (?,?),(?,?)",
            "stmt exec ['A', NULL, 'B', NULL]",
        ]
    );
}

#[tokio::test]
async fn update_reads_set_and_where_columns_from_record() {
    let (pool, state) = quiet_pool();

    let stmt = qb::update("dml_people")
        .add_columns(["name", "email"])
        .where_(Cond::eq_placeholder("id"))
        .prepare(&pool)
        .await
        .unwrap();

    let mut person = Person {
        id: 3,
        name: "C".into(),
        email: None,
    };
    stmt.execute_record(&mut person).await.unwrap();

    assert_eq!(
        state.calls(),
        vec![
            "prepare UPDATE `dml_people` SET `name`=?, `email`=? WHERE `id` = ?",
            "stmt exec ['C', NULL, 3]",
        ]
    );
}

#[tokio::test]
async fn prepared_select_loads_rows() {
    let (pool, state) = quiet_pool();
    state.set_rows(dmlkit::Rows::new(
        vec!["id".into(), "name".into()],
        vec![vec![1.into(), "A".into()]],
    ));

    let stmt = qb::select_from("dml_people")
        .columns(["id", "name"])
        .where_(Cond::eq_placeholder("id"))
        .prepare(&pool)
        .await
        .unwrap();

    let mut people = People::default();
    assert_eq!(stmt.load(&Args::new().int(1), &mut people).await.unwrap(), 1);
    assert_eq!(people.0[0].name, "A");
    assert_eq!(state.calls()[1], "stmt query [1]");
}

#[tokio::test]
async fn closed_statement_never_reaches_the_driver() {
    let (pool, state) = quiet_pool();

    let stmt = qb::delete_from("dml_people")
        .where_(Cond::eq_placeholder("id"))
        .prepare(&pool)
        .await
        .unwrap();
    stmt.close().await.unwrap();
    assert!(stmt.is_closed().await);
    state.clear_calls();

    let err = stmt.execute(&Args::new().int(1)).await.unwrap_err();
    assert!(err.is_already_closed());
    assert_eq!(err.to_string(), "Already closed: prepared delete `dml_people`");

    let err = stmt.close().await.unwrap_err();
    assert!(matches!(err, DmlError::AlreadyClosed(_)));
    assert!(state.calls().is_empty());
}

#[tokio::test]
async fn build_time_values_cannot_be_prepared() {
    let (pool, state) = quiet_pool();

    let err = qb::select_from("dml_people")
        .eq("id", 1)
        .prepare(&pool)
        .await
        .unwrap_err();

    assert!(err.is_mismatch());
    assert!(state.calls().is_empty());
}

#[tokio::test]
async fn statement_on_pool_keeps_its_connection() {
    let (pool, state) = quiet_pool();

    let stmt = qb::delete_from("dml_people")
        .where_(Cond::eq_placeholder("id"))
        .prepare(&pool)
        .await
        .unwrap();
    assert_eq!(state.connections(), 1);

    // the pinned connection is busy, so a second one is opened
    pool.exec_sql("DELETE FROM dml_people", &[]).await.unwrap();
    assert_eq!(state.connections(), 2);

    stmt.close().await.unwrap();
    pool.exec_sql("DELETE FROM dml_people", &[]).await.unwrap();
    pool.exec_sql("DELETE FROM dml_people", &[]).await.unwrap();
    assert_eq!(state.connections(), 2);
}

#[tokio::test]
async fn statement_on_conn_closes_with_its_conn() {
    let state = MockState::new();
    let pool = ConnPool::new(
        MockConnector {
            state: state.clone(),
        },
        PoolConfig::new().with_max_size(1),
    )
    .unwrap();

    let conn = pool.conn().await.unwrap();
    let stmt = qb::delete_from("dml_people")
        .where_(Cond::eq_placeholder("id"))
        .prepare(&conn)
        .await
        .unwrap();
    stmt.execute(&Args::new().int(1)).await.unwrap();
    drop(conn);

    // the connection is back in the pool and now belongs to the transaction
    let tx = pool.begin_tx().await.unwrap();
    let err = stmt.execute(&Args::new().int(2)).await.unwrap_err();
    assert!(err.is_already_closed());
    assert_eq!(err.to_string(), "Already closed: prepared delete `dml_people`");
    assert!(stmt.is_closed().await);
    assert!(stmt.close().await.unwrap_err().is_already_closed());
    tx.rollback().await.unwrap();

    assert_eq!(
        state.calls(),
        vec![
            "prepare DELETE FROM `dml_people` WHERE `id` = ?",
            "stmt exec [1]",
            "begin",
            "rollback",
        ]
    );
    assert_eq!(state.connections(), 1);
}

#[tokio::test]
async fn statement_on_conn_closes_when_conn_begins_a_transaction() {
    let (pool, state) = quiet_pool();

    let conn = pool.conn().await.unwrap();
    let stmt = qb::delete_from("dml_people")
        .where_(Cond::eq_placeholder("id"))
        .prepare(&conn)
        .await
        .unwrap();
    let tx = conn.begin_tx().await.unwrap();

    assert!(stmt.execute(&Args::new().int(1)).await.unwrap_err().is_already_closed());
    tx.commit().await.unwrap();
    assert_eq!(
        state.calls(),
        vec!["prepare DELETE FROM `dml_people` WHERE `id` = ?", "begin", "commit"]
    );
}

#[tokio::test]
async fn statement_on_tx_closes_when_tx_finishes() {
    let (pool, state) = quiet_pool();

    let tx = pool.begin_tx().await.unwrap();
    let stmt = qb::delete_from("dml_people")
        .where_(Cond::eq_placeholder("id"))
        .prepare(&tx)
        .await
        .unwrap();
    stmt.execute(&Args::new().int(1)).await.unwrap();
    assert!(!stmt.is_closed().await);
    tx.commit().await.unwrap();

    let err = stmt.execute(&Args::new().int(2)).await.unwrap_err();
    assert!(err.is_already_closed());
    assert_eq!(
        state.calls(),
        vec![
            "begin",
            "prepare DELETE FROM `dml_people` WHERE `id` = ?",
            "stmt exec [1]",
            "commit",
        ]
    );
}

#[tokio::test]
async fn statement_logs_arg_len_not_sql() {
    let (pool, _state, sink) = logged_pool();

    let stmt = pool
        .insert_into("dml_people")
        .add_columns(["name", "email"])
        .prepare(&pool)
        .await
        .unwrap();
    stmt.execute(&Args::new().text("A").text("a@example.com"))
        .await
        .unwrap();
    stmt.close().await.unwrap();

    assert_eq!(
        sink.lines(),
        vec![
            r#"DEBUG Prepare conn_pool_id: "UNIQ00" insert_id: "UNIQ04" table: "dml_people" sql: "INSERT /*ID:UNIQ04*/ INTO `dml_people` (`name`,`email`) VALUES (?,?)""#,
            r#"DEBUG Exec conn_pool_id: "UNIQ00" insert_id: "UNIQ04" table: "dml_people" arg_len: 2"#,
            r#"DEBUG Close conn_pool_id: "UNIQ00" insert_id: "UNIQ04" table: "dml_people" arg_len: 0"#,
        ]
    );
}
