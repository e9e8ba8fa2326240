//! Transaction lifecycle: wrap, commit, rollback and abandoned transactions.

mod common;

use common::{MockConnector, logged_pool, quiet_pool};
use dmlkit::{Args, ConnPool, DmlError, DmlResult, Executor, QueryBuilder, qb};

#[tokio::test]
async fn wrap_commits_on_ok() {
    let (pool, state) = quiet_pool();
    state.set_last_insert_id(11);

    let id = pool
        .transaction(async |tx| {
            let res = qb::insert_into("dml_people")
                .add_columns(["name"])
                .add_values(Args::new().text("Gopher"))
                .exec(tx)
                .await?;
            Ok(res.last_insert_id)
        })
        .await
        .unwrap();

    assert_eq!(id, 11);
    assert_eq!(
        state.calls(),
        vec![
            "begin",
            "exec INSERT INTO `dml_people` (`name`) VALUES (?) ['Gopher']",
            "commit",
        ]
    );
}

#[tokio::test]
async fn wrap_rolls_back_and_returns_original_error() {
    let (pool, state) = quiet_pool();

    let res: DmlResult<()> = pool
        .transaction(async |tx| {
            qb::delete_from("dml_people").eq("id", 1).exec(tx).await?;
            Err(DmlError::validation("business rule violated"))
        })
        .await;

    let err = res.unwrap_err();
    assert!(matches!(&err, DmlError::Validation(msg) if msg == "business rule violated"));
    assert_eq!(
        state.calls(),
        vec![
            "begin",
            "exec DELETE FROM `dml_people` WHERE `id` = ? [1]",
            "rollback",
        ]
    );
}

#[tokio::test]
async fn failed_rollback_reports_both_errors() {
    let (pool, state) = quiet_pool();
    state.fail("rollback");

    let res: DmlResult<()> = pool
        .transaction(async |_tx| Err(DmlError::validation("first")))
        .await;

    match res.unwrap_err() {
        DmlError::Rollback { error, rollback } => {
            assert!(matches!(*error, DmlError::Validation(_)));
            assert_eq!(rollback.to_string(), "rollback transaction: rollback failed");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn failed_begin_skips_the_unit_of_work() {
    let (pool, state) = quiet_pool();
    state.fail("begin");

    let mut ran = false;
    let res = pool
        .transaction(async |_tx| {
            ran = true;
            Ok(())
        })
        .await;

    assert!(!ran);
    assert_eq!(res.unwrap_err().to_string(), "begin transaction: begin failed");
    assert_eq!(state.calls(), vec!["begin"]);
}

#[tokio::test]
async fn transaction_logs_carry_tx_id() {
    let (pool, _state, sink) = logged_pool();

    let tx = pool.begin_tx().await.unwrap();
    assert_eq!(tx.id(), Some("UNIQ04"));
    tx.insert_into("dml_people")
        .add_columns(["name"])
        .add_values(Args::new().text("A"))
        .exec(&tx)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(
        sink.lines(),
        vec![
            r#"DEBUG BeginTx conn_pool_id: "UNIQ00" tx_id: "UNIQ04""#,
            r#"DEBUG Exec conn_pool_id: "UNIQ00" tx_id: "UNIQ04" insert_id: "UNIQ08" table: "dml_people" arg_len: 1"#,
            r#"DEBUG Commit conn_pool_id: "UNIQ00" tx_id: "UNIQ04""#,
        ]
    );
}

#[tokio::test]
async fn conn_transaction_logs_conn_and_tx_ids() {
    let (pool, state, sink) = logged_pool();

    let conn = pool.conn().await.unwrap();
    assert_eq!(conn.id(), Some("UNIQ04"));
    conn.transaction(async |tx| {
        tx.delete_from("dml_people").eq("id", 9).exec(tx).await?;
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(state.calls().last().map(String::as_str), Some("commit"));
    assert_eq!(
        sink.lines(),
        vec![
            r#"DEBUG BeginTx conn_pool_id: "UNIQ00" conn_id: "UNIQ04" tx_id: "UNIQ08""#,
            r#"DEBUG Exec conn_pool_id: "UNIQ00" conn_id: "UNIQ04" tx_id: "UNIQ08" delete_id: "UNIQ12" table: "dml_people" arg_len: 1"#,
            r#"DEBUG Commit conn_pool_id: "UNIQ00" conn_id: "UNIQ04" tx_id: "UNIQ08""#,
        ]
    );
}

#[tokio::test]
async fn dropped_transaction_discards_its_connection() {
    let (pool, state, sink) = logged_pool();

    let tx = pool.begin_tx().await.unwrap();
    drop(tx);

    assert_eq!(state.calls(), vec!["begin"]);
    assert_eq!(
        sink.lines().last().map(String::as_str),
        Some(
            r#"WARN Rollback conn_pool_id: "UNIQ00" tx_id: "UNIQ04" message: "transaction dropped without commit or rollback; connection discarded""#
        )
    );
    assert_eq!(pool.status().size, 0);

    // the next checkout opens a fresh connection
    pool.begin_tx().await.unwrap().rollback().await.unwrap();
    assert_eq!(state.connections(), 2);
}

async fn rename_in_tx(pool: &ConnPool<MockConnector>) -> DmlResult<u64> {
    dmlkit::transaction!(pool, tx, {
        let res = qb::update("dml_people")
            .set("name", "Renamed")
            .eq("id", 5)
            .exec(&tx)
            .await?;
        Ok::<u64, DmlError>(res.rows_affected)
    })
}

#[tokio::test]
async fn transaction_macro_commits() {
    let (pool, state) = quiet_pool();

    assert_eq!(rename_in_tx(&pool).await.unwrap(), 1);
    assert_eq!(
        state.calls(),
        vec![
            "begin",
            "exec UPDATE `dml_people` SET `name`=? WHERE `id` = ? ['Renamed', 5]",
            "commit",
        ]
    );
}

#[tokio::test]
async fn transaction_macro_rolls_back() {
    let (pool, state) = quiet_pool();
    state.fail("exec");

    let err = rename_in_tx(&pool).await.unwrap_err();
    assert!(matches!(err, DmlError::Driver { .. }));
    assert_eq!(state.calls().last().map(String::as_str), Some("rollback"));
}
