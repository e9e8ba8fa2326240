//! Executing inserts and selects through a pool.

mod common;

use common::{People, Person, logged_pool, quiet_pool};
use dmlkit::{Args, Cond, DmlError, Executor, QueryBuilder, Rows, Value, qb};

#[tokio::test]
async fn single_record_receives_last_insert_id() {
    let (pool, state) = quiet_pool();
    state.set_last_insert_id(42);

    let mut gopher = Person::new("Gopher", Some("gopher@example.com"));
    let res = qb::insert_into("dml_people")
        .add_columns(["name", "email"])
        .add_record(&mut gopher)
        .exec(&pool)
        .await
        .unwrap();

    assert_eq!(res.last_insert_id, 42);
    assert_eq!(gopher.id, 42);
    assert_eq!(
        state.calls(),
        vec!["exec INSERT INTO `dml_people` (`name`,`email`) VALUES (?,?) ['Gopher', 'gopher@example.com']"]
    );
}

#[tokio::test]
async fn multiple_records_share_one_statement() {
    let (pool, state) = quiet_pool();
    state.set_last_insert_id(7);

    let mut a = Person::new("A", None);
    let mut b = Person::new("B", Some("b@example.com"));
    qb::insert_into("dml_people")
        .add_columns(["name", "email"])
        .add_record(&mut a)
        .add_record(&mut b)
        .exec(&pool)
        .await
        .unwrap();

    // ids are only assigned back for a single record
    assert_eq!(a.id, 0);
    assert_eq!(b.id, 0);
    assert_eq!(
        state.calls(),
        vec!["exec INSERT INTO `dml_people` (`name`,`email`) VALUES (?,?),(?,?) ['A', NULL, 'B', 'b@example.com']"]
    );
}

#[tokio::test]
async fn interpolated_insert_sends_no_arguments() {
    let (pool, state) = quiet_pool();

    qb::insert_into("dml_people")
        .add_columns(["name", "email"])
        .add_values(Args::new().text("O'Brien").null())
        .interpolate()
        .exec(&pool)
        .await
        .unwrap();

    assert_eq!(
        state.calls(),
        vec!["exec INSERT INTO `dml_people` (`name`,`email`) VALUES ('O''Brien',NULL) []"]
    );
}

#[tokio::test]
async fn pool_builders_carry_statement_ids() {
    let (pool, state, sink) = logged_pool();

    let mut gopher = Person::new("Gopher", None);
    pool.insert_into("dml_people")
        .add_columns(["name", "email"])
        .add_record(&mut gopher)
        .exec(&pool)
        .await
        .unwrap();

    assert_eq!(
        state.calls(),
        vec!["exec INSERT /*ID:UNIQ04*/ INTO `dml_people` (`name`,`email`) VALUES (?,?) ['Gopher', NULL]"]
    );
    assert_eq!(
        sink.lines(),
        vec![r#"DEBUG Exec conn_pool_id: "UNIQ00" insert_id: "UNIQ04" table: "dml_people" arg_len: 2"#]
    );
}

#[tokio::test]
async fn driver_error_carries_statement_context() {
    let (pool, state, sink) = logged_pool();
    state.fail("exec");

    let err = qb::delete_from("dml_people")
        .eq("id", 3)
        .exec(&pool)
        .await
        .unwrap_err();

    assert!(matches!(err, DmlError::Driver { .. }));
    assert_eq!(err.to_string(), "exec delete `dml_people`: exec failed");
    assert_eq!(
        sink.lines(),
        vec![
            r#"WARN Exec conn_pool_id: "UNIQ00" table: "dml_people" arg_len: 1 error: "exec delete `dml_people`: exec failed""#
        ]
    );
}

#[tokio::test]
async fn build_errors_never_reach_the_driver() {
    let (pool, state) = quiet_pool();

    let err = qb::insert_into("dml_people")
        .add_columns(["name", "email"])
        .add_values(Args::new().text("only one"))
        .exec(&pool)
        .await
        .unwrap_err();

    assert!(err.is_mismatch());
    assert!(state.calls().is_empty());
    assert_eq!(state.connections(), 0);
}

#[tokio::test]
async fn load_scans_rows_into_collection() {
    let (pool, state) = quiet_pool();
    state.set_rows(Rows::new(
        vec!["id".into(), "name".into(), "email".into()],
        vec![
            vec![Value::Int(1), Value::Text("A".into()), Value::Null],
            vec![
                Value::Int(2),
                Value::Text("B".into()),
                Value::Text("b@example.com".into()),
            ],
        ],
    ));

    let mut people = People::default();
    let n = qb::select_from("dml_people")
        .columns(["id", "name", "email"])
        .where_(Cond::gt("id", 0))
        .order_by("id")
        .load(&pool, &mut people)
        .await
        .unwrap();

    assert_eq!(n, 2);
    assert_eq!(people.0[0].email, None);
    assert_eq!(people.0[1].email.as_deref(), Some("b@example.com"));
    assert_eq!(
        state.calls(),
        vec!["query SELECT `id`, `name`, `email` FROM `dml_people` WHERE `id` > ? ORDER BY `id` [0]"]
    );
}

#[tokio::test]
async fn raw_sql_runs_with_positional_arguments() {
    let (pool, state) = quiet_pool();

    pool.exec_sql(
        "UPDATE dml_people SET name = ? WHERE id = ?",
        &[Value::from("C"), Value::from(3)],
    )
    .await
    .unwrap();

    assert_eq!(
        state.calls(),
        vec!["exec UPDATE dml_people SET name = ? WHERE id = ? ['C', 3]"]
    );
}
