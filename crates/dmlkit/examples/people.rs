//! A short tour over an in-memory driver that prints every call it receives.
//!
//! ```text
//! cargo run -p dmlkit --example people
//! ```

use dmlkit::{
    Args, ColumnMap, ColumnMapper, Cond, ConnPool, Connection, Connector, DmlResult, DriverError,
    DriverStatement, ExecResult, Executor, LogRecord, LogSink, Logger, MapMode, PoolConfig,
    QueryBuilder, Rows, Value, qb,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out auto-increment ids and answers every query with the same two rows.
#[derive(Debug, Clone, Default)]
struct EchoConnector {
    next_id: Arc<AtomicU64>,
}

#[derive(Debug)]
struct EchoConnection {
    next_id: Arc<AtomicU64>,
}

#[derive(Debug)]
struct EchoStatement {
    sql: String,
    next_id: Arc<AtomicU64>,
}

fn people_rows() -> Rows {
    Rows::new(
        vec!["id".into(), "name".into(), "email".into()],
        vec![
            vec![Value::Int(1), Value::Text("Gopher".into()), Value::Null],
            vec![
                Value::Int(2),
                Value::Text("Ferris".into()),
                Value::Text("ferris@example.com".into()),
            ],
        ],
    )
}

fn exec_result(sql: &str, next_id: &AtomicU64) -> ExecResult {
    let last_insert_id = if sql.starts_with("INSERT") {
        next_id.fetch_add(1, Ordering::SeqCst) + 1
    } else {
        0
    };
    ExecResult {
        rows_affected: 1,
        last_insert_id,
    }
}

impl Connector for EchoConnector {
    type Connection = EchoConnection;

    async fn connect(&self) -> Result<EchoConnection, DriverError> {
        println!("driver: connect");
        Ok(EchoConnection {
            next_id: self.next_id.clone(),
        })
    }
}

impl Connection for EchoConnection {
    type Statement = EchoStatement;

    async fn prepare(&mut self, sql: &str) -> Result<EchoStatement, DriverError> {
        println!("driver: prepare {sql}");
        Ok(EchoStatement {
            sql: sql.to_string(),
            next_id: self.next_id.clone(),
        })
    }

    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult, DriverError> {
        println!("driver: exec {sql} {args:?}");
        Ok(exec_result(sql, &self.next_id))
    }

    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<Rows, DriverError> {
        println!("driver: query {sql} {args:?}");
        Ok(people_rows())
    }

    async fn begin(&mut self) -> Result<(), DriverError> {
        println!("driver: begin");
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        println!("driver: commit");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        println!("driver: rollback");
        Ok(())
    }
}

impl DriverStatement for EchoStatement {
    async fn execute(&mut self, args: &[Value]) -> Result<ExecResult, DriverError> {
        println!("driver: stmt exec {args:?}");
        Ok(exec_result(&self.sql, &self.next_id))
    }

    async fn query(&mut self, args: &[Value]) -> Result<Rows, DriverError> {
        println!("driver: stmt query {args:?}");
        Ok(people_rows())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        println!("driver: stmt close");
        Ok(())
    }
}

struct StdoutSink;

impl LogSink for StdoutSink {
    fn log(&self, record: &LogRecord) {
        println!("log:    {record}");
    }
}

#[derive(Debug, Default)]
struct Person {
    id: i64,
    name: String,
    email: Option<String>,
}

impl ColumnMapper for Person {
    fn map_columns(&mut self, cm: &mut ColumnMap<'_>) -> DmlResult<()> {
        if cm.mode() == MapMode::ReadAll {
            cm.int(&mut self.id)?
                .text(&mut self.name)?
                .field(&mut self.email)?;
            return Ok(());
        }
        while cm.next() {
            match cm.column() {
                "id" => cm.int(&mut self.id)?,
                "name" => cm.text(&mut self.name)?,
                "email" => cm.field(&mut self.email)?,
                other => return Err(cm.unknown_column(other, "Person")),
            };
        }
        Ok(())
    }

    fn assign_last_insert_id(&mut self, id: u64) {
        self.id = id as i64;
    }
}

#[derive(Debug, Default)]
struct People(Vec<Person>);

impl ColumnMapper for People {
    fn map_columns(&mut self, cm: &mut ColumnMap<'_>) -> DmlResult<()> {
        match cm.mode() {
            MapMode::Scan => {
                let mut person = Person::default();
                person.map_columns(cm)?;
                self.0.push(person);
                Ok(())
            }
            _ => Err(cm.unsupported("People")),
        }
    }
}

#[tokio::main]
async fn main() -> DmlResult<()> {
    let pool = ConnPool::with_logger(
        EchoConnector::default(),
        PoolConfig::new().with_max_size(2),
        Logger::new(StdoutSink),
    )?;

    let mut gopher = Person {
        name: "Gopher".into(),
        ..Person::default()
    };
    pool.insert_into("dml_people")
        .add_columns(["name", "email"])
        .add_record(&mut gopher)
        .exec(&pool)
        .await?;
    println!("inserted {gopher:?}");

    let mut people = People::default();
    pool.select_from("dml_people")
        .columns(["id", "name", "email"])
        .where_(Cond::like("name", "%er%"))
        .order_by("id")
        .interpolate()
        .load(&pool, &mut people)
        .await?;
    println!("loaded {} people: {:?}", people.0.len(), people.0);

    pool.transaction(async |tx| {
        tx.update("dml_people")
            .set("email", "gopher@example.com")
            .eq("id", gopher.id)
            .exec(tx)
            .await?;
        tx.delete_from("dml_people").eq("id", 2).exec(tx).await?;
        Ok(())
    })
    .await?;

    let stmt = qb::insert_into("dml_people")
        .add_columns(["name", "email"])
        .prepare(&pool)
        .await?;
    for name in ["Duke", "Tux"] {
        let res = stmt.execute(&Args::new().text(name).null()).await?;
        println!("prepared insert of {name} got id {}", res.last_insert_id);
    }
    stmt.close().await?;

    let (sql, _) = qb::update("dml_people")
        .set("name", "O'Brien")
        .eq("id", 7)
        .interpolate()
        .to_sql()?;
    println!("rendered: {sql}");
    Ok(())
}
