#![cfg(feature = "postgres")]

// Integration tests require a real PostgreSQL database
// Run with: POSTGRES_DATABASE_URL=postgres://postgres@localhost/league cargo test -p dyncrud -- --ignored

use dyncrud::{fields, DbConfig, DbDriver, DynamicCrud, Value};

async fn setup(table: &str) -> DynamicCrud {
    let url = std::env::var("POSTGRES_DATABASE_URL").expect("POSTGRES_DATABASE_URL required");
    let config = DbConfig::from_url(url).expect("unsupported POSTGRES_DATABASE_URL");
    assert_eq!(config.driver, DbDriver::Postgres);

    let crud = DynamicCrud::connect(&config).await.expect("connection failed");
    let db = crud.database();
    db.execute(&format!("DROP TABLE IF EXISTS {}", table))
        .await
        .unwrap();
    db.execute(&format!(
        "CREATE TABLE {} (
            id SERIAL PRIMARY KEY,
            name VARCHAR(100) NOT NULL,
            rating INT,
            pacing INT
        )",
        table
    ))
    .await
    .unwrap();
    crud
}

#[tokio::test]
#[ignore = "requires database"]
async fn postgres_null_into_integer_columns() {
    let crud = setup("dyncrud_nulls").await;
    let rookie = fields! { "name" => "Rookie", "rating" => Value::Null, "pacing" => 60 };
    crud.create("dyncrud_nulls", &rookie).await.unwrap();

    let rows = crud.read("dyncrud_nulls", &rookie).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["rating"], Value::Null);
    assert_eq!(rows[0]["pacing"], Value::Int(60));

    let affected = crud
        .update(
            "dyncrud_nulls",
            &fields! { "pacing" => Value::Null },
            &fields! { "name" => "Rookie" },
        )
        .await
        .unwrap();
    assert_eq!(affected, 1);

    assert_eq!(
        crud.delete("dyncrud_nulls", &fields! { "pacing" => Value::Null })
            .await
            .unwrap(),
        1
    );
    assert!(crud.read_all("dyncrud_nulls").await.unwrap().is_empty());
}
