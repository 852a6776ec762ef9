#![cfg(feature = "mysql")]

// Integration tests require a real MySQL database
// Run with: DATABASE_URL=mysql://root@localhost/DB_TEST cargo test -p dyncrud -- --ignored

use dyncrud::{fields, DbConfig, DbDriver, DynamicCrud, Value};

async fn setup(table: &str) -> DynamicCrud {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let config = DbConfig::from_url(url).expect("unsupported DATABASE_URL");
    assert_eq!(config.driver, DbDriver::MySql);

    let crud = DynamicCrud::connect(&config).await.expect("connection failed");
    let db = crud.database();
    db.execute(&format!("DROP TABLE IF EXISTS {}", table))
        .await
        .unwrap();
    db.execute(&format!(
        "CREATE TABLE {} (
            id INT AUTO_INCREMENT PRIMARY KEY,
            name VARCHAR(100) NOT NULL,
            rating INT,
            salary DECIMAL(10, 2),
            active BOOLEAN,
            signed_at DATETIME
        ) CHARACTER SET utf8mb4",
        table
    ))
    .await
    .unwrap();
    crud
}

#[tokio::test]
#[ignore = "requires database"]
async fn mysql_crud_cycle() {
    let crud = setup("dyncrud_cycle").await;
    let data = fields! {
        "name" => "O'Brien",
        "rating" => 99,
        "salary" => "1250.50",
        "active" => true,
        "signed_at" => "2024-05-01 12:30:00",
    };
    crud.create("dyncrud_cycle", &data).await.unwrap();

    let rows = crud
        .read("dyncrud_cycle", &fields! { "name" => "O'Brien" })
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["rating"], Value::Int(99));
    assert_eq!(rows[0]["salary"], Value::Text("1250.50".to_string()));
    assert_eq!(rows[0]["active"], Value::Bool(true));
    assert_eq!(rows[0]["signed_at"], Value::Text("2024-05-01 12:30:00".to_string()));

    let affected = crud
        .update(
            "dyncrud_cycle",
            &fields! { "rating" => 50 },
            &fields! { "name" => "O'Brien" },
        )
        .await
        .unwrap();
    assert_eq!(affected, 1);

    assert_eq!(
        crud.delete("dyncrud_cycle", &fields! { "rating" => 50 })
            .await
            .unwrap(),
        1
    );
    assert!(crud.read_all("dyncrud_cycle").await.unwrap().is_empty());
}
