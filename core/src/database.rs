//! 数据库连接
//!
//! [`Database`] 只持有一条连接，在构造时建立，之后所有 CRUD 调用共用。
//! 连接放在 `tokio::sync::Mutex` 里，多个任务共享同一个 `Arc<Database>` 时语句按顺序执行。

use crate::config::DbConfig;
use crate::error::{CrudError, Result};
use crate::statement::Statement;
use crate::value::{Record, Value};
use serde::{Deserialize, Serialize};
use sqlx::Connection as _;
use std::fmt;
use std::str::FromStr;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbDriver {
    #[default]
    MySql,
    Postgres,
    Sqlite,
}

impl DbDriver {
    pub fn from_url(url: &str) -> Result<Self> {
        if url.starts_with("mysql://") || url.starts_with("mariadb://") {
            Ok(DbDriver::MySql)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(DbDriver::Postgres)
        } else if url.starts_with("sqlite://") || url.starts_with("sqlite:") {
            Ok(DbDriver::Sqlite)
        } else {
            Err(CrudError::UnsupportedDatabase(url.to_string()))
        }
    }

    pub fn placeholder(&self, index: usize) -> String {
        match self {
            DbDriver::MySql | DbDriver::Sqlite => "?".to_string(),
            DbDriver::Postgres => format!("${}", index + 1),
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            DbDriver::MySql => 3306,
            DbDriver::Postgres => 5432,
            DbDriver::Sqlite => 0,
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            DbDriver::MySql => "mysql",
            DbDriver::Postgres => "postgres",
            DbDriver::Sqlite => "sqlite",
        }
    }
}

impl FromStr for DbDriver {
    type Err = CrudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DbDriver::MySql),
            "postgres" | "postgresql" | "pg" => Ok(DbDriver::Postgres),
            "sqlite" => Ok(DbDriver::Sqlite),
            other => Err(CrudError::UnsupportedDatabase(other.to_string())),
        }
    }
}

impl fmt::Display for DbDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// 将 Value 依次绑定到 `sqlx::query`；NULL 已由 render 内联，不再绑定
macro_rules! bind_values {
    ($db:ty, $sql:expr, $values:expr) => {{
        let mut query = sqlx::query::<$db>($sql);
        for value in $values {
            query = match value {
                Value::Null => continue,
                Value::Bool(b) => query.bind(*b),
                Value::Int(i) => query.bind(*i),
                Value::Float(f) => query.bind(*f),
                Value::Text(s) => query.bind(s.clone()),
            };
        }
        query
    }};
}

/// 在 url 解析出的连接选项上叠加显式设置的字段
#[allow(unused_macros)]
macro_rules! apply_overrides {
    ($options:expr, $config:expr, $($field:ident),+) => {{
        let mut options = $options;
        $(
            if let Some(value) = $config.$field.as_deref() {
                options = options.$field(value);
            }
        )+
        if let Some(port) = $config.port {
            options = options.port(port);
        }
        options
    }};
}

/// 共享的底层连接
pub enum Connection {
    #[cfg(feature = "mysql")]
    MySql(sqlx::MySqlConnection),
    #[cfg(feature = "postgres")]
    Postgres(sqlx::PgConnection),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlx::SqliteConnection),
}

impl Connection {
    /// 按配置建立一条连接
    ///
    /// 设置了 url 时以 url 为基础，再叠加显式设置的字段
    pub async fn open(config: &DbConfig) -> Result<Self> {
        config.validate()?;
        match config.driver {
            #[cfg(feature = "mysql")]
            DbDriver::MySql => {
                use sqlx::mysql::MySqlConnectOptions;
                let options = match &config.url {
                    Some(url) => {
                        let options =
                            MySqlConnectOptions::from_str(url).map_err(CrudError::Connection)?;
                        apply_overrides!(options, config, host, database, username, password, charset)
                    }
                    None => MySqlConnectOptions::new()
                        .host(config.host())
                        .port(config.port_or_default())
                        .database(config.database())
                        .username(config.username())
                        .password(config.password())
                        .charset(config.charset()),
                };
                let conn = sqlx::MySqlConnection::connect_with(&options)
                    .await
                    .map_err(CrudError::Connection)?;
                Ok(Connection::MySql(conn))
            }
            #[cfg(feature = "postgres")]
            DbDriver::Postgres => {
                use sqlx::postgres::PgConnectOptions;
                // sqlx 固定使用 UTF8 客户端编码，charset 不适用
                let options = match &config.url {
                    Some(url) => {
                        let options =
                            PgConnectOptions::from_str(url).map_err(CrudError::Connection)?;
                        apply_overrides!(options, config, host, database, username, password)
                    }
                    None => PgConnectOptions::new()
                        .host(config.host())
                        .port(config.port_or_default())
                        .database(config.database())
                        .username(config.username())
                        .password(config.password()),
                };
                let conn = sqlx::PgConnection::connect_with(&options)
                    .await
                    .map_err(CrudError::Connection)?;
                Ok(Connection::Postgres(conn))
            }
            #[cfg(feature = "sqlite")]
            DbDriver::Sqlite => {
                use sqlx::sqlite::SqliteConnectOptions;
                // 显式的 database（文件路径）整体取代 url
                let options = match (&config.url, config.database.as_deref()) {
                    (Some(url), None) => {
                        SqliteConnectOptions::from_str(url).map_err(CrudError::Connection)?
                    }
                    _ if config.database() == ":memory:" => {
                        SqliteConnectOptions::from_str("sqlite::memory:")
                            .map_err(CrudError::Connection)?
                    }
                    _ => SqliteConnectOptions::new()
                        .filename(config.database())
                        .create_if_missing(true),
                };
                let conn = sqlx::SqliteConnection::connect_with(&options)
                    .await
                    .map_err(CrudError::Connection)?;
                Ok(Connection::Sqlite(conn))
            }
            #[allow(unreachable_patterns)]
            _ => Err(CrudError::UnsupportedDatabase(format!(
                "driver {} is not enabled in this build",
                config.driver
            ))),
        }
    }

    pub fn driver(&self) -> DbDriver {
        match self {
            #[cfg(feature = "mysql")]
            Connection::MySql(_) => DbDriver::MySql,
            #[cfg(feature = "postgres")]
            Connection::Postgres(_) => DbDriver::Postgres,
            #[cfg(feature = "sqlite")]
            Connection::Sqlite(_) => DbDriver::Sqlite,
        }
    }

    /// 执行 INSERT / UPDATE / DELETE，返回影响行数
    pub async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        let sql = statement.render(self.driver());
        debug!(sql = %statement.sql(), params = statement.params().len(), "execute statement");
        let result = match self {
            #[cfg(feature = "mysql")]
            Connection::MySql(conn) => bind_values!(sqlx::MySql, &sql, statement.bound_values())
                .execute(&mut *conn)
                .await
                .map(|r| r.rows_affected()),
            #[cfg(feature = "postgres")]
            Connection::Postgres(conn) => bind_values!(sqlx::Postgres, &sql, statement.bound_values())
                .execute(&mut *conn)
                .await
                .map(|r| r.rows_affected()),
            #[cfg(feature = "sqlite")]
            Connection::Sqlite(conn) => bind_values!(sqlx::Sqlite, &sql, statement.bound_values())
                .execute(&mut *conn)
                .await
                .map(|r| r.rows_affected()),
        };
        result.map_err(|e| statement_failed(statement.sql(), e))
    }

    /// 执行 SELECT，每一行按列名解码为 Record
    pub async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<Record>> {
        let sql = statement.render(self.driver());
        debug!(sql = %statement.sql(), params = statement.params().len(), "fetch statement");
        let records = match self {
            #[cfg(feature = "mysql")]
            Connection::MySql(conn) => bind_values!(sqlx::MySql, &sql, statement.bound_values())
                .fetch_all(&mut *conn)
                .await
                .map_err(|e| statement_failed(statement.sql(), e))?
                .iter()
                .map(crate::decode::mysql_row)
                .collect::<Result<Vec<_>>>()?,
            #[cfg(feature = "postgres")]
            Connection::Postgres(conn) => bind_values!(sqlx::Postgres, &sql, statement.bound_values())
                .fetch_all(&mut *conn)
                .await
                .map_err(|e| statement_failed(statement.sql(), e))?
                .iter()
                .map(crate::decode::postgres_row)
                .collect::<Result<Vec<_>>>()?,
            #[cfg(feature = "sqlite")]
            Connection::Sqlite(conn) => bind_values!(sqlx::Sqlite, &sql, statement.bound_values())
                .fetch_all(&mut *conn)
                .await
                .map_err(|e| statement_failed(statement.sql(), e))?
                .iter()
                .map(crate::decode::sqlite_row)
                .collect::<Result<Vec<_>>>()?,
        };
        debug!(rows = records.len(), "fetched");
        Ok(records)
    }

    /// 执行不带参数的原始 SQL（建表等）
    pub async fn execute_raw(&mut self, sql: &str) -> Result<u64> {
        debug!(sql, "execute raw sql");
        let result = match self {
            #[cfg(feature = "mysql")]
            Connection::MySql(conn) => sqlx::query::<sqlx::MySql>(sql)
                .execute(&mut *conn)
                .await
                .map(|r| r.rows_affected()),
            #[cfg(feature = "postgres")]
            Connection::Postgres(conn) => sqlx::query::<sqlx::Postgres>(sql)
                .execute(&mut *conn)
                .await
                .map(|r| r.rows_affected()),
            #[cfg(feature = "sqlite")]
            Connection::Sqlite(conn) => sqlx::query::<sqlx::Sqlite>(sql)
                .execute(&mut *conn)
                .await
                .map(|r| r.rows_affected()),
        };
        result.map_err(|e| statement_failed(sql, e))
    }

    pub async fn ping(&mut self) -> Result<()> {
        let result = match self {
            #[cfg(feature = "mysql")]
            Connection::MySql(conn) => conn.ping().await,
            #[cfg(feature = "postgres")]
            Connection::Postgres(conn) => conn.ping().await,
            #[cfg(feature = "sqlite")]
            Connection::Sqlite(conn) => conn.ping().await,
        };
        result.map_err(CrudError::Connection)
    }

    pub async fn close(self) -> Result<()> {
        let result = match self {
            #[cfg(feature = "mysql")]
            Connection::MySql(conn) => conn.close().await,
            #[cfg(feature = "postgres")]
            Connection::Postgres(conn) => conn.close().await,
            #[cfg(feature = "sqlite")]
            Connection::Sqlite(conn) => conn.close().await,
        };
        result.map_err(CrudError::Connection)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Connection").field(&self.driver()).finish()
    }
}

fn statement_failed(sql: &str, e: sqlx::Error) -> CrudError {
    warn!(error = %e, sql, "statement failed");
    CrudError::Statement(e)
}

/// 持有唯一一条共享连接的数据库句柄
pub struct Database {
    driver: DbDriver,
    conn: Mutex<Connection>,
}

impl Database {
    /// 建立连接；失败时返回 [`CrudError::Connection`]，由调用方处理
    pub async fn connect(config: &DbConfig) -> Result<Self> {
        match Connection::open(config).await {
            Ok(conn) => {
                info!(target_db = %config, "connected to database");
                Ok(Self::from_connection(conn))
            }
            Err(e) => {
                error!(target_db = %config, error = %e, "failed to connect to database");
                Err(e)
            }
        }
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            driver: conn.driver(),
            conn: Mutex::new(conn),
        }
    }

    pub fn driver(&self) -> DbDriver {
        self.driver
    }

    /// 获取共享连接；持有期间其他调用方等待
    pub async fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    pub async fn execute(&self, sql: &str) -> Result<u64> {
        self.connection().await.execute_raw(sql).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.connection().await.ping().await
    }

    pub async fn close(self) -> Result<()> {
        info!(driver = %self.driver, "closing database connection");
        self.conn.into_inner().close().await
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("driver", &self.driver)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_from_url() {
        assert_eq!(DbDriver::from_url("mysql://root@localhost/DB_TEST").unwrap(), DbDriver::MySql);
        assert_eq!(DbDriver::from_url("mariadb://localhost").unwrap(), DbDriver::MySql);
        assert_eq!(DbDriver::from_url("postgresql://localhost").unwrap(), DbDriver::Postgres);
        assert_eq!(DbDriver::from_url("sqlite::memory:").unwrap(), DbDriver::Sqlite);
        assert!(DbDriver::from_url("mongodb://localhost").is_err());
    }

    #[test]
    fn test_driver_from_str() {
        assert_eq!("MySQL".parse::<DbDriver>().unwrap(), DbDriver::MySql);
        assert_eq!("pg".parse::<DbDriver>().unwrap(), DbDriver::Postgres);
        assert!("oracle".parse::<DbDriver>().is_err());
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(DbDriver::MySql.placeholder(3), "?");
        assert_eq!(DbDriver::Sqlite.placeholder(0), "?");
        assert_eq!(DbDriver::Postgres.placeholder(0), "$1");
        assert_eq!(DbDriver::Postgres.placeholder(2), "$3");
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_connect_sqlite_memory() {
        let db = Database::connect(&DbConfig::sqlite_memory()).await.unwrap();
        assert_eq!(db.driver(), DbDriver::Sqlite);
        db.ping().await.unwrap();
        db.close().await.unwrap();
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_explicit_database_overrides_url() {
        let path = std::env::temp_dir().join(format!("dyncrud_override_{}.db", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let mut config = DbConfig::from_url("sqlite::memory:").unwrap();
        config.database = Some(path.to_string_lossy().into_owned());
        let db = Database::connect(&config).await.unwrap();
        db.execute("CREATE TABLE players (id INTEGER PRIMARY KEY)").await.unwrap();
        db.close().await.unwrap();

        // 表落在显式指定的文件里，而不是 url 的内存库
        let reopened = Database::connect(&DbConfig {
            driver: DbDriver::Sqlite,
            database: Some(path.to_string_lossy().into_owned()),
            ..DbConfig::default()
        })
        .await
        .unwrap();
        assert_eq!(reopened.execute("DELETE FROM players").await.unwrap(), 0);
        reopened.close().await.unwrap();
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_driver_mismatch_is_rejected() {
        let mut config = DbConfig::from_url("sqlite::memory:").unwrap();
        config.driver = DbDriver::MySql;
        let err = Database::connect(&config).await.unwrap_err();
        assert!(matches!(err, CrudError::Config(_)));
    }

    #[cfg(feature = "mysql")]
    #[tokio::test]
    async fn test_connect_failure_is_returned() {
        let config = DbConfig {
            host: Some("127.0.0.1".to_string()),
            port: Some(1),
            ..DbConfig::default()
        };
        let err = Database::connect(&config).await.unwrap_err();
        assert!(err.is_connection_failure());
    }
}
