//! 结果行解码：列名 → Value
//!
//! 按驱动报告的列类型名选择 Rust 类型解码，相当于关联数组形式的 fetch。
//! DECIMAL / NUMERIC 与日期时间类型保留为文本，避免精度或时区信息丢失。

use crate::error::{CrudError, Result};
use crate::value::{Record, Value};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{Column, ColumnIndex, Row, TypeInfo, ValueRef};

/// 依次尝试多个类型，返回第一个解码成功的结果
macro_rules! try_decode {
    ($row:expr, $index:expr, $($ty:ty => $map:expr),+ $(,)?) => {{
        let mut decoded: Option<Value> = None;
        $(
            if decoded.is_none() {
                if let Ok(v) = $row.try_get::<$ty, _>($index) {
                    decoded = Some(($map)(v));
                }
            }
        )+
        decoded
    }};
}

fn decode_columns<R, F>(row: &R, decode: F) -> Result<Record>
where
    R: Row,
    usize: ColumnIndex<R>,
    F: Fn(&R, usize, &str) -> Option<Value>,
{
    let mut record = Record::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let (is_null, type_name) = {
            let raw = row.try_get_raw(index)?;
            (raw.is_null(), raw.type_info().name().to_string())
        };
        let value = if is_null {
            Value::Null
        } else {
            decode(row, index, &type_name).ok_or_else(|| CrudError::Decode {
                column: column.name().to_string(),
                type_name: type_name.clone(),
            })?
        };
        record.insert(column.name(), value);
    }
    Ok(record)
}

fn unsigned(v: u64) -> Value {
    i64::try_from(v)
        .map(Value::Int)
        .unwrap_or_else(|_| Value::Text(v.to_string()))
}

fn bytes(v: Vec<u8>) -> Value {
    Value::Text(String::from_utf8_lossy(&v).into_owned())
}

fn text<T: ToString>(v: T) -> Value {
    Value::Text(v.to_string())
}

#[cfg(feature = "mysql")]
pub(crate) fn mysql_row(row: &sqlx::mysql::MySqlRow) -> Result<Record> {
    decode_columns(row, |row, index, type_name| match type_name {
        "BOOLEAN" => try_decode!(row, index, bool => Value::Bool, i64 => Value::Int),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            try_decode!(row, index, i64 => Value::Int, u64 => unsigned)
        }
        name if name.ends_with("UNSIGNED") => {
            try_decode!(row, index, u64 => unsigned, i64 => Value::Int)
        }
        "FLOAT" => try_decode!(row, index, f32 => |v: f32| Value::Float(v as f64), f64 => Value::Float),
        "DOUBLE" => try_decode!(row, index, f64 => Value::Float),
        "DECIMAL" => try_decode!(row, index, BigDecimal => text::<BigDecimal>),
        "DATETIME" => try_decode!(row, index, NaiveDateTime => text::<NaiveDateTime>),
        "TIMESTAMP" => try_decode!(
            row, index,
            NaiveDateTime => text::<NaiveDateTime>,
            DateTime<Utc> => |v: DateTime<Utc>| Value::Text(v.naive_utc().to_string()),
        ),
        "DATE" => try_decode!(row, index, NaiveDate => text::<NaiveDate>),
        "TIME" => try_decode!(row, index, NaiveTime => text::<NaiveTime>, String => Value::Text),
        _ => try_decode!(row, index, String => Value::Text, Vec<u8> => bytes),
    })
}

#[cfg(feature = "postgres")]
pub(crate) fn postgres_row(row: &sqlx::postgres::PgRow) -> Result<Record> {
    decode_columns(row, |row, index, type_name| match type_name {
        "BOOL" => try_decode!(row, index, bool => Value::Bool),
        "INT2" => try_decode!(row, index, i16 => |v: i16| Value::Int(v as i64)),
        "INT4" => try_decode!(row, index, i32 => |v: i32| Value::Int(v as i64)),
        "INT8" => try_decode!(row, index, i64 => Value::Int),
        "FLOAT4" => try_decode!(row, index, f32 => |v: f32| Value::Float(v as f64)),
        "FLOAT8" => try_decode!(row, index, f64 => Value::Float),
        "NUMERIC" => try_decode!(row, index, BigDecimal => text::<BigDecimal>),
        "TIMESTAMP" => try_decode!(row, index, NaiveDateTime => text::<NaiveDateTime>),
        "TIMESTAMPTZ" => try_decode!(row, index, DateTime<Utc> => text::<DateTime<Utc>>),
        "DATE" => try_decode!(row, index, NaiveDate => text::<NaiveDate>),
        "TIME" => try_decode!(row, index, NaiveTime => text::<NaiveTime>),
        "BYTEA" => try_decode!(row, index, Vec<u8> => bytes),
        _ => try_decode!(row, index, String => Value::Text),
    })
}

#[cfg(feature = "sqlite")]
pub(crate) fn sqlite_row(row: &sqlx::sqlite::SqliteRow) -> Result<Record> {
    // SQLite 报告的是值的存储类型，而非列声明类型
    decode_columns(row, |row, index, type_name| match type_name {
        "INTEGER" => try_decode!(row, index, i64 => Value::Int),
        "BOOLEAN" => try_decode!(row, index, bool => Value::Bool, i64 => Value::Int),
        "REAL" | "NUMERIC" => try_decode!(row, index, f64 => Value::Float, i64 => Value::Int),
        "BLOB" => try_decode!(row, index, Vec<u8> => bytes),
        _ => try_decode!(row, index, String => Value::Text),
    })
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use sqlx::Connection;

    async fn fetch_one(sql: &str) -> Record {
        let mut conn = sqlx::SqliteConnection::connect("sqlite::memory:").await.unwrap();
        let row = sqlx::query(sql).fetch_one(&mut conn).await.unwrap();
        sqlite_row(&row).unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_scalars() {
        let record =
            fetch_one("SELECT 1 AS id, 'O''Brien' AS name, 2.5 AS score, NULL AS bonus").await;
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["id", "name", "score", "bonus"]);
        assert_eq!(record["id"], Value::Int(1));
        assert_eq!(record["name"], Value::Text("O'Brien".to_string()));
        assert_eq!(record["score"], Value::Float(2.5));
        assert_eq!(record["bonus"], Value::Null);
    }

    #[tokio::test]
    async fn test_sqlite_blob_is_lossy_text() {
        let record = fetch_one("SELECT X'68690A' AS raw").await;
        assert_eq!(record["raw"], Value::Text("hi\n".to_string()));
    }

    #[test]
    fn test_unsigned_overflow_kept_as_text() {
        assert_eq!(unsigned(42), Value::Int(42));
        assert_eq!(unsigned(u64::MAX), Value::Text(u64::MAX.to_string()));
    }
}
