//! SQL 语句构建
//!
//! 根据运行时传入的表名和有序字段映射生成带命名参数（`:col`）的 SQL，
//! 执行前再由 [`Statement::render`] 转换成具体驱动的占位符。
//! 值永远通过参数绑定，表名 / 列名只做合法性校验，不会被当作数据。

use crate::database::DbDriver;
use crate::error::{CrudError, Result};
use crate::utils::validate_identifier;
use crate::value::{Fields, Value};

/// update 中条件参数的前缀，避免与 SET 中同名列的参数冲突
pub const WHERE_PREFIX: &str = "where_";

/// 一次性的 SQL 文本 + 参数列表
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<(String, Value)>,
}

impl Statement {
    /// 命名参数形式的 SQL
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// 按占位符出现顺序排列的 (参数名, 值)
    pub fn params(&self) -> &[(String, Value)] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.params.iter().map(|(_, v)| v)
    }

    /// 实际需要绑定的值（NULL 已在 [`Statement::render`] 中内联）
    pub fn bound_values(&self) -> impl Iterator<Item = &Value> {
        self.values().filter(|v| !v.is_null())
    }

    /// 把 `:name` 占位符转换为驱动的位置占位符
    ///
    /// MySQL / SQLite: `?`，PostgreSQL: `$1`, `$2`, ...
    /// 值为 NULL 的参数直接写成 `NULL` 关键字：PostgreSQL 会给类型化的空值
    /// 推断出 TEXT，写入整数列时报错
    pub fn render(&self, driver: DbDriver) -> String {
        let mut result = String::with_capacity(self.sql.len());
        let mut index = 0;
        let mut position = 0;
        let mut chars = self.sql.chars().peekable();
        while let Some(ch) = chars.next() {
            let starts_name = ch == ':'
                && chars
                    .peek()
                    .is_some_and(|c| c.is_ascii_alphabetic() || *c == '_');
            if !starts_name {
                result.push(ch);
                continue;
            }
            while chars
                .peek()
                .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_')
            {
                chars.next();
            }
            match self.params.get(index) {
                Some((_, Value::Null)) => result.push_str("NULL"),
                _ => {
                    result.push_str(&driver.placeholder(position));
                    position += 1;
                }
            }
            index += 1;
        }
        debug_assert_eq!(index, self.params.len());
        result
    }
}

/// SET 子句：`c1 = :c1, c2 = :c2`
fn assignment_list(data: &Fields, params: &mut Vec<(String, Value)>) -> Result<String> {
    let mut parts = Vec::with_capacity(data.len());
    for (column, value) in data.iter() {
        validate_identifier(column)?;
        parts.push(format!("{} = :{}", column, column));
        params.push((column.to_string(), value.clone()));
    }
    Ok(parts.join(", "))
}

/// WHERE 子句：`c1 = :c1 AND c2 IS NULL`
///
/// `col = NULL` 永远不成立，NULL 条件改写为 `IS NULL` 且不占用参数
fn filter_list(conditions: &Fields, prefix: &str, params: &mut Vec<(String, Value)>) -> Result<String> {
    let mut parts = Vec::with_capacity(conditions.len());
    for (column, value) in conditions.iter() {
        validate_identifier(column)?;
        if value.is_null() {
            parts.push(format!("{} IS NULL", column));
            continue;
        }
        let name = format!("{}{}", prefix, column);
        parts.push(format!("{} = :{}", column, name));
        params.push((name, value.clone()));
    }
    Ok(parts.join(" AND "))
}

/// `SELECT * FROM <table> [WHERE ...]`，条件为空时全表查询
pub fn select(table: &str, conditions: &Fields) -> Result<Statement> {
    let table = validate_identifier(table)?;
    let mut params = Vec::with_capacity(conditions.len());
    let mut sql = format!("SELECT * FROM {}", table);
    if !conditions.is_empty() {
        let filters = filter_list(conditions, "", &mut params)?;
        sql.push_str(" WHERE ");
        sql.push_str(&filters);
    }
    Ok(Statement { sql, params })
}

/// `INSERT INTO <table> (c1, ...) VALUES (:c1, ...)`
pub fn insert(table: &str, data: &Fields) -> Result<Statement> {
    let table = validate_identifier(table)?;
    if data.is_empty() {
        return Err(CrudError::EmptyData {
            operation: "create",
            table: table.to_string(),
        });
    }

    let mut columns = Vec::with_capacity(data.len());
    let mut placeholders = Vec::with_capacity(data.len());
    let mut params = Vec::with_capacity(data.len());
    for (column, value) in data.iter() {
        validate_identifier(column)?;
        columns.push(column);
        placeholders.push(format!(":{}", column));
        params.push((column.to_string(), value.clone()));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    );
    Ok(Statement { sql, params })
}

fn update_set(table: &str, data: &Fields, params: &mut Vec<(String, Value)>) -> Result<String> {
    if data.is_empty() {
        return Err(CrudError::EmptyData {
            operation: "update",
            table: table.to_string(),
        });
    }
    let updates = assignment_list(data, params)?;
    Ok(format!("UPDATE {} SET {}", table, updates))
}

/// `UPDATE <table> SET c = :c, ... WHERE k = :where_k AND ...`
///
/// 空条件直接返回 [`CrudError::EmptyConditions`]，不会生成不带谓词的 WHERE；
/// 确实需要全表更新时使用 [`update_all`]
pub fn update(table: &str, data: &Fields, conditions: &Fields) -> Result<Statement> {
    let table = validate_identifier(table)?;
    if conditions.is_empty() {
        return Err(CrudError::EmptyConditions {
            operation: "update",
            table: table.to_string(),
        });
    }
    let mut params = Vec::with_capacity(data.len() + conditions.len());
    let mut sql = update_set(table, data, &mut params)?;
    let filters = filter_list(conditions, WHERE_PREFIX, &mut params)?;
    sql.push_str(" WHERE ");
    sql.push_str(&filters);
    Ok(Statement { sql, params })
}

/// 显式的全表更新：`UPDATE <table> SET ...`
pub fn update_all(table: &str, data: &Fields) -> Result<Statement> {
    let table = validate_identifier(table)?;
    let mut params = Vec::with_capacity(data.len());
    let sql = update_set(table, data, &mut params)?;
    Ok(Statement { sql, params })
}

/// `DELETE FROM <table> WHERE c1 = :c1 AND ...`，空条件被拒绝
pub fn delete(table: &str, conditions: &Fields) -> Result<Statement> {
    let table = validate_identifier(table)?;
    if conditions.is_empty() {
        return Err(CrudError::EmptyConditions {
            operation: "delete",
            table: table.to_string(),
        });
    }
    let mut params = Vec::with_capacity(conditions.len());
    let filters = filter_list(conditions, "", &mut params)?;
    let sql = format!("DELETE FROM {} WHERE {}", table, filters);
    Ok(Statement { sql, params })
}

/// 显式的全表删除：`DELETE FROM <table>`
pub fn delete_all(table: &str) -> Result<Statement> {
    let table = validate_identifier(table)?;
    Ok(Statement {
        sql: format!("DELETE FROM {}", table),
        params: Vec::new(),
    })
}
