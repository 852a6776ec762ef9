use thiserror::Error;

/// 错误大类：连接失败 / 语句失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 无法建立或维持数据库连接
    Connection,
    /// 语句无法构建或执行（SQL 错误、约束冲突、解码失败等）
    Statement,
}

#[derive(Debug, Error)]
pub enum CrudError {
    #[error("Unsupported database URL: {0}")]
    UnsupportedDatabase(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Database connection error: {0}")]
    Connection(#[source] sqlx::Error),
    #[error("Database error: {0}")]
    Statement(#[from] sqlx::Error),
    /// update / delete 不允许空条件，全表操作需显式调用 *_all
    #[error("{operation} on '{table}' requires at least one condition; use {operation}_all to touch every row")]
    EmptyConditions {
        operation: &'static str,
        table: String,
    },
    #[error("{operation} on '{table}' requires at least one field")]
    EmptyData {
        operation: &'static str,
        table: String,
    },
    /// 非法的表名或列名
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("Table not allowed: {0}")]
    TableNotAllowed(String),
    #[error("Cannot decode column '{column}' of type {type_name}")]
    Decode { column: String, type_name: String },
}

impl CrudError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrudError::UnsupportedDatabase(_)
            | CrudError::Config(_)
            | CrudError::Connection(_) => ErrorKind::Connection,
            _ => ErrorKind::Statement,
        }
    }

    pub fn is_connection_failure(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }

    pub fn is_statement_failure(&self) -> bool {
        self.kind() == ErrorKind::Statement
    }
}

pub type Result<T> = std::result::Result<T, CrudError>;
