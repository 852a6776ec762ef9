//! 数据库连接配置
//!
//! 取代写死在代码里的连接常量：主机、库名、账号、密码和字符集都通过
//! [`DbConfig`] 注入，可以直接构造、从 serde 反序列化，或通过环境变量（含 `.env`）读取。

use crate::database::DbDriver;
use crate::error::{CrudError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_DATABASE: &str = "DB_TEST";
pub const DEFAULT_USERNAME: &str = "root";
pub const DEFAULT_CHARSET: &str = "utf8mb4";

/// 数据库连接配置
///
/// 连接字段为 `None` 时，设置了 `url` 则沿用 url 中的值，否则使用默认常量；
/// 显式设置的字段总是覆盖 url 中的对应部分。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub driver: DbDriver,
    pub host: Option<String>,
    /// 为空时使用驱动默认端口
    pub port: Option<u16>,
    /// 数据库名；SQLite 下为文件路径或 `:memory:`
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// 仅 MySQL 使用
    pub charset: Option<String>,
    /// 完整连接串
    pub url: Option<String>,
    /// 允许访问的表；None 表示不限制
    pub allowed_tables: Option<Vec<String>>,
}

impl DbConfig {
    /// 从连接串创建配置，驱动由 URL 前缀推断
    pub fn from_url(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let driver = DbDriver::from_url(&url)?;
        Ok(Self {
            driver,
            url: Some(url),
            ..Self::default()
        })
    }

    /// 内存 SQLite，主要用于测试和演示
    pub fn sqlite_memory() -> Self {
        Self {
            driver: DbDriver::Sqlite,
            database: Some(":memory:".to_string()),
            ..Self::default()
        }
    }

    /// 加载 `.env` 后从进程环境变量读取配置
    ///
    /// 识别 `DATABASE_URL`、`DB_DRIVER`、`DB_HOST`、`DB_PORT`、`DB_NAME`、
    /// `DB_USER`、`DB_PASSWORD`、`DB_CHARSET`、`DB_ALLOWED_TABLES`（逗号分隔）
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 使用任意 key → value 查找函数构建配置
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("DATABASE_URL").filter(|s| !s.is_empty()) {
            Some(url) => Self::from_url(url)?,
            None => Self::default(),
        };

        if let Some(driver) = lookup("DB_DRIVER") {
            config.driver = driver.parse()?;
        }
        if let Some(port) = lookup("DB_PORT") {
            let port = port
                .parse::<u16>()
                .map_err(|e| CrudError::Config(format!("DB_PORT {:?}: {}", port, e)))?;
            config.port = Some(port);
        }
        config.host = lookup("DB_HOST").or(config.host);
        config.database = lookup("DB_NAME").or(config.database);
        config.username = lookup("DB_USER").or(config.username);
        config.password = lookup("DB_PASSWORD").or(config.password);
        config.charset = lookup("DB_CHARSET").or(config.charset);
        if let Some(tables) = lookup("DB_ALLOWED_TABLES") {
            let tables: Vec<String> = tables
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            config.allowed_tables = Some(tables);
        }

        config.validate()?;
        Ok(config)
    }

    /// url 的协议必须与 driver 一致
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.url {
            let scheme = DbDriver::from_url(url)?;
            if scheme != self.driver {
                return Err(CrudError::Config(format!(
                    "driver {} does not match {} url",
                    self.driver, scheme
                )));
            }
        }
        Ok(())
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or_else(|| self.driver.default_port())
    }

    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or(DEFAULT_DATABASE)
    }

    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(DEFAULT_USERNAME)
    }

    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or("")
    }

    pub fn charset(&self) -> &str {
        self.charset.as_deref().unwrap_or(DEFAULT_CHARSET)
    }
}

/// 不含密码的连接目标，用于日志
impl fmt::Display for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.url.is_some() {
            write!(f, "{} (url)", self.driver.scheme())?;
            if let Some(database) = &self.database {
                write!(f, " database {}", database)?;
            }
            return Ok(());
        }
        match self.driver {
            DbDriver::Sqlite => write!(f, "sqlite:{}", self.database()),
            _ => write!(
                f,
                "{}://{}@{}:{}/{}",
                self.driver.scheme(),
                self.username(),
                self.host(),
                self.port_or_default(),
                self.database()
            ),
        }
    }
}
