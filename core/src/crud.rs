use crate::config::DbConfig;
use crate::database::Database;
use crate::error::{CrudError, Result};
use crate::statement::{self, Statement};
use crate::value::{Fields, Record};
use std::sync::Arc;

/// 动态 CRUD
///
/// 除共享连接外不保存状态：每次调用都根据表名和字段映射现场构建参数化 SQL，
/// 绑定、执行后即丢弃。值一律通过参数绑定，表名和列名只做标识符校验
/// （以及可选的表白名单）。
///
/// # 示例
///
/// ```rust,ignore
/// use dyncrud::{fields, DbConfig, DynamicCrud};
///
/// let crud = DynamicCrud::connect(&DbConfig::from_env()?).await?;
/// crud.create("players", &fields! { "name" => "John Doe", "rating" => 99 }).await?;
/// let players = crud.read("players", &fields! { "rating" => 99 }).await?;
/// ```
#[derive(Debug, Clone)]
pub struct DynamicCrud {
    db: Arc<Database>,
    allowed_tables: Option<Arc<[String]>>,
}

impl DynamicCrud {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            allowed_tables: None,
        }
    }

    /// 按配置建立连接，并应用其中的表白名单
    pub async fn connect(config: &DbConfig) -> Result<Self> {
        let db = Database::connect(config).await?;
        let crud = Self::new(Arc::new(db));
        Ok(match &config.allowed_tables {
            Some(tables) => crud.with_allowed_tables(tables.iter().cloned()),
            None => crud,
        })
    }

    /// 限制可访问的表
    pub fn with_allowed_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tables = Some(tables.into_iter().map(Into::<String>::into).collect());
        self
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    fn check_table(&self, table: &str) -> Result<()> {
        match &self.allowed_tables {
            Some(allowed) if !allowed.iter().any(|t| t == table) => {
                Err(CrudError::TableNotAllowed(table.to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn fetch(&self, statement: Statement) -> Result<Vec<Record>> {
        self.db.connection().await.fetch_all(&statement).await
    }

    async fn execute(&self, statement: Statement) -> Result<u64> {
        self.db.connection().await.execute(&statement).await
    }

    /// 查询：`SELECT * FROM table [WHERE c = :c AND ...]`
    ///
    /// 条件为空时返回整张表；没有匹配行时返回空 Vec
    pub async fn read(&self, table: &str, conditions: &Fields) -> Result<Vec<Record>> {
        self.check_table(table)?;
        let statement = statement::select(table, conditions)?;
        self.fetch(statement).await
    }

    pub async fn read_all(&self, table: &str) -> Result<Vec<Record>> {
        self.read(table, &Fields::new()).await
    }

    /// 插入一行，不返回自增主键
    pub async fn create(&self, table: &str, data: &Fields) -> Result<()> {
        self.check_table(table)?;
        let statement = statement::insert(table, data)?;
        self.execute(statement).await?;
        Ok(())
    }

    /// 按条件更新，返回影响行数
    ///
    /// 条件为空时返回 [`CrudError::EmptyConditions`]，不访问数据库
    pub async fn update(&self, table: &str, data: &Fields, conditions: &Fields) -> Result<u64> {
        self.check_table(table)?;
        let statement = statement::update(table, data, conditions)?;
        self.execute(statement).await
    }

    /// 全表更新（需要显式调用）
    pub async fn update_all(&self, table: &str, data: &Fields) -> Result<u64> {
        self.check_table(table)?;
        let statement = statement::update_all(table, data)?;
        self.execute(statement).await
    }

    /// 按条件删除，返回影响行数
    ///
    /// 条件为空时返回 [`CrudError::EmptyConditions`]，不访问数据库
    pub async fn delete(&self, table: &str, conditions: &Fields) -> Result<u64> {
        self.check_table(table)?;
        let statement = statement::delete(table, conditions)?;
        self.execute(statement).await
    }

    /// 全表删除（危险操作，需要显式调用）
    pub async fn delete_all(&self, table: &str) -> Result<u64> {
        self.check_table(table)?;
        let statement = statement::delete_all(table)?;
        self.execute(statement).await
    }
}
