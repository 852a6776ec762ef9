pub mod config;
pub mod crud;
pub mod database;
mod decode;
pub mod error;
pub mod statement;
pub mod utils;
pub mod value;

pub use config::DbConfig;
pub use crud::DynamicCrud;
pub use database::{Connection, Database, DbDriver};
pub use error::{CrudError, ErrorKind, Result};
pub use statement::Statement;
pub use value::{Fields, Record, Value};
