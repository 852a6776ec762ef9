//! 工具函数模块

use crate::error::{CrudError, Result};

/// 验证表名 / 字段名是否安全
///
/// 标识符不会被参数绑定，只能由字母、数字和下划线组成，且不能以数字开头
pub fn is_safe_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn validate_identifier(name: &str) -> Result<&str> {
    if is_safe_identifier(name) {
        Ok(name)
    } else {
        Err(CrudError::InvalidIdentifier(name.to_string()))
    }
}
