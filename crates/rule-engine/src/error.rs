//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("规则包解析失败: {0}")]
    ParseError(String),

    #[error("规则包编译失败: {0}")]
    CompileError(String),

    #[error("类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("无法解析的引用: {0}")]
    UnboundReference(String),

    #[error("查询未定义: {0}")]
    UnknownQuery(String),

    #[error("查询 {name} 参数个数不匹配: 期望 {expected}, 实际 {actual}")]
    QueryArity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("规则触发次数超过上限 {0}，疑似规则死循环")]
    FiringLimitExceeded(usize),

    #[error("审计日志写入失败: {0}")]
    AuditLog(#[from] std::io::Error),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
