//! 适配器错误类型

use rule_engine::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// 协作组件缺失或不可用，重试无意义
    #[error("适配器配置错误: {0}")]
    Configuration(String),

    /// 引擎拒绝或执行批量命令失败
    #[error("规则评估失败: {0}")]
    Evaluation(#[from] EngineError),

    #[error("执行结果转换失败: {0}")]
    Transformation(String),
}

impl AdapterError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Evaluation(_) => "EVALUATION_ERROR",
            Self::Transformation(_) => "TRANSFORMATION_ERROR",
        }
    }

    /// 指标中的 outcome 标签
    pub(crate) fn outcome(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::Evaluation(_) => "evaluation_error",
            Self::Transformation(_) => "transformation_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AdapterError::Configuration("x".into()).error_code(),
            "CONFIGURATION_ERROR"
        );
        assert_eq!(
            AdapterError::Transformation("x".into()).error_code(),
            "TRANSFORMATION_ERROR"
        );
        assert_eq!(
            AdapterError::from(EngineError::UnknownQuery("q".into())).error_code(),
            "EVALUATION_ERROR"
        );
    }

    #[test]
    fn test_evaluation_keeps_engine_source() {
        let err = AdapterError::from(EngineError::FiringLimitExceeded(5));
        let source = err.source().unwrap();
        assert!(source.to_string().contains('5'));
        assert!(matches!(
            err,
            AdapterError::Evaluation(EngineError::FiringLimitExceeded(5))
        ));
    }
}
