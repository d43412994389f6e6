//! 约束操作符
//!
//! 模式约束形如 `{ "field": "amount", "operator": "gte", "value": 500 }`：
//! 左侧是事实中按点路径取出的字段值，右侧是字面量或 `$bind` / `?param` / `@global` 引用。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 约束右侧期望值的形态，编译期据此校验字面量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// 不读取期望值
    Ignored,
    /// 单个值
    Scalar,
    /// `[min, max]` 闭区间
    Range,
    /// 候选值数组
    List,
    /// 正则表达式字符串
    Pattern,
}

/// 字段与期望值之间的比较方式
///
/// 字段缺失时除 `is_empty` 以外一律不匹配。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// 相等，数值按浮点比较
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// 字段落在 `[min, max]` 内
    Between,
    /// 字段等于数组中任一值
    In,
    NotIn,
    /// 字符串包含子串，或数组包含元素
    Contains,
    StartsWith,
    EndsWith,
    /// 字段字符串匹配正则
    Regex,
    /// 字段缺失、null 或空字符串/数组/对象
    IsEmpty,
    IsNotEmpty,
}

impl Operator {
    pub const fn operand(self) -> Operand {
        match self {
            Self::IsEmpty | Self::IsNotEmpty => Operand::Ignored,
            Self::Between => Operand::Range,
            Self::In | Self::NotIn => Operand::List,
            Self::Regex => Operand::Pattern,
            _ => Operand::Scalar,
        }
    }

    /// 规则包 JSON 中的写法
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Between => "between",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Regex => "regex",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 约束组合方式，`AND` 遇到第一个不匹配即停，`OR` 遇到第一个匹配即停
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[serde(alias = "and")]
    And,
    #[serde(alias = "or")]
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::And => "AND",
            Self::Or => "OR",
        })
    }
}
