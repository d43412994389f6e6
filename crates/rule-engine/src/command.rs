//! 批量命令定义

use serde::Serialize;
use serde_json::Value;

use crate::fact::Fact;

/// 引擎命令
///
/// 带输出标识的命令会在 [`ExecutionResults`](crate::results::ExecutionResults) 中产生同名结果。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// 插入单个事实，输出事实句柄
    Insert {
        fact: Fact,
        out_identifier: Option<String>,
    },
    /// 插入一组事实，输出事实句柄列表
    InsertElements {
        facts: Vec<Fact>,
        out_identifier: Option<String>,
    },
    /// 设置全局变量，约束中可用 `@name` 引用
    SetGlobal {
        identifier: String,
        value: Value,
        out: bool,
    },
    /// 触发规则直到没有可触发的激活，`max` 限制本次触发数量，输出触发次数
    FireAllRules {
        max: Option<usize>,
        out_identifier: Option<String>,
    },
    /// 执行命名查询
    Query {
        out_identifier: String,
        name: String,
        arguments: Vec<Value>,
    },
    /// 读取工作内存中的事实，可按类型过滤
    GetObjects {
        kind: Option<String>,
        out_identifier: String,
    },
}

impl Command {
    pub fn insert(fact: Fact) -> Self {
        Self::Insert {
            fact,
            out_identifier: None,
        }
    }

    pub fn insert_with_out(fact: Fact, out_identifier: impl Into<String>) -> Self {
        Self::Insert {
            fact,
            out_identifier: Some(out_identifier.into()),
        }
    }

    pub fn insert_elements(facts: impl IntoIterator<Item = Fact>) -> Self {
        Self::InsertElements {
            facts: facts.into_iter().collect(),
            out_identifier: None,
        }
    }

    pub fn set_global(identifier: impl Into<String>, value: Value) -> Self {
        Self::SetGlobal {
            identifier: identifier.into(),
            value,
            out: false,
        }
    }

    pub fn fire_all_rules() -> Self {
        Self::FireAllRules {
            max: None,
            out_identifier: None,
        }
    }

    pub fn fire_all_rules_with_out(out_identifier: impl Into<String>) -> Self {
        Self::FireAllRules {
            max: None,
            out_identifier: Some(out_identifier.into()),
        }
    }

    pub fn query(
        out_identifier: impl Into<String>,
        name: impl Into<String>,
        arguments: Vec<Value>,
    ) -> Self {
        Self::Query {
            out_identifier: out_identifier.into(),
            name: name.into(),
            arguments,
        }
    }

    pub fn get_objects(kind: Option<String>, out_identifier: impl Into<String>) -> Self {
        Self::GetObjects {
            kind,
            out_identifier: out_identifier.into(),
        }
    }

    /// 命令的输出标识
    pub fn out_identifier(&self) -> Option<&str> {
        match self {
            Self::Insert { out_identifier, .. }
            | Self::InsertElements { out_identifier, .. }
            | Self::FireAllRules { out_identifier, .. } => out_identifier.as_deref(),
            Self::SetGlobal {
                identifier, out, ..
            } => out.then_some(identifier.as_str()),
            Self::Query { out_identifier, .. } | Self::GetObjects { out_identifier, .. } => {
                Some(out_identifier.as_str())
            }
        }
    }

    pub fn is_query(&self) -> bool {
        matches!(self, Self::Query { .. })
    }
}

/// 一次提交的有序命令批次
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchExecution {
    pub commands: Vec<Command>,
}

impl BatchExecution {
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl From<Vec<Command>> for BatchExecution {
    fn from(commands: Vec<Command>) -> Self {
        Self::new(commands)
    }
}
