//! 批量执行结果

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::fact::{Fact, FactHandle};

/// 单个命令的输出
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ExecutionOutput {
    Handle(FactHandle),
    Handles(Vec<FactHandle>),
    Fired(usize),
    Global(Value),
    Query(QueryResults),
    Objects(Vec<Fact>),
}

/// 一次评估产生的全部具名输出
///
/// 只在单次执行内有效，不应跨调用保留。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionResults {
    outputs: HashMap<String, ExecutionOutput>,
}

impl ExecutionResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一个输出，同名输出以后写入的为准
    pub fn insert(&mut self, identifier: impl Into<String>, output: ExecutionOutput) {
        self.outputs.insert(identifier.into(), output);
    }

    pub fn get(&self, identifier: &str) -> Option<&ExecutionOutput> {
        self.outputs.get(identifier)
    }

    /// 获取查询结果，标识不存在或不是查询输出时返回 None
    pub fn query_results(&self, identifier: &str) -> Option<&QueryResults> {
        match self.outputs.get(identifier) {
            Some(ExecutionOutput::Query(results)) => Some(results),
            _ => None,
        }
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.outputs.contains_key(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.outputs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// 命名查询的结果集
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResults {
    pub query_name: String,
    /// 每行可用的绑定名
    pub identifiers: Vec<String>,
    pub rows: Vec<QueryRow>,
}

impl QueryResults {
    pub fn new(query_name: impl Into<String>, identifiers: Vec<String>) -> Self {
        Self {
            query_name: query_name.into(),
            identifiers,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryRow> {
        self.rows.iter()
    }

    /// 取出每行中某个绑定对应的事实
    pub fn column(&self, identifier: &str) -> Vec<&Fact> {
        self.rows.iter().filter_map(|row| row.get(identifier)).collect()
    }
}

/// 查询结果中的一行：绑定名 -> 事实
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRow {
    values: BTreeMap<String, Fact>,
}

impl QueryRow {
    pub fn new(values: BTreeMap<String, Fact>) -> Self {
        Self { values }
    }

    pub fn get(&self, identifier: &str) -> Option<&Fact> {
        self.values.get(identifier)
    }

    pub fn values(&self) -> &BTreeMap<String, Fact> {
        &self.values
    }
}
