//! 查询声明与查询命令缓存
//!
//! 所有需要从会话中取回的数据都必须声明为查询。查询目录在组件构建时确定，
//! 由目录生成的查询命令只构建一次，之后每次执行直接复用。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use adapter_shared::observability::metrics as adapter_metrics;
use rule_engine::Command;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AdapterError, Result};

/// 查询声明：查询名 + 参数 + 输出标识
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDeclaration {
    name: String,
    out_identifier: String,
    #[serde(default)]
    arguments: Vec<Value>,
}

impl QueryDeclaration {
    pub fn new(name: impl Into<String>, out_identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            out_identifier: out_identifier.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(mut self, argument: impl Into<Value>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn out_identifier(&self) -> &str {
        &self.out_identifier
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// 生成对应的引擎查询命令
    pub fn to_command(&self) -> Command {
        Command::query(&self.out_identifier, &self.name, self.arguments.clone())
    }
}

/// 查询目录
///
/// 按输出标识去重：完全相同的声明合并为一个，输出标识相同但内容不同的声明视为配置错误。
/// 遍历顺序即声明顺序。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryCatalog {
    declarations: Vec<QueryDeclaration>,
}

impl QueryCatalog {
    pub fn new(declarations: impl IntoIterator<Item = QueryDeclaration>) -> Result<Self> {
        let mut catalog = Self::default();

        for declaration in declarations {
            match catalog.get(declaration.out_identifier()) {
                Some(existing) if *existing == declaration => continue,
                Some(existing) => {
                    return Err(AdapterError::Configuration(format!(
                        "输出标识 '{}' 被查询 '{}' 与 '{}' 重复使用",
                        declaration.out_identifier(),
                        existing.name(),
                        declaration.name()
                    )));
                }
                None => catalog.declarations.push(declaration),
            }
        }

        Ok(catalog)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, out_identifier: &str) -> Option<&QueryDeclaration> {
        self.declarations
            .iter()
            .find(|d| d.out_identifier() == out_identifier)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryDeclaration> {
        self.declarations.iter()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// 按声明顺序生成查询命令
    pub fn build_commands(&self) -> Vec<Command> {
        self.declarations
            .iter()
            .map(QueryDeclaration::to_command)
            .collect()
    }
}

impl<'a> IntoIterator for &'a QueryCatalog {
    type Item = &'a QueryDeclaration;
    type IntoIter = std::slice::Iter<'a, QueryDeclaration>;

    fn into_iter(self) -> Self::IntoIter {
        self.declarations.iter()
    }
}

/// 目录及其查询命令缓存
///
/// 替换目录时整体替换本结构，新缓存为空，从而显式失效。
#[derive(Debug)]
pub(crate) struct QueryCommandCache {
    catalog: QueryCatalog,
    commands: OnceLock<Vec<Command>>,
}

impl QueryCommandCache {
    pub(crate) fn new(catalog: QueryCatalog) -> Self {
        Self {
            catalog,
            commands: OnceLock::new(),
        }
    }

    pub(crate) fn catalog(&self) -> &QueryCatalog {
        &self.catalog
    }

    /// 获取查询命令，首次调用时构建并计数
    pub(crate) fn commands(&self, builds: &AtomicUsize) -> &[Command] {
        self.commands.get_or_init(|| {
            builds.fetch_add(1, Ordering::Relaxed);
            adapter_metrics::record_query_cache_build(self.catalog.len());
            self.catalog.build_commands()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_declaration_to_command() {
        let declaration = QueryDeclaration::new("discounts_for", "discounts").with_argument("o-1");
        assert_eq!(
            declaration.to_command(),
            Command::query("discounts", "discounts_for", vec![json!("o-1")])
        );
    }

    #[test]
    fn test_catalog_dedupes_identical_declarations() {
        let catalog = QueryCatalog::new([
            QueryDeclaration::new("fired_rules", "fired"),
            QueryDeclaration::new("gold_customers", "gold"),
            QueryDeclaration::new("fired_rules", "fired"),
        ])
        .unwrap();

        assert_eq!(catalog.len(), 2);
        let names: Vec<&str> = catalog.iter().map(QueryDeclaration::name).collect();
        assert_eq!(names, vec!["fired_rules", "gold_customers"]);
    }

    #[test]
    fn test_catalog_rejects_conflicting_out_identifier() {
        let result = QueryCatalog::new([
            QueryDeclaration::new("fired_rules", "out"),
            QueryDeclaration::new("gold_customers", "out"),
        ]);

        assert!(matches!(result, Err(AdapterError::Configuration(_))));
    }

    #[test]
    fn test_cache_builds_once() {
        let cache = QueryCommandCache::new(
            QueryCatalog::new([QueryDeclaration::new("fired_rules", "fired")]).unwrap(),
        );
        let builds = AtomicUsize::new(0);

        for _ in 0..5 {
            assert_eq!(cache.commands(&builds).len(), 1);
        }
        assert_eq!(builds.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_declaration_deserialization() {
        let declaration: QueryDeclaration = serde_json::from_str(
            r#"{ "name": "by_tier", "out_identifier": "gold", "arguments": ["gold"] }"#,
        )
        .unwrap();
        assert_eq!(declaration.arguments(), &[json!("gold")]);
    }
}
