//! 执行结果转换

use std::collections::BTreeMap;

use rule_engine::{ExecutionOutput, ExecutionResults, Fact, QueryRow};
use serde::Serialize;

use crate::error::{AdapterError, Result};
use crate::query::QueryCatalog;

/// 把原始执行结果转换为应用层响应
///
/// 实现应把没有结果行的查询视为空结果，并忽略与查询声明无关的输出。
pub trait ExecutionResultsTransformer<Resp>: Send + Sync {
    fn transform(&self, results: &ExecutionResults, catalog: &QueryCatalog) -> Result<Resp>;
}

impl<Resp, F> ExecutionResultsTransformer<Resp> for F
where
    F: Fn(&ExecutionResults, &QueryCatalog) -> Result<Resp> + Send + Sync,
{
    fn transform(&self, results: &ExecutionResults, catalog: &QueryCatalog) -> Result<Resp> {
        self(results, catalog)
    }
}

#[cfg(test)]
mockall::mock! {
    pub ExecutionResultsTransformer<Resp: Send + Sync + 'static> {}

    impl<Resp: Send + Sync + 'static> ExecutionResultsTransformer<Resp> for ExecutionResultsTransformer<Resp> {
        fn transform(&self, results: &ExecutionResults, catalog: &QueryCatalog) -> Result<Resp>;
    }
}

/// 按输出标识收集的查询结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResponse {
    results: BTreeMap<String, Vec<QueryRow>>,
}

impl QueryResponse {
    /// 某个查询的结果行；未声明的输出标识返回 None
    pub fn rows(&self, out_identifier: &str) -> Option<&[QueryRow]> {
        self.results.get(out_identifier).map(Vec::as_slice)
    }

    /// 取出某个查询每行中指定绑定的事实
    pub fn facts(&self, out_identifier: &str, binding: &str) -> Vec<&Fact> {
        self.rows(out_identifier)
            .unwrap_or_default()
            .iter()
            .filter_map(|row| row.get(binding))
            .collect()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.results.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// 把目录中每个查询的结果行原样收集为 [`QueryResponse`]
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryResultsTransformer;

impl ExecutionResultsTransformer<QueryResponse> for QueryResultsTransformer {
    fn transform(
        &self,
        results: &ExecutionResults,
        catalog: &QueryCatalog,
    ) -> Result<QueryResponse> {
        let mut response = QueryResponse::default();

        for declaration in catalog {
            let rows = match results.get(declaration.out_identifier()) {
                Some(ExecutionOutput::Query(query)) => query.rows.clone(),
                Some(_) => {
                    return Err(AdapterError::Transformation(format!(
                        "输出 '{}' 不是查询结果",
                        declaration.out_identifier()
                    )));
                }
                None => {
                    return Err(AdapterError::Transformation(format!(
                        "查询 '{}' 缺少输出 '{}'",
                        declaration.name(),
                        declaration.out_identifier()
                    )));
                }
            };
            response
                .results
                .insert(declaration.out_identifier().to_string(), rows);
        }

        Ok(response)
    }
}
