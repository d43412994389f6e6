//! 无状态规则组件集成测试
//!
//! 使用内存规则引擎跑完整的请求 -> 命令 -> 评估 -> 响应流程。

use std::fs;
use std::sync::Arc;
use std::thread;

use adapter_shared::config::AdapterSettings;
use adapter_shared::test_utils::{init_test_tracing, unique_name};
use rule_engine::{ExecutionResults, Fact, KnowledgeBaseCompiler, MemoryKnowledgeBase};
use serde_json::{Value, json};
use stateless_adapter::{
    AdapterError, FactRequest, InsertAllCommandListBuilder, QueryCatalog, QueryDeclaration,
    QueryResponse, QueryResultsTransformer, ReloadableKnowledgeBase, StatelessRuleComponent,
};

const PACKAGE: &str = r#"
{
    "name": "diagnostics",
    "rules": [
        {
            "id": "r-both",
            "name": "both_present",
            "when": [
                { "kind": "A", "bind": "$a" },
                { "kind": "B", "bind": "$b" }
            ],
            "then": [{ "type": "insert", "kind": "RuleFired", "data": { "name": "both_present" } }]
        },
        {
            "id": "r-c",
            "name": "c_present",
            "when": [{ "kind": "C", "bind": "$c" }],
            "then": [{ "type": "insert", "kind": "RuleFired", "data": { "name": "c_present" } }]
        },
        {
            "id": "r-grow",
            "name": "grow",
            "when": [{ "kind": "Tick", "bind": "$t" }],
            "then": [{ "type": "insert", "kind": "Tick", "data": { "prev": "$t" } }]
        }
    ],
    "queries": [
        {
            "name": "fired_rules",
            "when": [{ "kind": "RuleFired", "bind": "$r" }]
        },
        {
            "name": "fired_rule_named",
            "parameters": ["name"],
            "when": [
                {
                    "kind": "RuleFired",
                    "bind": "$r",
                    "constraint": { "type": "condition", "field": "name", "operator": "eq", "value": "?name" }
                }
            ]
        }
    ]
}
"#;

type Component = StatelessRuleComponent<FactRequest, QueryResponse>;

fn knowledge_base() -> MemoryKnowledgeBase {
    KnowledgeBaseCompiler::new()
        .compile_from_json(PACKAGE)
        .unwrap()
}

fn catalog() -> QueryCatalog {
    QueryCatalog::new([
        QueryDeclaration::new("fired_rules", "fired"),
        QueryDeclaration::new("fired_rule_named", "c_fired").with_argument("c_present"),
    ])
    .unwrap()
}

fn component(audit_log: Option<std::path::PathBuf>) -> Component {
    init_test_tracing();

    let builder = StatelessRuleComponent::builder()
        .knowledge_base(knowledge_base())
        .command_list_builder(InsertAllCommandListBuilder)
        .results_transformer(QueryResultsTransformer)
        .query_catalog(catalog());
    let builder = match audit_log {
        Some(path) => builder.audit_log(path),
        None => builder,
    };
    builder.build().unwrap()
}

fn fired_names(response: &QueryResponse) -> Vec<String> {
    let mut names: Vec<String> = response
        .facts("fired", "$r")
        .iter()
        .filter_map(|fact| fact.get_field("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    names.sort();
    names
}

fn request(kinds: &[&str], id: u64) -> FactRequest {
    kinds
        .iter()
        .map(|kind| Fact::new(*kind, json!({ "id": id })))
        .collect()
}

#[test]
fn test_round_trip_with_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let audit_path = dir.path().join(unique_name("audit")).with_extension("log");
    let component = component(Some(audit_path.clone()));

    let outcome = component.execute(&request(&["A", "B"], 1)).unwrap();

    assert_eq!(fired_names(&outcome.response), vec!["both_present"]);
    assert_eq!(outcome.response.rows("c_fired"), Some(&[][..]));

    let record = outcome.fired_activations.as_ref().unwrap();
    assert_eq!(record.len(), 1);
    assert_eq!(record.fired_count("both_present"), 1);
    assert_eq!(record.get("both_present").unwrap()[0].facts.len(), 2);

    let previous = component.previously_fired_activations().unwrap();
    assert_eq!(previous.total_fired(), 1);

    let audit = fs::read_to_string(&audit_path).unwrap();
    assert!(audit.lines().any(|line| line.contains("\"activation_fired\"")));
}

#[test]
fn test_record_is_overwritten_not_merged() {
    let dir = tempfile::tempdir().unwrap();
    let component = component(Some(dir.path().join("audit.log")));

    component.execute(&request(&["A", "B"], 1)).unwrap();
    let second = component.execute(&request(&["C"], 2)).unwrap();

    let record = second.fired_activations.unwrap();
    assert_eq!(record.len(), 1);
    assert!(record.contains("c_present"));
    assert!(!record.contains("both_present"));

    let previous = component.previously_fired_activations().unwrap();
    assert_eq!(previous.rule_names().collect::<Vec<_>>(), vec!["c_present"]);
}

#[test]
fn test_diagnostics_disabled() {
    let component = component(None);
    assert!(!component.diagnostics_enabled());

    for id in 0..3 {
        let outcome = component.execute(&request(&["A", "B", "C"], id)).unwrap();
        assert!(outcome.fired_activations.is_none());
        assert_eq!(
            fired_names(&outcome.response),
            vec!["both_present", "c_present"]
        );
    }

    assert!(component.previously_fired_activations().is_none());
}

#[test]
fn test_query_commands_built_once() {
    let component = component(None);
    assert_eq!(component.query_cache_builds(), 0);

    for id in 0..5 {
        component.execute(&request(&["A"], id)).unwrap();
    }
    assert_eq!(component.query_cache_builds(), 1);

    component.replace_query_catalog(
        QueryCatalog::new([QueryDeclaration::new("fired_rules", "fired")]).unwrap(),
    );
    let outcome = component.execute(&request(&["A", "B"], 9)).unwrap();
    component.execute(&request(&["A", "B"], 10)).unwrap();

    assert_eq!(component.query_cache_builds(), 2);
    assert_eq!(outcome.response.len(), 1);
    assert_eq!(outcome.response.rows("c_fired"), None);
    assert_eq!(component.query_catalog().len(), 1);
}

#[test]
fn test_unmatched_queries_are_empty() {
    let component = component(None);

    let outcome = component.execute(&FactRequest::new()).unwrap();

    assert_eq!(outcome.response.rows("fired"), Some(&[][..]));
    assert_eq!(outcome.response.rows("c_fired"), Some(&[][..]));
}

#[test]
fn test_concurrent_executions_keep_records_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let component = Arc::new(component(Some(dir.path().join("audit.log"))));

    let handles: Vec<_> = (0..8u64)
        .map(|id| {
            let component = Arc::clone(&component);
            thread::spawn(move || {
                let kinds: &[&str] = if id % 2 == 0 {
                    &["A", "B"]
                } else {
                    &["A", "B", "C"]
                };
                for _ in 0..10 {
                    let outcome = component.execute(&request(kinds, id)).unwrap();
                    let record = outcome.fired_activations.unwrap();

                    assert_eq!(record.fired_count("both_present"), 1);
                    assert_eq!(record.fired_count("c_present"), (id % 2) as usize);
                    assert_eq!(record.total_fired(), 1 + (id % 2) as usize);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // 共享访问器只保证是某个已完成执行的完整记录
    let previous = component.previously_fired_activations().unwrap();
    assert!(previous.contains("both_present"));
    assert!(matches!(previous.total_fired(), 1 | 2));
    assert_eq!(component.query_cache_builds(), 1);
}

#[test]
fn test_missing_knowledge_base_is_configuration_error() {
    let provider = Arc::new(ReloadableKnowledgeBase::new());
    let component: Component = StatelessRuleComponent::builder()
        .knowledge_base_provider(Arc::clone(&provider))
        .command_list_builder(InsertAllCommandListBuilder)
        .results_transformer(QueryResultsTransformer)
        .query_catalog(catalog())
        .build()
        .unwrap();

    let err = component.execute(&request(&["A"], 1)).unwrap_err();
    assert_eq!(err.error_code(), "CONFIGURATION_ERROR");

    provider.reload_from_json(PACKAGE).unwrap();
    let outcome = component.execute(&request(&["A", "B"], 1)).unwrap();
    assert_eq!(fired_names(&outcome.response), vec!["both_present"]);
}

#[test]
fn test_runaway_rules_hit_firing_limit() {
    let settings = AdapterSettings {
        audit_log: None,
        max_rule_firings: Some(50),
    };
    let provider = ReloadableKnowledgeBase::from_settings(&settings);
    provider.reload_from_json(PACKAGE).unwrap();

    let component: Component = StatelessRuleComponent::builder()
        .knowledge_base_provider(provider)
        .command_list_builder(InsertAllCommandListBuilder)
        .results_transformer(QueryResultsTransformer)
        .query_catalog(catalog())
        .settings(&settings)
        .build()
        .unwrap();

    let err = component.execute(&request(&["Tick"], 1)).unwrap_err();
    assert!(matches!(
        err,
        AdapterError::Evaluation(rule_engine::EngineError::FiringLimitExceeded(50))
    ));
}

#[test]
fn test_failed_execution_replaces_previous_record() {
    let dir = tempfile::tempdir().unwrap();
    let settings = AdapterSettings {
        audit_log: Some(dir.path().join("audit.log")),
        max_rule_firings: Some(5),
    };
    let provider = ReloadableKnowledgeBase::from_settings(&settings);
    provider.reload_from_json(PACKAGE).unwrap();

    let component: Component = StatelessRuleComponent::builder()
        .knowledge_base_provider(provider)
        .command_list_builder(InsertAllCommandListBuilder)
        .results_transformer(QueryResultsTransformer)
        .query_catalog(catalog())
        .settings(&settings)
        .build()
        .unwrap();

    component.execute(&request(&["A", "B"], 1)).unwrap();
    assert!(
        component
            .previously_fired_activations()
            .unwrap()
            .contains("both_present")
    );

    let err = component.execute(&request(&["Tick"], 2)).unwrap_err();
    assert_eq!(err.error_code(), "EVALUATION_ERROR");

    let previous = component.previously_fired_activations().unwrap();
    assert!(!previous.contains("both_present"));
    assert_eq!(previous.fired_count("grow"), 5);
}

#[test]
fn test_unknown_query_is_evaluation_error() {
    let component = component(None);
    component.replace_query_catalog(
        QueryCatalog::new([QueryDeclaration::new("no_such_query", "missing")]).unwrap(),
    );

    let err = component.execute(&request(&["A"], 1)).unwrap_err();
    assert!(matches!(
        err,
        AdapterError::Evaluation(rule_engine::EngineError::UnknownQuery(_))
    ));
}

#[test]
fn test_custom_transformer_failure() {
    let component: StatelessRuleComponent<FactRequest, String> = StatelessRuleComponent::builder()
        .knowledge_base(knowledge_base())
        .command_list_builder(InsertAllCommandListBuilder)
        .results_transformer(
            |results: &ExecutionResults, _: &QueryCatalog| -> stateless_adapter::Result<String> {
                let fired = results.query_results("fired").ok_or_else(|| {
                    AdapterError::Transformation("缺少 fired 输出".to_string())
                })?;
                let first = fired.column("$r").first().copied().ok_or_else(|| {
                    AdapterError::Transformation("没有规则触发".to_string())
                })?;
                Ok(first.to_string())
            },
        )
        .query_catalog(catalog())
        .build()
        .unwrap();

    let ok = component.execute(&request(&["A", "B"], 1)).unwrap();
    assert!(ok.into_response().contains("both_present"));

    let err = component.execute(&request(&["A"], 2)).unwrap_err();
    assert_eq!(err.error_code(), "TRANSFORMATION_ERROR");
}
