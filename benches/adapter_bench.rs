//! 无状态规则适配器性能基准测试
//!
//! 测试覆盖：
//! - 诊断模式开启与关闭的单次执行延迟对比
//! - 不同事实数量下的执行性能曲线

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rule_engine::{Fact, KnowledgeBaseCompiler};
use serde_json::json;
use stateless_adapter::{
    FactRequest, InsertAllCommandListBuilder, QueryCatalog, QueryDeclaration, QueryResponse,
    QueryResultsTransformer, StatelessRuleComponent,
};
use std::hint::black_box;
use std::path::PathBuf;

const PACKAGE: &str = r#"
{
    "name": "bench",
    "rules": [
        {
            "id": "big-order",
            "name": "big_order",
            "salience": 10,
            "when": [
                {
                    "kind": "Order",
                    "bind": "$o",
                    "constraint": { "type": "condition", "field": "amount", "operator": "gte", "value": 500 }
                }
            ],
            "then": [{ "type": "insert", "kind": "Flag", "data": { "order": "$o.id", "reason": "big" } }]
        },
        {
            "id": "gold-order",
            "name": "gold_order",
            "when": [
                {
                    "kind": "Customer",
                    "bind": "$c",
                    "constraint": { "type": "condition", "field": "tier", "operator": "eq", "value": "gold" }
                },
                {
                    "kind": "Order",
                    "bind": "$o",
                    "constraint": { "type": "condition", "field": "customer_id", "operator": "eq", "value": "$c.id" }
                }
            ],
            "then": [{ "type": "insert", "kind": "Flag", "data": { "order": "$o.id", "reason": "gold" } }]
        }
    ],
    "queries": [
        { "name": "flags", "when": [{ "kind": "Flag", "bind": "$f" }] }
    ]
}
"#;

fn create_component(
    audit_log: Option<PathBuf>,
) -> StatelessRuleComponent<FactRequest, QueryResponse> {
    let knowledge_base = KnowledgeBaseCompiler::new()
        .compile_from_json(PACKAGE)
        .expect("基准规则包编译失败");

    let builder = StatelessRuleComponent::builder()
        .knowledge_base(knowledge_base)
        .command_list_builder(InsertAllCommandListBuilder)
        .results_transformer(QueryResultsTransformer)
        .query_catalog(
            QueryCatalog::new([QueryDeclaration::new("flags", "flags")])
                .expect("查询目录构建失败"),
        );

    let builder = match audit_log {
        Some(path) => builder.audit_log(path),
        None => builder,
    };
    builder.build().expect("组件构建失败")
}

/// 创建请求：一个金卡客户和若干订单
fn create_request(orders: usize) -> FactRequest {
    let mut request =
        FactRequest::new().with_fact(Fact::new("Customer", json!({"id": "c-1", "tier": "gold"})));

    for i in 0..orders {
        request = request.with_fact(Fact::new(
            "Order",
            json!({
                "id": format!("o-{}", i),
                "customer_id": if i % 3 == 0 { "c-1" } else { "c-2" },
                "amount": (i * 97) % 1000
            }),
        ));
    }

    request
}

/// 诊断模式开关对比
fn bench_diagnostics(c: &mut Criterion) {
    let mut group = c.benchmark_group("diagnostics");
    let dir = tempfile::tempdir().expect("临时目录创建失败");

    let request = create_request(20);
    let disabled = create_component(None);
    let enabled = create_component(Some(dir.path().join("bench-audit.log")));

    group.bench_function("disabled", |b| {
        b.iter(|| disabled.execute(black_box(&request)))
    });

    group.bench_function("enabled", |b| {
        b.iter(|| enabled.execute(black_box(&request)))
    });

    group.finish();
}

/// 不同事实数量下的执行性能
fn bench_fact_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("fact_scaling");
    let component = create_component(None);

    for orders in [10, 50, 100] {
        let request = create_request(orders);
        group.throughput(Throughput::Elements(orders as u64));
        group.bench_with_input(BenchmarkId::from_parameter(orders), &request, |b, request| {
            b.iter(|| component.execute(black_box(request)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_diagnostics, bench_fact_scaling);
criterion_main!(benches);
