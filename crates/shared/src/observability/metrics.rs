//! 指标定义
//!
//! 基于 metrics crate 门面记录指标。库本身不安装 recorder，
//! 未安装时所有记录操作都是空操作。

/// 适配器执行次数，标签 outcome
pub const ADAPTER_EXECUTIONS_TOTAL: &str = "rule_adapter_executions_total";
/// 适配器单次执行耗时
pub const ADAPTER_EXECUTION_DURATION_SECONDS: &str = "rule_adapter_execution_duration_seconds";
/// 查询命令缓存构建次数
pub const ADAPTER_QUERY_CACHE_BUILDS_TOTAL: &str = "rule_adapter_query_cache_builds_total";
/// 引擎规则触发次数
pub const ENGINE_ACTIVATIONS_FIRED_TOTAL: &str = "rule_engine_activations_fired_total";
/// 引擎批量命令执行耗时
pub const ENGINE_BATCH_DURATION_SECONDS: &str = "rule_engine_batch_duration_seconds";

/// 注册指标描述
///
/// 描述会出现在导出端的 HELP 注释中，重复调用无副作用。
pub fn describe_metrics() {
    metrics::describe_counter!(
        ADAPTER_EXECUTIONS_TOTAL,
        "Total number of stateless rule executions"
    );
    metrics::describe_histogram!(
        ADAPTER_EXECUTION_DURATION_SECONDS,
        "Stateless rule execution duration in seconds"
    );
    metrics::describe_counter!(
        ADAPTER_QUERY_CACHE_BUILDS_TOTAL,
        "Number of times query commands were built from declarations"
    );
    metrics::describe_counter!(
        ENGINE_ACTIVATIONS_FIRED_TOTAL,
        "Total number of rule activations fired"
    );
    metrics::describe_histogram!(
        ENGINE_BATCH_DURATION_SECONDS,
        "Batch execution duration inside the rule engine in seconds"
    );
}

/// 记录一次适配器执行
#[inline]
pub fn record_execution(outcome: &str, diagnostics: bool, duration_secs: f64) {
    metrics::counter!(
        ADAPTER_EXECUTIONS_TOTAL,
        "outcome" => outcome.to_string(),
        "diagnostics" => diagnostics.to_string()
    )
    .increment(1);

    metrics::histogram!(ADAPTER_EXECUTION_DURATION_SECONDS).record(duration_secs);
}

/// 记录查询命令缓存构建
#[inline]
pub fn record_query_cache_build(query_count: usize) {
    metrics::counter!(ADAPTER_QUERY_CACHE_BUILDS_TOTAL).increment(1);
    tracing::debug!(query_count, "query command cache built");
}

/// 记录一次批量执行
#[inline]
pub fn record_engine_batch(fired: u64, duration_secs: f64) {
    metrics::counter!(ENGINE_ACTIVATIONS_FIRED_TOTAL).increment(fired);
    metrics::histogram!(ENGINE_BATCH_DURATION_SECONDS).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_recorder() {
        describe_metrics();
        record_execution("success", false, 0.002);
        record_execution("evaluation_error", true, 0.01);
        record_query_cache_build(3);
        record_engine_batch(2, 0.001);
    }
}
