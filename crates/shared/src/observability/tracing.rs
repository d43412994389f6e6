//! 日志初始化
//!
//! 基于 tracing-subscriber 组装 EnvFilter 与 fmt 层，支持 pretty / json 两种输出。

use anyhow::Result;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::ObservabilityConfig;

/// 构建环境过滤器
///
/// RUST_LOG 优先，其次是配置中的日志级别，两者都无法解析时退回 info。
pub fn build_env_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 初始化全局 tracing subscriber
///
/// 重复初始化会返回错误，由调用方决定是否忽略。
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let env_filter = build_env_filter(config);

    let fmt_layer = if config.json_logs() {
        fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
