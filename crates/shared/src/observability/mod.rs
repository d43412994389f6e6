//! 统一可观测性模块
//!
//! 提供 logging 与 metrics 的统一初始化。宿主应用在启动时调用一次 [`init`]，
//! 库代码只通过 `tracing` / `metrics` 宏输出，不自行安装 subscriber 或 recorder。

pub mod metrics;
pub mod tracing;

use ::tracing::info;
use anyhow::Result;

use crate::config::ObservabilityConfig;

/// 统一初始化可观测性
///
/// 初始化顺序：
/// 1. Tracing（日志）
/// 2. 指标描述（是否导出由宿主安装的 recorder 决定）
///
/// # Example
///
/// ```ignore
/// use adapter_shared::config::AppConfig;
/// use adapter_shared::observability;
///
/// fn main() -> anyhow::Result<()> {
///     let config = AppConfig::load("pricing-rules")?;
///     observability::init(&config.observability())?;
///     Ok(())
/// }
/// ```
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    tracing::init(config)?;

    if config.metrics_enabled {
        metrics::describe_metrics();
    }

    info!(
        service = %config.service_name,
        log_level = %config.log_level,
        metrics_enabled = config.metrics_enabled,
        "Observability initialized"
    );

    Ok(())
}
