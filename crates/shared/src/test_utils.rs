//! 测试工具模块
//!
//! 提供集成测试共用的日志初始化与唯一命名辅助函数。

use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

static TEST_TRACING: Once = Once::new();

/// 为测试安装一次 tracing subscriber
///
/// 输出写入测试捕获的 writer，默认级别 debug，可被 RUST_LOG 覆盖。
pub fn init_test_tracing() {
    TEST_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// 生成唯一的测试名称，避免并行测试之间的文件或标识冲突
pub fn unique_name(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}
