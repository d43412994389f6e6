//! 共享库
//!
//! 规则适配器各 crate 共用的配置加载、日志与指标初始化、测试辅助代码。

pub mod config;
pub mod observability;
pub mod test_utils;
