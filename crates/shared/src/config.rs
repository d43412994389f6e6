//! 配置管理模块
//!
//! 支持多文件分层加载与环境变量覆盖，提供类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// 环境变量前缀，如 RULES_ADAPTER__AUDIT_LOG -> adapter.audit_log
pub const ENV_PREFIX: &str = "RULES";

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// 服务名称，用于日志中的来源标识
    pub service_name: String,
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown-service".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ObservabilityConfig {
    pub fn with_service_name(mut self, service_name: &str) -> Self {
        self.service_name = service_name.to_string();
        self
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// 规则适配器配置
///
/// `audit_log` 一旦设置即开启诊断模式：每次执行写审计日志并捕获规则触发记录。
/// 诊断模式会明显拖慢评估，生产环境应保持关闭。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdapterSettings {
    /// 审计日志文件路径
    pub audit_log: Option<PathBuf>,
    /// 单次评估允许触发的规则上限，用于拦截失控的规则链
    pub max_rule_firings: Option<usize>,
}

impl AdapterSettings {
    /// 是否开启诊断模式
    pub fn diagnostics_enabled(&self) -> bool {
        self.audit_log.is_some()
    }
}

/// 应用配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub observability: ObservabilityConfig,
    pub adapter: AdapterSettings,
}

impl AppConfig {
    /// 从配置目录和环境变量加载配置
    ///
    /// 配置目录由 `CONFIG_DIR` 指定，缺省为 `config`。`.env` 文件存在时先行加载。
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
        Self::load_from(Path::new(&config_dir), service_name)
    }

    /// 从指定目录加载配置
    ///
    /// 加载顺序（后加载的覆盖先加载的同名配置项）：
    /// 1. {dir}/default.toml
    /// 2. {dir}/{environment}.toml，环境名取自 RULES_ENV，缺省 development
    /// 3. {dir}/{service_name}.toml
    /// 4. RULES_ 前缀环境变量，层级之间用双下划线分隔
    pub fn load_from(config_dir: &Path, service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var(format!("{}_ENV", ENV_PREFIX))
            .unwrap_or_else(|_| "development".to_string());

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 带服务名的可观测性配置
    pub fn observability(&self) -> ObservabilityConfig {
        self.observability
            .clone()
            .with_service_name(&self.service_name)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
