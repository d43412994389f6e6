//! 知识库提供者
//!
//! 组件每次执行都向提供者索取当前知识库。`ReloadableKnowledgeBase` 用 `ArcSwap`
//! 支持热替换：读取端只有一次原子 load，替换不会阻塞正在进行的评估，
//! 已开始的评估继续使用旧知识库直到结束。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use adapter_shared::config::AdapterSettings;
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use rule_engine::{KnowledgeBase, KnowledgeBaseCompiler};
use tracing::{info, warn};

use crate::error::{AdapterError, Result};

/// 提供当前可用知识库
pub trait KnowledgeBaseProvider: Send + Sync {
    /// 当前知识库，尚未加载时返回 None
    fn knowledge_base(&self) -> Option<Arc<dyn KnowledgeBase>>;
}

/// 固定知识库
#[derive(Clone)]
pub struct StaticKnowledgeBase {
    knowledge_base: Arc<dyn KnowledgeBase>,
}

impl StaticKnowledgeBase {
    pub fn new(knowledge_base: impl KnowledgeBase + 'static) -> Self {
        Self {
            knowledge_base: Arc::new(knowledge_base),
        }
    }

    pub fn from_arc(knowledge_base: Arc<dyn KnowledgeBase>) -> Self {
        Self { knowledge_base }
    }
}

impl KnowledgeBaseProvider for StaticKnowledgeBase {
    fn knowledge_base(&self) -> Option<Arc<dyn KnowledgeBase>> {
        Some(Arc::clone(&self.knowledge_base))
    }
}

/// 可热替换的知识库
pub struct ReloadableKnowledgeBase {
    current: ArcSwapOption<Arc<dyn KnowledgeBase>>,
    compiler: Mutex<KnowledgeBaseCompiler>,
    /// 成功替换的次数
    version: AtomicU64,
}

impl ReloadableKnowledgeBase {
    /// 创建空提供者，加载前执行会得到配置错误
    pub fn new() -> Self {
        Self::with_compiler(KnowledgeBaseCompiler::new())
    }

    pub fn with_compiler(compiler: KnowledgeBaseCompiler) -> Self {
        Self {
            current: ArcSwapOption::empty(),
            compiler: Mutex::new(compiler),
            version: AtomicU64::new(0),
        }
    }

    /// 按适配器配置创建，应用规则触发上限
    pub fn from_settings(settings: &AdapterSettings) -> Self {
        Self::with_compiler(
            KnowledgeBaseCompiler::new().with_max_firings(settings.max_rule_firings),
        )
    }

    /// 替换当前知识库，返回新版本号
    pub fn replace(&self, knowledge_base: Arc<dyn KnowledgeBase>) -> u64 {
        self.current.store(Some(Arc::new(knowledge_base)));
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        info!(version, "知识库已替换");
        version
    }

    /// 编译 JSON 规则包并替换当前知识库
    ///
    /// 编译失败时保留原知识库。
    pub fn reload_from_json(&self, json: &str) -> Result<u64> {
        let compiled = self.compiler.lock().compile_from_json(json);
        match compiled {
            Ok(knowledge_base) => Ok(self.replace(Arc::new(knowledge_base))),
            Err(e) => {
                warn!(error = %e, "规则包编译失败，继续使用当前知识库");
                Err(AdapterError::Configuration(format!("规则包编译失败: {}", e)))
            }
        }
    }

    /// 卸载当前知识库
    pub fn clear(&self) {
        self.current.store(None);
        info!("知识库已卸载");
    }

    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}

impl Default for ReloadableKnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeBaseProvider for ReloadableKnowledgeBase {
    fn knowledge_base(&self) -> Option<Arc<dyn KnowledgeBase>> {
        self.current.load_full().map(|kb| Arc::clone(&*kb))
    }
}

impl<P: KnowledgeBaseProvider + ?Sized> KnowledgeBaseProvider for Arc<P> {
    fn knowledge_base(&self) -> Option<Arc<dyn KnowledgeBase>> {
        (**self).knowledge_base()
    }
}
