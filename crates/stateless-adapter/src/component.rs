//! 无状态规则组件
//!
//! 一次 `execute` 即一次完整、隔离的评估：
//! 1. 由命令列表构建器生成业务命令
//! 2. 追加缓存的查询命令（首次使用时构建）
//! 3. 从知识库创建新的无状态会话，诊断模式下挂载触发记录监听器并打开审计日志
//! 4. 一次性提交全部命令
//! 5. 关闭审计日志，把执行结果交给结果转换器

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use adapter_shared::config::AdapterSettings;
use adapter_shared::observability::metrics as adapter_metrics;
use arc_swap::{ArcSwap, ArcSwapOption};
use rule_engine::{BatchExecution, KnowledgeBase};
use tracing::{Span, debug, info, instrument};
use uuid::Uuid;

use crate::command_list::CommandListBuilder;
use crate::diagnostics::{AuditGuard, FiredActivations, FiredRulesListener};
use crate::error::{AdapterError, Result};
use crate::knowledge::{KnowledgeBaseProvider, StaticKnowledgeBase};
use crate::query::{QueryCatalog, QueryCommandCache};
use crate::transformer::ExecutionResultsTransformer;

/// 一次执行的结果
#[derive(Debug, Clone)]
pub struct ExecutionOutcome<Resp> {
    pub response: Resp,
    /// 本次执行的规则触发记录，诊断模式关闭时为 None
    pub fired_activations: Option<FiredActivations>,
}

impl<Resp> ExecutionOutcome<Resp> {
    pub fn response(&self) -> &Resp {
        &self.response
    }

    pub fn fired_activations(&self) -> Option<&FiredActivations> {
        self.fired_activations.as_ref()
    }

    pub fn into_response(self) -> Resp {
        self.response
    }
}

/// 无状态规则组件
///
/// 构建后不可变（查询目录可通过 [`replace_query_catalog`](Self::replace_query_catalog)
/// 显式替换），可在多个线程间共享同时执行。
pub struct StatelessRuleComponent<Req, Resp> {
    knowledge: Arc<dyn KnowledgeBaseProvider>,
    command_list_builder: Arc<dyn CommandListBuilder<Req>>,
    transformer: Arc<dyn ExecutionResultsTransformer<Resp>>,
    queries: ArcSwap<QueryCommandCache>,
    audit_log: Option<PathBuf>,
    last_fired: ArcSwapOption<FiredActivations>,
    query_cache_builds: AtomicUsize,
}

impl<Req, Resp> StatelessRuleComponent<Req, Resp> {
    pub fn builder() -> StatelessRuleComponentBuilder<Req, Resp> {
        StatelessRuleComponentBuilder::new()
    }

    /// 执行一次评估
    #[instrument(
        skip_all,
        fields(
            execution_id = %Uuid::new_v4(),
            diagnostics = self.audit_log.is_some(),
            commands = tracing::field::Empty
        )
    )]
    pub fn execute(&self, request: &Req) -> Result<ExecutionOutcome<Resp>> {
        let start = Instant::now();

        let result = self.run(request);

        let elapsed = start.elapsed();
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.outcome(),
        };
        adapter_metrics::record_execution(
            outcome,
            self.audit_log.is_some(),
            elapsed.as_secs_f64(),
        );
        debug!(
            outcome,
            elapsed_ms = elapsed.as_millis() as u64,
            "无状态规则执行完成"
        );

        result
    }

    fn run(&self, request: &Req) -> Result<ExecutionOutcome<Resp>> {
        let mut commands = self
            .command_list_builder
            .build_business_logic_command_list(request)?;

        let queries = self.queries.load_full();
        commands.extend_from_slice(queries.commands(&self.query_cache_builds));

        let knowledge_base = self.knowledge.knowledge_base().ok_or_else(|| {
            AdapterError::Configuration("知识库尚未加载".to_string())
        })?;
        let mut session = knowledge_base.new_stateless_session();

        let mut listener = None;
        let mut audit = None;
        if let Some(target) = &self.audit_log {
            // 上一次执行的记录在此作废，本次失败时也不会残留
            self.last_fired.store(Some(Arc::new(FiredActivations::new())));
            let fired = Arc::new(FiredRulesListener::new());
            session.add_event_listener(fired.clone());
            audit = Some(AuditGuard::open(session.as_mut(), target)?);
            listener = Some(fired);
        }

        Span::current().record("commands", commands.len());
        let executed = session.execute(BatchExecution::new(commands));
        drop(audit);
        drop(session);

        // 评估失败时保留失败前已触发的部分
        let fired_activations = listener.map(|listener| {
            let record = listener.take();
            self.last_fired.store(Some(Arc::new(record.clone())));
            record
        });
        let results = executed?;

        let response = self
            .transformer
            .transform(&results, queries.catalog())
            .map_err(|e| match e {
                AdapterError::Transformation(_) => e,
                other => AdapterError::Transformation(other.to_string()),
            })?;

        Ok(ExecutionOutcome {
            response,
            fired_activations,
        })
    }

    /// 最近一次执行的规则触发记录
    ///
    /// 首次执行前及诊断模式关闭时为 None。每次执行开始时重置，评估失败时只含
    /// 失败前触发的规则。多个线程同时执行时，返回值可能属于
    /// 任意一个最近完成的执行；需要确定归属时使用
    /// [`ExecutionOutcome::fired_activations`]。
    pub fn previously_fired_activations(&self) -> Option<Arc<FiredActivations>> {
        self.last_fired.load_full()
    }

    /// 替换查询目录，原有的查询命令缓存随之失效
    pub fn replace_query_catalog(&self, catalog: QueryCatalog) {
        info!(queries = catalog.len(), "查询目录已替换");
        self.queries.store(Arc::new(QueryCommandCache::new(catalog)));
    }

    pub fn query_catalog(&self) -> QueryCatalog {
        self.queries.load().catalog().clone()
    }

    /// 查询命令缓存的构建次数
    pub fn query_cache_builds(&self) -> usize {
        self.query_cache_builds.load(Ordering::Relaxed)
    }

    pub fn diagnostics_enabled(&self) -> bool {
        self.audit_log.is_some()
    }

    pub fn audit_log(&self) -> Option<&Path> {
        self.audit_log.as_deref()
    }
}

/// 组件构建器
pub struct StatelessRuleComponentBuilder<Req, Resp> {
    knowledge: Option<Arc<dyn KnowledgeBaseProvider>>,
    command_list_builder: Option<Arc<dyn CommandListBuilder<Req>>>,
    transformer: Option<Arc<dyn ExecutionResultsTransformer<Resp>>>,
    catalog: Option<QueryCatalog>,
    audit_log: Option<PathBuf>,
}

impl<Req, Resp> StatelessRuleComponentBuilder<Req, Resp> {
    pub fn new() -> Self {
        Self {
            knowledge: None,
            command_list_builder: None,
            transformer: None,
            catalog: None,
            audit_log: None,
        }
    }

    pub fn knowledge_base_provider(
        mut self,
        provider: impl KnowledgeBaseProvider + 'static,
    ) -> Self {
        self.knowledge = Some(Arc::new(provider));
        self
    }

    /// 使用固定知识库
    pub fn knowledge_base(mut self, knowledge_base: impl KnowledgeBase + 'static) -> Self {
        self.knowledge = Some(Arc::new(StaticKnowledgeBase::new(knowledge_base)));
        self
    }

    pub fn command_list_builder(
        mut self,
        builder: impl CommandListBuilder<Req> + 'static,
    ) -> Self {
        self.command_list_builder = Some(Arc::new(builder));
        self
    }

    pub fn results_transformer(
        mut self,
        transformer: impl ExecutionResultsTransformer<Resp> + 'static,
    ) -> Self {
        self.transformer = Some(Arc::new(transformer));
        self
    }

    pub fn query_catalog(mut self, catalog: QueryCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// 设置审计日志路径并开启诊断模式
    ///
    /// 诊断模式会拖慢评估，只应在测试或排查问题时使用。
    pub fn audit_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.audit_log = Some(path.into());
        self
    }

    /// 应用配置文件中的适配器设置
    pub fn settings(mut self, settings: &AdapterSettings) -> Self {
        if let Some(path) = &settings.audit_log {
            self.audit_log = Some(path.clone());
        }
        self
    }

    pub fn build(self) -> Result<StatelessRuleComponent<Req, Resp>> {
        let knowledge = self
            .knowledge
            .ok_or_else(|| AdapterError::Configuration("缺少知识库提供者".to_string()))?;
        let command_list_builder = self
            .command_list_builder
            .ok_or_else(|| AdapterError::Configuration("缺少命令列表构建器".to_string()))?;
        let transformer = self
            .transformer
            .ok_or_else(|| AdapterError::Configuration("缺少执行结果转换器".to_string()))?;
        let catalog = self
            .catalog
            .ok_or_else(|| AdapterError::Configuration("缺少查询目录".to_string()))?;

        if let Some(path) = &self.audit_log {
            info!(audit_log = %path.display(), "诊断模式已开启，评估性能会下降");
        }

        Ok(StatelessRuleComponent {
            knowledge,
            command_list_builder,
            transformer,
            queries: ArcSwap::from_pointee(QueryCommandCache::new(catalog)),
            audit_log: self.audit_log,
            last_fired: ArcSwapOption::empty(),
            query_cache_builds: AtomicUsize::new(0),
        })
    }
}

impl<Req, Resp> Default for StatelessRuleComponentBuilder<Req, Resp> {
    fn default() -> Self {
        Self::new()
    }
}
