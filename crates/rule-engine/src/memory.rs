//! 内存规则引擎
//!
//! `MemoryKnowledgeBase` 持有编译后的规则包，每个会话的每次 execute 都在全新的
//! 工作内存上完成，评估之间不共享事实、全局变量或触发状态。
//!
//! 触发策略：
//! - 激活是一条规则与一组按模式顺序满足约束的事实，同一事实在一个激活中只出现一次
//! - 每次选择优先级最高的规则，同优先级按声明顺序，规则内按事实插入顺序
//! - 同一规则与同一组事实只触发一次
//! - 批次结束时若仍有未触发的插入，自动触发到静止

use crate::api::{
    ActivationEvent, AgendaEventListener, AuditLogger, KnowledgeBase, ObjectInsertedEvent,
    StatelessSession,
};
use crate::audit::FileAuditLogger;
use crate::command::{BatchExecution, Command};
use crate::compiler::CompiledPackage;
use crate::error::{EngineError, Result};
use crate::evaluator::MatchScope;
use crate::fact::{Fact, FactHandle};
use crate::models::{Action, Pattern};
use crate::results::{ExecutionOutput, ExecutionResults, QueryResults, QueryRow};
use adapter_shared::observability::metrics as engine_metrics;
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, trace};

/// 内存知识库
#[derive(Clone, Debug)]
pub struct MemoryKnowledgeBase {
    package: Arc<CompiledPackage>,
    max_firings: Option<usize>,
}

impl MemoryKnowledgeBase {
    pub(crate) fn new(package: Arc<CompiledPackage>, max_firings: Option<usize>) -> Self {
        Self {
            package,
            max_firings,
        }
    }

    pub fn package(&self) -> &CompiledPackage {
        &self.package
    }

    pub fn name(&self) -> &str {
        &self.package.name
    }

    pub fn rule_count(&self) -> usize {
        self.package.rules.len()
    }

    pub fn query_count(&self) -> usize {
        self.package.queries.len()
    }

    /// 创建具体类型的会话
    pub fn session(&self) -> MemorySession {
        MemorySession {
            package: Arc::clone(&self.package),
            max_firings: self.max_firings,
            listeners: Vec::new(),
        }
    }
}

impl KnowledgeBase for MemoryKnowledgeBase {
    fn new_stateless_session(&self) -> Box<dyn StatelessSession> {
        Box::new(self.session())
    }
}

/// 内存无状态会话
pub struct MemorySession {
    package: Arc<CompiledPackage>,
    max_firings: Option<usize>,
    listeners: Vec<Arc<dyn AgendaEventListener>>,
}

impl MemorySession {
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl StatelessSession for MemorySession {
    fn add_event_listener(&mut self, listener: Arc<dyn AgendaEventListener>) {
        self.listeners.push(listener);
    }

    fn new_audit_logger(&mut self, target: &Path) -> Result<Box<dyn AuditLogger>> {
        let logger = FileAuditLogger::create(target)?;
        self.listeners.push(logger.listener());
        Ok(Box::new(logger))
    }

    #[instrument(skip_all, fields(package = %self.package.name, commands = batch.len()))]
    fn execute(&mut self, batch: BatchExecution) -> Result<ExecutionResults> {
        let start = Instant::now();

        let mut memory = WorkingMemory::new(&self.package, &self.listeners, self.max_firings);
        let results = memory.run(batch)?;

        let elapsed = start.elapsed();
        engine_metrics::record_engine_batch(memory.sequence, elapsed.as_secs_f64());
        debug!(
            facts = memory.facts.len(),
            fired = memory.sequence,
            elapsed_ms = elapsed.as_millis() as u64,
            "批量命令执行完成"
        );

        Ok(results)
    }
}

/// 一次评估的工作内存
struct WorkingMemory<'s> {
    package: &'s CompiledPackage,
    listeners: &'s [Arc<dyn AgendaEventListener>],
    max_firings: Option<usize>,
    /// 按插入顺序排列，只追加
    facts: Vec<(FactHandle, Fact)>,
    index: HashMap<Fact, FactHandle>,
    globals: HashMap<String, Value>,
    /// 已触发的（规则下标, 事实句柄）组合
    fired: HashSet<(usize, Vec<FactHandle>)>,
    /// 规则下标，按优先级降序、声明顺序升序
    agenda_order: Vec<usize>,
    sequence: u64,
    /// 上次触发之后是否有命令插入
    pending: bool,
}

/// 选中待触发的激活
struct Activation {
    rule: usize,
    tuple: Vec<usize>,
    inserts: Vec<Fact>,
}

impl<'s> WorkingMemory<'s> {
    fn new(
        package: &'s CompiledPackage,
        listeners: &'s [Arc<dyn AgendaEventListener>],
        max_firings: Option<usize>,
    ) -> Self {
        let mut agenda_order: Vec<usize> = (0..package.rules.len()).collect();
        agenda_order.sort_by(|&a, &b| {
            let (a, b) = (&package.rules[a], &package.rules[b]);
            b.salience().cmp(&a.salience()).then(a.order.cmp(&b.order))
        });

        Self {
            package,
            listeners,
            max_firings,
            facts: Vec::new(),
            index: HashMap::new(),
            globals: HashMap::new(),
            fired: HashSet::new(),
            agenda_order,
            sequence: 0,
            pending: false,
        }
    }

    fn run(&mut self, batch: BatchExecution) -> Result<ExecutionResults> {
        let mut results = ExecutionResults::new();

        for command in batch.commands {
            match command {
                Command::Insert {
                    fact,
                    out_identifier,
                } => {
                    let handle = self.insert(fact, None);
                    self.pending = true;
                    if let Some(out) = out_identifier {
                        results.insert(out, ExecutionOutput::Handle(handle));
                    }
                }
                Command::InsertElements {
                    facts,
                    out_identifier,
                } => {
                    let handles: Vec<FactHandle> =
                        facts.into_iter().map(|fact| self.insert(fact, None)).collect();
                    self.pending = true;
                    if let Some(out) = out_identifier {
                        results.insert(out, ExecutionOutput::Handles(handles));
                    }
                }
                Command::SetGlobal {
                    identifier,
                    value,
                    out,
                } => {
                    if out {
                        results.insert(identifier.clone(), ExecutionOutput::Global(value.clone()));
                    }
                    self.globals.insert(identifier, value);
                }
                Command::FireAllRules {
                    max,
                    out_identifier,
                } => {
                    let fired = self.fire_all_rules(max)?;
                    if let Some(out) = out_identifier {
                        results.insert(out, ExecutionOutput::Fired(fired));
                    }
                }
                Command::Query {
                    out_identifier,
                    name,
                    arguments,
                } => {
                    let query_results = self.query(&name, &arguments)?;
                    results.insert(out_identifier, ExecutionOutput::Query(query_results));
                }
                Command::GetObjects {
                    kind,
                    out_identifier,
                } => {
                    let objects = self
                        .facts
                        .iter()
                        .filter(|(_, fact)| kind.as_deref().is_none_or(|k| fact.kind() == k))
                        .map(|(_, fact)| fact.clone())
                        .collect();
                    results.insert(out_identifier, ExecutionOutput::Objects(objects));
                }
            }
        }

        if self.pending {
            self.fire_all_rules(None)?;
        }

        Ok(results)
    }

    /// 插入事实；相等的事实已存在时返回原句柄且不产生事件
    fn insert(&mut self, fact: Fact, inserted_by: Option<&str>) -> FactHandle {
        if let Some(handle) = self.index.get(&fact) {
            return *handle;
        }

        let handle = FactHandle::new(self.facts.len() as u64 + 1);
        self.index.insert(fact.clone(), handle);

        if !self.listeners.is_empty() {
            let event = ObjectInsertedEvent {
                handle,
                fact: fact.clone(),
                inserted_by: inserted_by.map(str::to_string),
            };
            for listener in self.listeners {
                listener.object_inserted(&event);
            }
        }

        trace!(%handle, %fact, "事实已插入");
        self.facts.push((handle, fact));
        handle
    }

    /// 触发规则直到静止或达到 `max`，返回本次触发数量
    fn fire_all_rules(&mut self, max: Option<usize>) -> Result<usize> {
        self.pending = false;
        let mut fired = 0;

        loop {
            if max.is_some_and(|limit| fired >= limit) {
                break;
            }

            let Some(activation) = self.next_activation()? else {
                break;
            };

            if let Some(limit) = self.max_firings {
                if self.sequence as usize >= limit {
                    return Err(EngineError::FiringLimitExceeded(limit));
                }
            }

            self.fire(activation);
            fired += 1;
        }

        Ok(fired)
    }

    /// 按议程顺序找到第一个尚未触发的激活
    fn next_activation(&self) -> Result<Option<Activation>> {
        let mut scope = MatchScope::new().with_globals(&self.globals);

        for &rule_idx in &self.agenda_order {
            let rule = &self.package.rules[rule_idx];
            let mut found = None;

            search(
                &self.facts,
                rule.patterns(),
                &mut scope,
                &mut Vec::new(),
                &mut |tuple, scope| {
                    let handles: Vec<FactHandle> =
                        tuple.iter().map(|&i| self.facts[i].0).collect();
                    if self.fired.contains(&(rule_idx, handles)) {
                        return false;
                    }

                    let inserts = rule
                        .actions()
                        .iter()
                        .map(|action| match action {
                            Action::Insert { kind, data } => {
                                Fact::new(kind.clone(), scope.resolve_deep(data))
                            }
                        })
                        .collect();
                    found = Some(Activation {
                        rule: rule_idx,
                        tuple: tuple.to_vec(),
                        inserts,
                    });
                    true
                },
            )?;

            if found.is_some() {
                return Ok(found);
            }
        }

        Ok(None)
    }

    fn fire(&mut self, activation: Activation) {
        let rule = &self.package.rules[activation.rule];
        let handles: Vec<FactHandle> = activation
            .tuple
            .iter()
            .map(|&i| self.facts[i].0)
            .collect();

        self.sequence += 1;
        let event = ActivationEvent {
            rule_id: rule.id().to_string(),
            rule_name: rule.name().to_string(),
            salience: rule.salience(),
            sequence: self.sequence,
            handles: handles.clone(),
            facts: activation
                .tuple
                .iter()
                .map(|&i| self.facts[i].1.clone())
                .collect(),
            fired_at: Utc::now(),
        };

        for listener in self.listeners {
            listener.before_activation_fired(&event);
        }

        self.fired.insert((activation.rule, handles));
        for fact in activation.inserts {
            self.insert(fact, Some(&event.rule_name));
        }

        for listener in self.listeners {
            listener.after_activation_fired(&event);
        }

        debug!(
            rule = %event.rule_name,
            sequence = event.sequence,
            "规则已触发"
        );
    }

    fn query(&self, name: &str, arguments: &[Value]) -> Result<QueryResults> {
        let query = self
            .package
            .queries
            .get(name)
            .ok_or_else(|| EngineError::UnknownQuery(name.to_string()))?;

        if query.parameters().len() != arguments.len() {
            return Err(EngineError::QueryArity {
                name: name.to_string(),
                expected: query.parameters().len(),
                actual: arguments.len(),
            });
        }

        let parameters: HashMap<String, Value> = query
            .parameters()
            .iter()
            .cloned()
            .zip(arguments.iter().cloned())
            .collect();
        let mut scope = MatchScope::new()
            .with_parameters(&parameters)
            .with_globals(&self.globals);

        let mut results = QueryResults::new(name, query.identifiers.clone());
        search(
            &self.facts,
            query.patterns(),
            &mut scope,
            &mut Vec::new(),
            &mut |_, scope| {
                let values: BTreeMap<String, Fact> = query
                    .identifiers
                    .iter()
                    .filter_map(|id| scope.binding(id).map(|fact| (id.clone(), fact.clone())))
                    .collect();
                results.rows.push(QueryRow::new(values));
                false
            },
        )?;

        Ok(results)
    }
}

/// 深度优先枚举满足模式序列的事实组合
///
/// `visit` 收到按模式顺序的事实下标，返回 true 时停止搜索。
fn search<'a>(
    facts: &'a [(FactHandle, Fact)],
    patterns: &'a [Pattern],
    scope: &mut MatchScope<'a>,
    tuple: &mut Vec<usize>,
    visit: &mut dyn FnMut(&[usize], &MatchScope<'a>) -> bool,
) -> Result<bool> {
    let Some((pattern, rest)) = patterns.split_first() else {
        return Ok(visit(tuple, scope));
    };

    for (idx, (_, fact)) in facts.iter().enumerate() {
        if fact.kind() != pattern.kind || tuple.contains(&idx) {
            continue;
        }
        if let Some(constraint) = &pattern.constraint {
            if !scope.matches(constraint, fact)? {
                continue;
            }
        }

        tuple.push(idx);
        if let Some(bind) = &pattern.bind {
            scope.push_binding(bind, fact);
        }

        let stop = search(facts, rest, scope, tuple, visit)?;

        if pattern.bind.is_some() {
            scope.pop_binding();
        }
        tuple.pop();

        if stop {
            return Ok(true);
        }
    }

    Ok(false)
}
