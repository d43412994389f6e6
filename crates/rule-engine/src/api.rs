//! 引擎契约
//!
//! 适配器只通过这里的 trait 与规则引擎交互：从知识库创建无状态会话、挂载监听器与
//! 审计日志、提交批量命令。任何引擎实现只要满足这些 trait 即可接入。

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::command::BatchExecution;
use crate::error::Result;
use crate::fact::{Fact, FactHandle};
use crate::results::ExecutionResults;

/// 已编译、可直接使用的规则库
pub trait KnowledgeBase: Send + Sync {
    /// 创建新的无状态会话
    ///
    /// 每个会话拥有独立的工作内存，会话之间不共享任何事实或规则状态。
    fn new_stateless_session(&self) -> Box<dyn StatelessSession>;
}

/// 无状态会话：一次批量提交即一次完整、隔离的评估
pub trait StatelessSession: Send {
    /// 挂载议程事件监听器，对之后的所有 execute 生效
    fn add_event_listener(&mut self, listener: Arc<dyn AgendaEventListener>);

    /// 打开写往 `target` 的审计日志
    ///
    /// 审计格式由引擎决定。返回的句柄必须在评估结束后关闭。
    fn new_audit_logger(&mut self, target: &Path) -> Result<Box<dyn AuditLogger>>;

    /// 按顺序执行批量命令并返回所有带输出标识的结果
    fn execute(&mut self, batch: BatchExecution) -> Result<ExecutionResults>;
}

/// 议程事件监听器
///
/// 回调在评估线程上同步调用，实现应尽量轻量。
pub trait AgendaEventListener: Send + Sync {
    fn before_activation_fired(&self, _event: &ActivationEvent) {}

    fn after_activation_fired(&self, _event: &ActivationEvent) {}

    fn object_inserted(&self, _event: &ObjectInsertedEvent) {}
}

/// 审计日志句柄
pub trait AuditLogger: Send {
    /// 刷新并关闭底层写入端，重复调用无副作用
    fn close(&mut self) -> Result<()>;
}

/// 规则激活（一条规则与一组满足其模式的事实）触发事件
#[derive(Debug, Clone, Serialize)]
pub struct ActivationEvent {
    pub rule_id: String,
    pub rule_name: String,
    pub salience: i32,
    /// 本次评估内的触发序号，从 1 开始
    pub sequence: u64,
    /// 按模式顺序匹配到的事实句柄
    pub handles: Vec<FactHandle>,
    /// 按模式顺序匹配到的事实
    pub facts: Vec<Fact>,
    pub fired_at: DateTime<Utc>,
}

/// 事实插入事件
#[derive(Debug, Clone, Serialize)]
pub struct ObjectInsertedEvent {
    pub handle: FactHandle,
    pub fact: Fact,
    /// 由规则动作插入时为该规则名称，由命令插入时为空
    pub inserted_by: Option<String>,
}
