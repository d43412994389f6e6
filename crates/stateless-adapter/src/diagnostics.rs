//! 诊断模式：规则触发记录与审计日志
//!
//! 只有配置了审计日志路径时才开启。每次执行创建新的触发记录，
//! 记录按规则名归组，组内按触发顺序排列。

use std::collections::HashMap;
use std::mem;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rule_engine::{ActivationEvent, AgendaEventListener, AuditLogger, StatelessSession};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{AdapterError, Result};

/// 一次执行中的规则触发记录：规则名 -> 触发事件
#[derive(Debug, Clone, Default, Serialize)]
pub struct FiredActivations {
    by_rule: HashMap<String, Vec<ActivationEvent>>,
}

impl FiredActivations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: ActivationEvent) {
        self.by_rule
            .entry(event.rule_name.clone())
            .or_default()
            .push(event);
    }

    pub fn get(&self, rule_name: &str) -> Option<&[ActivationEvent]> {
        self.by_rule.get(rule_name).map(Vec::as_slice)
    }

    /// 某条规则的触发次数
    pub fn fired_count(&self, rule_name: &str) -> usize {
        self.by_rule.get(rule_name).map_or(0, Vec::len)
    }

    pub fn contains(&self, rule_name: &str) -> bool {
        self.by_rule.contains_key(rule_name)
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.by_rule.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ActivationEvent])> {
        self.by_rule
            .iter()
            .map(|(name, events)| (name.as_str(), events.as_slice()))
    }

    /// 所有规则的触发总数
    pub fn total_fired(&self) -> usize {
        self.by_rule.values().map(Vec::len).sum()
    }

    /// 触发过的规则数
    pub fn len(&self) -> usize {
        self.by_rule.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_rule.is_empty()
    }

    pub fn into_inner(self) -> HashMap<String, Vec<ActivationEvent>> {
        self.by_rule
    }
}

/// 收集规则触发事件的监听器，每次执行新建一个
#[derive(Default)]
pub(crate) struct FiredRulesListener {
    record: Mutex<FiredActivations>,
}

impl FiredRulesListener {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 取走已收集的记录
    pub(crate) fn take(&self) -> FiredActivations {
        mem::take(&mut *self.record.lock())
    }
}

impl AgendaEventListener for FiredRulesListener {
    fn after_activation_fired(&self, event: &ActivationEvent) {
        self.record.lock().record(event.clone());
    }
}

/// 审计日志守卫，离开作用域时关闭日志
///
/// 关闭失败只记录告警，不影响执行结果。
pub(crate) struct AuditGuard {
    logger: Option<Box<dyn AuditLogger>>,
    target: PathBuf,
}

impl AuditGuard {
    pub(crate) fn open(session: &mut dyn StatelessSession, target: &Path) -> Result<Self> {
        let logger = session.new_audit_logger(target).map_err(|e| {
            AdapterError::Configuration(format!(
                "无法打开审计日志 {}: {}",
                target.display(),
                e
            ))
        })?;

        Ok(Self {
            logger: Some(logger),
            target: target.to_path_buf(),
        })
    }
}

impl Drop for AuditGuard {
    fn drop(&mut self) {
        let Some(mut logger) = self.logger.take() else {
            return;
        };

        match logger.close() {
            Ok(()) => debug!(path = %self.target.display(), "审计日志已关闭"),
            Err(e) => warn!(
                path = %self.target.display(),
                error = %e,
                "审计日志关闭失败"
            ),
        }
    }
}
