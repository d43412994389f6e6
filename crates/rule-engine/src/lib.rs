//! 规则引擎
//!
//! 分两部分：
//! - 引擎契约（`api` / `command` / `results` / `fact`）：无状态会话、批量命令、执行结果、
//!   规则触发事件与审计日志的抽象，适配器只依赖这一层
//! - 内存参考实现（`compiler` / `memory` / `evaluator` / `audit`）：JSON 规则包编译、
//!   朴素模式匹配、按优先级触发、查询与 JSON Lines 审计日志

pub mod api;
pub mod audit;
pub mod command;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod fact;
pub mod memory;
pub mod models;
pub mod operators;
pub mod results;

pub use api::{
    ActivationEvent, AgendaEventListener, AuditLogger, KnowledgeBase, ObjectInsertedEvent,
    StatelessSession,
};
pub use audit::FileAuditLogger;
pub use command::{BatchExecution, Command};
pub use compiler::KnowledgeBaseCompiler;
pub use error::{EngineError, Result};
pub use evaluator::{ConditionEvaluator, MatchScope};
pub use fact::{Fact, FactHandle, FactSet};
pub use memory::{MemoryKnowledgeBase, MemorySession};
pub use models::{
    Action, Condition, LogicalGroup, Pattern, QueryDefinition, RuleDefinition, RuleNode,
    RulePackage,
};
pub use operators::{LogicalOperator, Operand, Operator};
pub use results::{ExecutionOutput, ExecutionResults, QueryResults, QueryRow};
