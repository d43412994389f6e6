//! 无状态规则适配器
//!
//! 通过稳定的请求/响应契约调用规则引擎，屏蔽引擎原生的会话、命令与结果 API。
//! 使用方需要提供四样东西：
//! - 知识库（[`KnowledgeBaseProvider`]）
//! - 请求到命令列表的转换（[`CommandListBuilder`]）
//! - 需要从会话中取回的数据，全部声明为查询（[`QueryCatalog`]）
//! - 执行结果到响应的转换（[`ExecutionResultsTransformer`]）
//!
//! 配置审计日志路径即开启诊断模式，捕获每次执行中触发的规则。
//!
//! ```ignore
//! let component = StatelessRuleComponent::builder()
//!     .knowledge_base(knowledge_base)
//!     .command_list_builder(InsertAllCommandListBuilder)
//!     .results_transformer(QueryResultsTransformer)
//!     .query_catalog(QueryCatalog::new([QueryDeclaration::new("fired_rules", "fired")])?)
//!     .build()?;
//!
//! let outcome = component.execute(&request)?;
//! ```

pub mod command_list;
pub mod component;
pub mod diagnostics;
pub mod error;
pub mod knowledge;
pub mod query;
pub mod request;
pub mod transformer;

pub use command_list::{CommandListBuilder, InsertAllCommandListBuilder};
pub use component::{ExecutionOutcome, StatelessRuleComponent, StatelessRuleComponentBuilder};
pub use diagnostics::FiredActivations;
pub use error::{AdapterError, Result};
pub use knowledge::{KnowledgeBaseProvider, ReloadableKnowledgeBase, StaticKnowledgeBase};
pub use query::{QueryCatalog, QueryDeclaration};
pub use request::{FactRequest, FactSource};
pub use transformer::{ExecutionResultsTransformer, QueryResponse, QueryResultsTransformer};
