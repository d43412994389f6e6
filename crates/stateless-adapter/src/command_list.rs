//! 业务命令列表构建

use rule_engine::Command;
use tracing::warn;

use crate::error::Result;
use crate::request::FactSource;

/// 把请求转换为有序的业务命令列表
///
/// 查询命令由适配器在其后追加，构建器只负责插入事实与业务命令。
pub trait CommandListBuilder<Req>: Send + Sync {
    fn build_business_logic_command_list(&self, request: &Req) -> Result<Vec<Command>>;
}

impl<Req, F> CommandListBuilder<Req> for F
where
    F: Fn(&Req) -> Result<Vec<Command>> + Send + Sync,
{
    fn build_business_logic_command_list(&self, request: &Req) -> Result<Vec<Command>> {
        self(request)
    }
}

#[cfg(test)]
mockall::mock! {
    pub CommandListBuilder<Req: Send + Sync + 'static> {}

    impl<Req: Send + Sync + 'static> CommandListBuilder<Req> for CommandListBuilder<Req> {
        fn build_business_logic_command_list(&self, request: &Req) -> Result<Vec<Command>>;
    }
}

/// 插入请求中的全部事实并触发规则
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertAllCommandListBuilder;

impl<Req: FactSource> CommandListBuilder<Req> for InsertAllCommandListBuilder {
    fn build_business_logic_command_list(&self, request: &Req) -> Result<Vec<Command>> {
        let facts = request.all_facts();
        if facts.is_empty() {
            warn!("请求中没有任何事实，本次评估不会匹配任何规则");
        }

        Ok(vec![
            Command::insert_elements(facts),
            Command::fire_all_rules(),
        ])
    }
}
