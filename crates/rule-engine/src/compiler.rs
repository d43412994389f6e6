//! 规则包编译器
//!
//! 将 JSON 规则包解析、校验并编译为内存知识库。校验覆盖结构完整性、
//! 操作符与值的兼容性，以及绑定和查询参数引用的合法性。

use crate::error::{EngineError, Result};
use crate::memory::MemoryKnowledgeBase;
use crate::models::{Action, Condition, Pattern, QueryDefinition, RuleDefinition, RuleNode, RulePackage};
use crate::operators::Operand;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument};

/// 编译后的规则
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub definition: RuleDefinition,
    /// 声明顺序，同优先级时先声明的先触发
    pub order: usize,
    /// 约束中使用的所有字段路径
    pub required_fields: HashSet<String>,
}

impl CompiledRule {
    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn salience(&self) -> i32 {
        self.definition.salience
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.definition.when
    }

    pub fn actions(&self) -> &[Action] {
        &self.definition.then
    }
}

/// 编译后的查询
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub definition: QueryDefinition,
    /// 结果行中可用的绑定名，按模式顺序
    pub identifiers: Vec<String>,
}

impl CompiledQuery {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn parameters(&self) -> &[String] {
        &self.definition.parameters
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.definition.when
    }
}

/// 编译后的规则包
#[derive(Debug)]
pub struct CompiledPackage {
    pub name: String,
    pub rules: Vec<CompiledRule>,
    pub queries: HashMap<String, CompiledQuery>,
    /// 编译版本号，每次编译递增
    pub compile_version: u64,
}

/// 规则包编译器
pub struct KnowledgeBaseCompiler {
    compile_version: u64,
    max_firings: Option<usize>,
}

impl KnowledgeBaseCompiler {
    pub fn new() -> Self {
        Self {
            compile_version: 0,
            max_firings: None,
        }
    }

    /// 设置单次评估的规则触发上限，超过时评估失败
    pub fn with_max_firings(mut self, max_firings: Option<usize>) -> Self {
        self.max_firings = max_firings;
        self
    }

    /// 从 JSON 字符串编译
    pub fn compile_from_json(&mut self, json: &str) -> Result<MemoryKnowledgeBase> {
        let package: RulePackage =
            serde_json::from_str(json).map_err(|e| EngineError::ParseError(e.to_string()))?;
        self.compile(package)
    }

    /// 编译规则包
    #[instrument(skip(self, package), fields(package = %package.name))]
    pub fn compile(&mut self, package: RulePackage) -> Result<MemoryKnowledgeBase> {
        if package.name.is_empty() {
            return Err(EngineError::ParseError("规则包名称不能为空".to_string()));
        }

        let mut rule_ids = HashSet::new();
        let mut rules = Vec::with_capacity(package.rules.len());
        for (order, rule) in package.rules.into_iter().enumerate() {
            self.validate_rule(&rule)?;
            if !rule_ids.insert(rule.id.clone()) {
                return Err(EngineError::CompileError(format!(
                    "规则 ID 重复: {}",
                    rule.id
                )));
            }

            let mut required_fields = HashSet::new();
            for pattern in &rule.when {
                if let Some(constraint) = &pattern.constraint {
                    Self::collect_fields(constraint, &mut required_fields);
                }
            }

            rules.push(CompiledRule {
                definition: rule,
                order,
                required_fields,
            });
        }

        let mut queries = HashMap::with_capacity(package.queries.len());
        for query in package.queries {
            let identifiers = self.validate_query(&query)?;
            if queries.contains_key(&query.name) {
                return Err(EngineError::CompileError(format!(
                    "查询名称重复: {}",
                    query.name
                )));
            }
            queries.insert(
                query.name.clone(),
                CompiledQuery {
                    definition: query,
                    identifiers,
                },
            );
        }

        self.compile_version += 1;

        info!(
            rules = rules.len(),
            queries = queries.len(),
            compile_version = self.compile_version,
            "规则包编译完成"
        );

        let package = CompiledPackage {
            name: package.name,
            rules,
            queries,
            compile_version: self.compile_version,
        };

        Ok(MemoryKnowledgeBase::new(Arc::new(package), self.max_firings))
    }

    fn validate_rule(&self, rule: &RuleDefinition) -> Result<()> {
        if rule.id.is_empty() {
            return Err(EngineError::ParseError("规则 ID 不能为空".to_string()));
        }
        if rule.name.is_empty() {
            return Err(EngineError::ParseError(format!(
                "规则 '{}' 的名称不能为空",
                rule.id
            )));
        }

        let path = format!("rule[{}]", rule.id);
        let bindings = self.validate_patterns(&rule.when, &path, None)?;

        for (i, action) in rule.then.iter().enumerate() {
            let action_path = format!("{}.then[{}]", path, i);
            match action {
                Action::Insert { kind, data } => {
                    if kind.is_empty() {
                        return Err(EngineError::ParseError(format!(
                            "动作 '{}' 的事实类型不能为空",
                            action_path
                        )));
                    }
                    Self::validate_references(data, &bindings, &action_path)?;
                }
            }
        }

        Ok(())
    }

    fn validate_query(&self, query: &QueryDefinition) -> Result<Vec<String>> {
        if query.name.is_empty() {
            return Err(EngineError::ParseError("查询名称不能为空".to_string()));
        }

        let mut seen = HashSet::new();
        for param in &query.parameters {
            if param.is_empty() || !seen.insert(param.as_str()) {
                return Err(EngineError::CompileError(format!(
                    "查询 '{}' 的参数名为空或重复: '{}'",
                    query.name, param
                )));
            }
        }

        let path = format!("query[{}]", query.name);
        self.validate_patterns(&query.when, &path, Some(query.parameters.as_slice()))
    }

    /// 校验模式列表，返回按顺序出现的绑定名
    fn validate_patterns(
        &self,
        patterns: &[Pattern],
        path: &str,
        parameters: Option<&[String]>,
    ) -> Result<Vec<String>> {
        if patterns.is_empty() {
            return Err(EngineError::ParseError(format!(
                "'{}' 至少需要一个模式",
                path
            )));
        }

        let mut bindings: Vec<String> = Vec::new();
        for (i, pattern) in patterns.iter().enumerate() {
            let pattern_path = format!("{}.when[{}]", path, i);
            if pattern.kind.is_empty() {
                return Err(EngineError::ParseError(format!(
                    "模式 '{}' 的事实类型不能为空",
                    pattern_path
                )));
            }

            if let Some(constraint) = &pattern.constraint {
                self.validate_node(constraint, &pattern_path, &bindings, parameters)?;
            }

            if let Some(bind) = &pattern.bind {
                if Self::binding_head(bind) != Some(bind.as_str()) {
                    return Err(EngineError::ParseError(format!(
                        "模式 '{}' 的绑定名 '{}' 必须以 $ 开头且只包含字母数字下划线",
                        pattern_path, bind
                    )));
                }
                if bindings.contains(bind) {
                    return Err(EngineError::CompileError(format!(
                        "模式 '{}' 的绑定名 '{}' 重复",
                        pattern_path, bind
                    )));
                }
                bindings.push(bind.clone());
            }
        }

        Ok(bindings)
    }

    fn validate_node(
        &self,
        node: &RuleNode,
        path: &str,
        bindings: &[String],
        parameters: Option<&[String]>,
    ) -> Result<()> {
        match node {
            RuleNode::Condition(cond) => self.validate_condition(cond, path, bindings, parameters),
            RuleNode::Group(group) => {
                if group.children.is_empty() {
                    return Err(EngineError::ParseError(format!(
                        "逻辑组 '{}' 不能为空",
                        path
                    )));
                }

                for (i, child) in group.children.iter().enumerate() {
                    let child_path = format!("{}.children[{}]", path, i);
                    self.validate_node(child, &child_path, bindings, parameters)?;
                }
                Ok(())
            }
        }
    }

    fn validate_condition(
        &self,
        cond: &Condition,
        path: &str,
        bindings: &[String],
        parameters: Option<&[String]>,
    ) -> Result<()> {
        if cond.field.is_empty() {
            return Err(EngineError::ParseError(format!(
                "条件 '{}' 的字段不能为空",
                path
            )));
        }

        Self::validate_references(&cond.value, bindings, path)?;

        if let (Some(parameters), Some(param)) = (parameters, cond.value.as_str().and_then(|s| s.strip_prefix('?'))) {
            if !parameters.iter().any(|p| p == param) {
                return Err(EngineError::UnboundReference(format!(
                    "条件 '{}' 引用了未声明的查询参数 '?{}'",
                    path, param
                )));
            }
        }

        // 引用值在运行期才确定，只校验字面量
        if Self::is_reference(&cond.value) {
            return Ok(());
        }

        match cond.operator.operand() {
            Operand::Range => match &cond.value {
                Value::Array(arr) if arr.len() == 2 => {}
                _ => {
                    return Err(EngineError::ParseError(format!(
                        "条件 '{}' 的 {} 操作符需要 [min, max] 数组",
                        path, cond.operator
                    )));
                }
            },
            Operand::List => {
                if !cond.value.is_array() {
                    return Err(EngineError::ParseError(format!(
                        "条件 '{}' 的 {} 操作符需要数组值",
                        path, cond.operator
                    )));
                }
            }
            Operand::Pattern => {
                let pattern = cond.value.as_str().ok_or_else(|| {
                    EngineError::ParseError(format!(
                        "条件 '{}' 的 {} 操作符需要字符串值",
                        path, cond.operator
                    ))
                })?;
                regex::Regex::new(pattern).map_err(|e| {
                    EngineError::ParseError(format!("条件 '{}' 的正则表达式无效: {}", path, e))
                })?;
            }
            _ => {}
        }

        Ok(())
    }

    /// 校验值中的 `$bind` 引用只指向已出现的绑定
    fn validate_references(value: &Value, bindings: &[String], path: &str) -> Result<()> {
        match value {
            Value::String(s) => {
                if let Some(head) = Self::binding_head(s) {
                    if !bindings.iter().any(|b| b == head) {
                        return Err(EngineError::UnboundReference(format!(
                            "'{}' 引用了未绑定的事实 '{}'",
                            path, head
                        )));
                    }
                }
                Ok(())
            }
            Value::Array(arr) => arr
                .iter()
                .try_for_each(|v| Self::validate_references(v, bindings, path)),
            Value::Object(map) => map
                .values()
                .try_for_each(|v| Self::validate_references(v, bindings, path)),
            _ => Ok(()),
        }
    }

    /// 取出 `$name.path` 形式引用的绑定名部分；`$5` 之类的普通字符串返回 None
    fn binding_head(s: &str) -> Option<&str> {
        let rest = s.strip_prefix('$')?;
        let head_len = rest.find('.').unwrap_or(rest.len());
        let name = &rest[..head_len];
        let mut chars = name.chars();
        let first = chars.next()?;
        if !(first.is_alphabetic() || first == '_') {
            return None;
        }
        if !chars.all(|c| c.is_alphanumeric() || c == '_') {
            return None;
        }
        Some(&s[..head_len + 1])
    }

    fn is_reference(value: &Value) -> bool {
        match value.as_str() {
            Some(s) => Self::binding_head(s).is_some() || s.starts_with('?') || s.starts_with('@'),
            None => false,
        }
    }

    fn collect_fields(node: &RuleNode, fields: &mut HashSet<String>) {
        match node {
            RuleNode::Condition(cond) => {
                fields.insert(cond.field.clone());
            }
            RuleNode::Group(group) => {
                for child in &group.children {
                    Self::collect_fields(child, fields);
                }
            }
        }
    }
}

impl Default for KnowledgeBaseCompiler {
    fn default() -> Self {
        Self::new()
    }
}
