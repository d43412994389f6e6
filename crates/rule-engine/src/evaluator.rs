//! 约束评估器
//!
//! `ConditionEvaluator` 实现各操作符的比较逻辑；`MatchScope` 负责在匹配过程中
//! 解析约束值里的绑定、查询参数与全局变量引用。

use crate::error::{EngineError, Result};
use crate::fact::Fact;
use crate::models::{Condition, LogicalGroup, RuleNode};
use crate::operators::{LogicalOperator, Operator};
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;

/// 匹配作用域
///
/// 按模式顺序记录已绑定的事实，引用解析规则：
/// - `$bind` 或 `$bind.path`：已绑定事实的数据或字段，字段缺失时为 null
/// - `?param`：查询参数
/// - `@name`：全局变量
///
/// 名称未知的引用按字面量处理。
#[derive(Debug, Clone, Default)]
pub struct MatchScope<'a> {
    bindings: Vec<(&'a str, &'a Fact)>,
    parameters: Option<&'a HashMap<String, Value>>,
    globals: Option<&'a HashMap<String, Value>>,
}

impl<'a> MatchScope<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameters(mut self, parameters: &'a HashMap<String, Value>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_globals(mut self, globals: &'a HashMap<String, Value>) -> Self {
        self.globals = Some(globals);
        self
    }

    pub fn push_binding(&mut self, name: &'a str, fact: &'a Fact) {
        self.bindings.push((name, fact));
    }

    pub fn pop_binding(&mut self) {
        self.bindings.pop();
    }

    pub fn binding(&self, name: &str) -> Option<&'a Fact> {
        self.bindings
            .iter()
            .rev()
            .find(|(bound, _)| *bound == name)
            .map(|(_, fact)| *fact)
    }

    /// 解析单个值中的引用
    pub fn resolve<'v>(&self, value: &'v Value) -> Cow<'v, Value>
    where
        'a: 'v,
    {
        let Value::String(s) = value else {
            return Cow::Borrowed(value);
        };

        if s.starts_with('$') {
            let (head, path) = match s.split_once('.') {
                Some((head, path)) => (head, path),
                None => (s.as_str(), ""),
            };
            if let Some(fact) = self.binding(head) {
                return match fact.get_field(path) {
                    Some(v) => Cow::Borrowed(v),
                    None => Cow::Owned(Value::Null),
                };
            }
        } else if let Some(name) = s.strip_prefix('?') {
            if let Some(v) = self.parameters.and_then(|p| p.get(name)) {
                return Cow::Borrowed(v);
            }
        } else if let Some(name) = s.strip_prefix('@') {
            if let Some(v) = self.globals.and_then(|g| g.get(name)) {
                return Cow::Borrowed(v);
            }
        }

        Cow::Borrowed(value)
    }

    /// 递归解析对象、数组中的所有引用，用于构造动作插入的事实数据
    pub fn resolve_deep(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_deep(v)))
                    .collect(),
            ),
            Value::Array(arr) => Value::Array(arr.iter().map(|v| self.resolve_deep(v)).collect()),
            other => self.resolve(other).into_owned(),
        }
    }

    /// 评估事实是否满足约束树（短路求值）
    pub fn matches(&self, node: &RuleNode, fact: &Fact) -> Result<bool> {
        match node {
            RuleNode::Condition(cond) => self.matches_condition(cond, fact),
            RuleNode::Group(group) => self.matches_group(group, fact),
        }
    }

    fn matches_condition(&self, cond: &Condition, fact: &Fact) -> Result<bool> {
        let expected = self.resolve(&cond.value);
        ConditionEvaluator::evaluate(fact.get_field(&cond.field), cond.operator, &expected)
    }

    fn matches_group(&self, group: &LogicalGroup, fact: &Fact) -> Result<bool> {
        match group.operator {
            LogicalOperator::And => {
                for child in &group.children {
                    if !self.matches(child, fact)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            LogicalOperator::Or => {
                for child in &group.children {
                    if self.matches(child, fact)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估条件
    ///
    /// # Arguments
    /// * `field_value` - 从事实中取出的字段值
    /// * `operator` - 操作符
    /// * `expected_value` - 引用解析之后的期望值
    pub fn evaluate(
        field_value: Option<&Value>,
        operator: Operator,
        expected_value: &Value,
    ) -> Result<bool> {
        // 字段不存在时只有 is_empty 匹配
        let Some(field_value) = field_value else {
            return Ok(operator == Operator::IsEmpty);
        };

        match operator {
            Operator::IsEmpty => Ok(Self::is_empty(field_value)),
            Operator::IsNotEmpty => Ok(!Self::is_empty(field_value)),
            Operator::Eq => Ok(Self::eq(field_value, expected_value)),
            Operator::Neq => Ok(!Self::eq(field_value, expected_value)),
            Operator::Gt => Self::compare(field_value, expected_value, |a, b| a > b),
            Operator::Gte => Self::compare(field_value, expected_value, |a, b| a >= b),
            Operator::Lt => Self::compare(field_value, expected_value, |a, b| a < b),
            Operator::Lte => Self::compare(field_value, expected_value, |a, b| a <= b),
            Operator::Between => Self::between(field_value, expected_value),
            Operator::In => Self::in_list(field_value, expected_value),
            Operator::NotIn => Self::in_list(field_value, expected_value).map(|r| !r),
            Operator::Contains => Self::contains(field_value, expected_value),
            Operator::StartsWith => {
                Self::str_pair(field_value, expected_value).map(|(s, p)| s.starts_with(p))
            }
            Operator::EndsWith => {
                Self::str_pair(field_value, expected_value).map(|(s, p)| s.ends_with(p))
            }
            Operator::Regex => Self::regex_match(field_value, expected_value),
        }
    }

    fn is_empty(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(arr) => arr.is_empty(),
            Value::Object(obj) => obj.is_empty(),
            _ => false,
        }
    }

    /// 相等比较，数值统一按浮点数比较（100 == 100.0）
    fn eq(field: &Value, expected: &Value) -> bool {
        if let (Value::Number(a), Value::Number(b)) = (field, expected) {
            if let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) {
                return (a - b).abs() < f64::EPSILON;
            }
        }
        field == expected
    }

    fn compare<F>(field: &Value, expected: &Value, cmp: F) -> Result<bool>
    where
        F: Fn(f64, f64) -> bool,
    {
        let field_num = Self::number(field)?;
        let expected_num = Self::number(expected)?;
        Ok(cmp(field_num, expected_num))
    }

    /// expected 应为 [min, max] 数组，闭区间
    fn between(field: &Value, expected: &Value) -> Result<bool> {
        let arr = Self::array(expected)?;
        if arr.len() != 2 {
            return Err(EngineError::TypeMismatch {
                expected: "array [min, max]".to_string(),
                actual: format!("array of {}", arr.len()),
            });
        }

        let value = Self::number(field)?;
        Ok(value >= Self::number(&arr[0])? && value <= Self::number(&arr[1])?)
    }

    fn in_list(field: &Value, expected: &Value) -> Result<bool> {
        Ok(Self::array(expected)?
            .iter()
            .any(|item| Self::eq(field, item)))
    }

    fn contains(field: &Value, expected: &Value) -> Result<bool> {
        match field {
            Value::String(s) => {
                let needle = expected.as_str().ok_or_else(|| Self::mismatch("string", expected))?;
                Ok(s.contains(needle))
            }
            Value::Array(arr) => Ok(arr.iter().any(|item| Self::eq(item, expected))),
            _ => Err(Self::mismatch("string or array", field)),
        }
    }

    fn regex_match(field: &Value, expected: &Value) -> Result<bool> {
        let (s, pattern) = Self::str_pair(field, expected)?;
        let regex = Regex::new(pattern).map_err(|e| {
            EngineError::ParseError(format!("无效的正则表达式 '{}': {}", pattern, e))
        })?;
        Ok(regex.is_match(s))
    }

    fn str_pair<'v>(field: &'v Value, expected: &'v Value) -> Result<(&'v str, &'v str)> {
        let s = field.as_str().ok_or_else(|| Self::mismatch("string", field))?;
        let other = expected
            .as_str()
            .ok_or_else(|| Self::mismatch("string", expected))?;
        Ok((s, other))
    }

    fn number(value: &Value) -> Result<f64> {
        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        };
        number.ok_or_else(|| Self::mismatch("number", value))
    }

    fn array(value: &Value) -> Result<&Vec<Value>> {
        value.as_array().ok_or_else(|| Self::mismatch("array", value))
    }

    fn mismatch(expected: &str, actual: &Value) -> EngineError {
        EngineError::TypeMismatch {
            expected: expected.to_string(),
            actual: Self::type_name(actual).to_string(),
        }
    }

    fn type_name(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}
