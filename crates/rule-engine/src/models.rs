//! 规则包领域模型
//!
//! 规则包是内存引擎的编译输入，JSON 形如：
//!
//! ```json
//! {
//!   "name": "pricing",
//!   "rules": [{
//!     "id": "gold-discount",
//!     "name": "gold_discount",
//!     "salience": 10,
//!     "when": [
//!       { "kind": "Customer", "bind": "$c",
//!         "constraint": { "type": "condition", "field": "tier", "operator": "eq", "value": "gold" } },
//!       { "kind": "Order", "bind": "$o",
//!         "constraint": { "type": "condition", "field": "customer_id", "operator": "eq", "value": "$c.id" } }
//!     ],
//!     "then": [{ "type": "insert", "kind": "Discount", "data": { "order": "$o.id", "percent": 10 } }]
//!   }],
//!   "queries": [{
//!     "name": "discounts_for",
//!     "parameters": ["order"],
//!     "when": [{ "kind": "Discount", "bind": "$d",
//!       "constraint": { "type": "condition", "field": "order", "operator": "eq", "value": "?order" } }]
//!   }]
//! }
//! ```
//!
//! 约束值与动作数据中的字符串引用：
//! - `$bind` / `$bind.path`：已匹配事实（或其字段），只能引用排在前面的模式
//! - `?param`：查询参数
//! - `@name`：全局变量

use crate::operators::{LogicalOperator, Operator};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 规则包
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulePackage {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
    #[serde(default)]
    pub queries: Vec<QueryDefinition>,
}

impl RulePackage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            queries: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: RuleDefinition) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_query(mut self, query: QueryDefinition) -> Self {
        self.queries.push(query);
        self
    }
}

/// 规则定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    pub name: String,
    /// 优先级，越大越先触发
    #[serde(default)]
    pub salience: i32,
    pub when: Vec<Pattern>,
    #[serde(default)]
    pub then: Vec<Action>,
}

impl RuleDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, when: Vec<Pattern>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            salience: 0,
            when,
            then: Vec::new(),
        }
    }

    pub fn with_salience(mut self, salience: i32) -> Self {
        self.salience = salience;
        self
    }

    pub fn then(mut self, action: Action) -> Self {
        self.then.push(action);
        self
    }
}

/// 查询定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    pub when: Vec<Pattern>,
}

impl QueryDefinition {
    pub fn new(name: impl Into<String>, when: Vec<Pattern>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            when,
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<String>) -> Self {
        self.parameters = parameters;
        self
    }
}

/// 模式：按类型匹配一个事实，可选约束与绑定名
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub kind: String,
    #[serde(default)]
    pub bind: Option<String>,
    #[serde(default)]
    pub constraint: Option<RuleNode>,
}

impl Pattern {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            bind: None,
            constraint: None,
        }
    }

    pub fn bind(mut self, name: impl Into<String>) -> Self {
        self.bind = Some(name.into());
        self
    }

    pub fn with_constraint(mut self, constraint: RuleNode) -> Self {
        self.constraint = Some(constraint);
        self
    }
}

/// 规则动作
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// 向工作内存插入新事实，数据中的引用在触发时解析
    Insert { kind: String, data: Value },
}

impl Action {
    pub fn insert(kind: impl Into<String>, data: Value) -> Self {
        Self::Insert {
            kind: kind.into(),
            data,
        }
    }
}

/// 约束节点（条件或逻辑组）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleNode {
    Condition(Condition),
    Group(LogicalGroup),
}

/// 条件节点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// 逻辑组节点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalGroup {
    pub operator: LogicalOperator,
    pub children: Vec<RuleNode>,
}

impl LogicalGroup {
    pub fn new(operator: LogicalOperator, children: Vec<RuleNode>) -> Self {
        Self { operator, children }
    }

    pub fn and(children: Vec<RuleNode>) -> Self {
        Self::new(LogicalOperator::And, children)
    }

    pub fn or(children: Vec<RuleNode>) -> Self {
        Self::new(LogicalOperator::Or, children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_deserialization() {
        let json = r#"
        {
            "name": "pricing",
            "rules": [
                {
                    "id": "gold-discount",
                    "name": "gold_discount",
                    "salience": 10,
                    "when": [
                        {
                            "kind": "Customer",
                            "bind": "$c",
                            "constraint": {
                                "type": "condition",
                                "field": "tier",
                                "operator": "eq",
                                "value": "gold"
                            }
                        },
                        {
                            "kind": "Order",
                            "bind": "$o",
                            "constraint": {
                                "type": "group",
                                "operator": "AND",
                                "children": [
                                    {
                                        "type": "condition",
                                        "field": "customer_id",
                                        "operator": "eq",
                                        "value": "$c.id"
                                    },
                                    {
                                        "type": "condition",
                                        "field": "amount",
                                        "operator": "gte",
                                        "value": 100
                                    }
                                ]
                            }
                        }
                    ],
                    "then": [
                        { "type": "insert", "kind": "Discount", "data": { "order": "$o.id", "percent": 10 } }
                    ]
                }
            ],
            "queries": [
                {
                    "name": "all_discounts",
                    "when": [{ "kind": "Discount", "bind": "$d" }]
                }
            ]
        }
        "#;

        let package: RulePackage = serde_json::from_str(json).unwrap();
        assert_eq!(package.rules.len(), 1);
        assert_eq!(package.rules[0].salience, 10);
        assert_eq!(package.rules[0].when.len(), 2);
        assert!(matches!(
            package.rules[0].when[1].constraint,
            Some(RuleNode::Group(_))
        ));
        assert_eq!(package.queries[0].parameters.len(), 0);
    }

    #[test]
    fn test_unary_condition_without_value() {
        let json = r#"{ "type": "condition", "field": "email", "operator": "is_empty" }"#;
        let node: RuleNode = serde_json::from_str(json).unwrap();
        match node {
            RuleNode::Condition(cond) => assert!(cond.value.is_null()),
            RuleNode::Group(_) => panic!("expected condition"),
        }
    }
}
