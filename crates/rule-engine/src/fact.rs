//! 事实（Fact）定义
//!
//! 事实是一次评估中装入工作内存的领域对象。事实没有独立身份，
//! 相等性由类型名和数据共同决定，同一次评估中相等的事实只保留一份。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// 一次评估需要装入的事实集合
pub type FactSet = HashSet<Fact>;

/// 领域事实
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    kind: String,
    data: Value,
}

impl Fact {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// 事实类型名，模式匹配按类型名筛选事实
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn into_data(self) -> Value {
        self.data
    }

    /// 获取字段值（支持点号分隔的路径，如 "customer.tier" 或 "items.0.sku"）
    ///
    /// 空路径返回整个数据对象。
    pub fn get_field(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(&self.data);
        }

        let mut current = &self.data;
        for part in path.split('.') {
            match current {
                Value::Object(map) => {
                    current = map.get(part)?;
                }
                Value::Array(arr) => {
                    let index: usize = part.parse().ok()?;
                    current = arr.get(index)?;
                }
                _ => return None,
            }
        }

        Some(current)
    }
}

impl Eq for Fact {}

impl Hash for Fact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        // serde_json 的 Map 为有序映射，相等的 Value 序列化结果一致
        self.data.to_string().hash(state);
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.data)
    }
}

/// 工作内存中的事实句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactHandle(u64);

impl FactHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equal_facts_collapse_in_set() {
        let mut facts = FactSet::new();
        facts.insert(Fact::new("Order", json!({"id": "o-1", "amount": 120})));
        facts.insert(Fact::new("Order", json!({"amount": 120, "id": "o-1"})));
        facts.insert(Fact::new("Customer", json!({"id": "o-1"})));

        assert_eq!(facts.len(), 2);
    }

    #[test]
    fn test_kind_participates_in_equality() {
        let a = Fact::new("A", json!({"id": 1}));
        let b = Fact::new("B", json!({"id": 1}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_get_field_paths() {
        let fact = Fact::new(
            "Order",
            json!({
                "customer": {"tier": "gold"},
                "items": [{"sku": "A-1"}, {"sku": "B-2"}]
            }),
        );

        assert_eq!(fact.get_field("customer.tier"), Some(&json!("gold")));
        assert_eq!(fact.get_field("items.1.sku"), Some(&json!("B-2")));
        assert_eq!(fact.get_field("items.9.sku"), None);
        assert_eq!(fact.get_field("customer.tier.name"), None);
        assert_eq!(fact.get_field(""), Some(fact.data()));
    }
}
