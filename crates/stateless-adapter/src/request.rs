//! 请求到事实集合的转换

use rule_engine::{Fact, FactSet};

/// 可以提供一次评估所需全部事实的请求
pub trait FactSource {
    /// 返回需要插入会话的所有事实，相等的事实只保留一份
    fn all_facts(&self) -> FactSet;
}

impl FactSource for FactSet {
    fn all_facts(&self) -> FactSet {
        self.clone()
    }
}

/// 只由事实组成的通用请求
#[derive(Debug, Clone, Default)]
pub struct FactRequest {
    facts: FactSet,
}

impl FactRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fact(mut self, fact: Fact) -> Self {
        self.facts.insert(fact);
        self
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

impl FromIterator<Fact> for FactRequest {
    fn from_iter<I: IntoIterator<Item = Fact>>(iter: I) -> Self {
        Self {
            facts: iter.into_iter().collect(),
        }
    }
}

impl FactSource for FactRequest {
    fn all_facts(&self) -> FactSet {
        self.facts.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_duplicates_collapse() {
        let request: FactRequest = [
            Fact::new("Order", json!({"id": 1})),
            Fact::new("Order", json!({"id": 1})),
            Fact::new("Order", json!({"id": 2})),
        ]
        .into_iter()
        .collect();

        assert_eq!(request.len(), 2);
        assert_eq!(request.all_facts().len(), 2);
    }
}
