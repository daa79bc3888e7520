use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one historical LP deployment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(pub String);

impl PositionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PositionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Grouping key shared by positions deployed with the same configuration.
///
/// This is the unit of aggregation: every (strategy instance, TP, SL) triple
/// becomes one aggregated cell.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyInstanceId(pub String);

impl StrategyInstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StrategyInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StrategyInstanceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_raw_value() {
        assert_eq!(PositionId::new("pos-1").to_string(), "pos-1");
        assert_eq!(StrategyInstanceId::from("spot-69").to_string(), "spot-69");
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&PositionId::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn strategy_ids_order_lexicographically() {
        let a = StrategyInstanceId::from("a");
        let b = StrategyInstanceId::from("b");
        assert!(a < b);
    }
}
