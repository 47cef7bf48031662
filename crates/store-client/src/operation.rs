//! Operation kinds understood by every store connection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of operations a workload can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Query,
    Update,
    Insert,
    Delete,
    Aggregate,
}

impl OperationKind {
    /// All kinds, in declaration order.
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Query,
        OperationKind::Update,
        OperationKind::Insert,
        OperationKind::Delete,
        OperationKind::Aggregate,
    ];

    /// Lowercase name used in configuration and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Update => "update",
            OperationKind::Insert => "insert",
            OperationKind::Delete => "delete",
            OperationKind::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "query" | "find" => Ok(OperationKind::Query),
            "update" => Ok(OperationKind::Update),
            "insert" => Ok(OperationKind::Insert),
            "delete" => Ok(OperationKind::Delete),
            "aggregate" | "aggregation" => Ok(OperationKind::Aggregate),
            other => Err(format!("unknown operation kind: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("find".parse::<OperationKind>().unwrap(), OperationKind::Query);
        assert_eq!(
            "Aggregation".parse::<OperationKind>().unwrap(),
            OperationKind::Aggregate
        );
        assert!("upsert".parse::<OperationKind>().is_err());
    }

    #[test]
    fn test_display_matches_serde_name() {
        for kind in OperationKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind));
        }
    }
}
