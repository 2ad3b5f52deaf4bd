//! Rule types matching Buf's check plugin classification

use serde::{Deserialize, Serialize};

/// The kind of check a rule belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleType {
    /// BREAKING - compares a current schema against a previous one
    Breaking,
}

impl RuleType {
    /// Get the string identifier for this rule type
    pub fn id(&self) -> &'static str {
        match self {
            RuleType::Breaking => "BREAKING",
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_type_display_pads() {
        assert_eq!(RuleType::Breaking.to_string(), "BREAKING");
        assert_eq!(format!("{:<10}|", RuleType::Breaking), "BREAKING  |");
    }
}
