use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerType {
    SqlQuery,
    SqlScript,
    NativeFunction,
}

impl HandlerType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sql_query" => Some(Self::SqlQuery),
            "sql_script" => Some(Self::SqlScript),
            "native_function" => Some(Self::NativeFunction),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqlQuery => "sql_query",
            Self::SqlScript => "sql_script",
            Self::NativeFunction => "native_function",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Readonly,
    Readwrite,
}

impl Mode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "readonly" => Some(Self::Readonly),
            "readwrite" => Some(Self::Readwrite),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Readonly => "readonly",
            Self::Readwrite => "readwrite",
        }
    }
}

/// A row from `dynamic_tools`. `handler_config` and `input_schema` are kept
/// as parsed JSON since both are interpreted at call time.
#[derive(Debug, Clone)]
pub struct DynamicTool {
    pub name: String,
    pub category: String,
    pub description: String,
    pub input_schema: Value,
    pub handler_type: HandlerType,
    pub handler_config: Value,
    pub mode: Mode,
    pub is_active: bool,
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DynamicTool {
    /// `required` parameters declared by `input_schema`, per JSON Schema's
    /// `required: [...]` convention.
    pub fn required_params(&self) -> Vec<String> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default()
    }
}

const NON_MUTATING_KEYWORDS: &[&str] = &["SELECT", "WITH", "EXPLAIN", "PRAGMA"];

/// True if `sql`'s leading keyword is in the non-mutating set required of
/// `sql_query` handlers on a `readonly` tool.
pub fn is_statically_non_mutating(sql: &str) -> bool {
    let leading = sql.trim_start().split_whitespace().next().unwrap_or("").to_uppercase();
    NON_MUTATING_KEYWORDS.contains(&leading.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "allow" => Some(Self::Allow),
            "deny" => Some(Self::Deny),
            _ => None,
        }
    }
}

/// A row from the policy table: `(tool_name, role, effect)`, `role = "*"`
/// matching any caller.
#[derive(Debug, Clone)]
pub struct ToolPolicyRule {
    pub tool_name: String,
    pub role: String,
    pub effect: Effect,
}

/// Any matching deny wins; else if any allow rules exist for the tool, the
/// caller must match one of them; else (no rules at all for this tool) the
/// call is allowed.
pub fn evaluate_policy(rules: &[ToolPolicyRule], tool_name: &str, role: &str) -> bool {
    let applicable: Vec<&ToolPolicyRule> = rules
        .iter()
        .filter(|r| r.tool_name == tool_name && (r.role == "*" || r.role == role))
        .collect();

    if applicable.iter().any(|r| r.effect == Effect::Deny) {
        return false;
    }
    if applicable.iter().any(|r| r.effect == Effect::Allow) {
        return true;
    }
    applicable.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_beats_matching_allow() {
        let rules = vec![
            ToolPolicyRule { tool_name: "t".into(), role: "*".into(), effect: Effect::Allow },
            ToolPolicyRule { tool_name: "t".into(), role: "admin".into(), effect: Effect::Deny },
        ];
        assert!(!evaluate_policy(&rules, "t", "admin"));
    }

    #[test]
    fn no_rules_means_allow() {
        assert!(evaluate_policy(&[], "t", "anyone"));
    }

    #[test]
    fn allow_rules_present_require_a_match() {
        let rules = vec![ToolPolicyRule {
            tool_name: "t".into(),
            role: "admin".into(),
            effect: Effect::Allow,
        }];
        assert!(evaluate_policy(&rules, "t", "admin"));
        assert!(!evaluate_policy(&rules, "t", "guest"));
    }

    #[test]
    fn statically_non_mutating_detection() {
        assert!(is_statically_non_mutating("  select * from x"));
        assert!(is_statically_non_mutating("WITH cte AS (SELECT 1) SELECT * FROM cte"));
        assert!(!is_statically_non_mutating("DELETE FROM x"));
        assert!(!is_statically_non_mutating("update x set y=1"));
    }
}
