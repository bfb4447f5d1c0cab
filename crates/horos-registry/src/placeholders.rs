use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use horos_contracts::{new_id, now_ms};

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([a-zA-Z0-9_]+(?:\(\))?)\s*\}\}").unwrap())
}

/// Substitute `{{uuid()}}`, `{{now()}}`, and `{{param}}` (looked up in
/// `params`, must be a JSON scalar) inside a SQL template string.
pub fn substitute(template: &str, params: &Value) -> Result<String, String> {
    let re = placeholder_re();
    let mut err: Option<String> = None;
    let out = re.replace_all(template, |caps: &regex::Captures| {
        let token = &caps[1];
        match token {
            "uuid()" => new_id(),
            "now()" => now_ms().to_string(),
            name => match params.get(name) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::Bool(b)) => b.to_string(),
                Some(Value::Null) | None => {
                    err.get_or_insert_with(|| format!("missing placeholder parameter '{name}'"));
                    String::new()
                }
                Some(other) => {
                    err.get_or_insert_with(|| format!("placeholder '{name}' is not a scalar: {other}"));
                    String::new()
                }
            },
        }
    });
    match err {
        Some(e) => Err(e),
        None => Ok(out.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_param_and_builtins() {
        let params = json!({"name": "alice", "age": 30});
        let out = substitute("SELECT * FROM users WHERE name = '{{name}}' AND id = '{{uuid()}}'", &params).unwrap();
        assert!(out.contains("alice"));
        assert!(!out.contains("{{"));
    }

    #[test]
    fn missing_param_errors() {
        let err = substitute("SELECT '{{missing}}'", &json!({})).unwrap_err();
        assert!(err.contains("missing"));
    }
}
