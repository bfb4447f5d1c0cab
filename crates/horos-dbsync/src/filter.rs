use crate::error::DbSyncError;
use std::collections::{HashMap, HashSet};

const DENYLISTED_KEYWORDS: &[&str] = &[
    "DROP", "ALTER", "CREATE", "INSERT", "UPDATE", "DELETE", "ATTACH", "DETACH",
    "REPLACE", "TRUNCATE", "GRANT", "REVOKE", "VACUUM", "UNION", "PRAGMA", "EXEC",
    "LOAD_EXTENSION",
];

/// Rejects WHERE predicates that could smuggle a second statement or a
/// schema/data mutation onto what is meant to be a read-only filter.
pub fn validate_where(predicate: &str) -> Result<(), DbSyncError> {
    if predicate.contains(';') {
        return Err(DbSyncError::InvalidFilter("predicate contains ';'".to_string()));
    }
    if predicate.contains("--") || predicate.contains("/*") || predicate.contains("*/") {
        return Err(DbSyncError::InvalidFilter("predicate contains a comment token".to_string()));
    }
    let upper = predicate.to_uppercase();
    for kw in DENYLISTED_KEYWORDS {
        // word-boundary match so e.g. a column named `updated_at` doesn't trip on UPDATE
        let pattern = format!(r"\b{kw}\b");
        let re = regex::Regex::new(&pattern).expect("static pattern");
        if re.is_match(&upper) {
            return Err(DbSyncError::InvalidFilter(format!("predicate contains denylisted keyword '{kw}'")));
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PartialTableSpec {
    pub columns: Vec<String>,
    pub where_clause: Option<String>,
}

/// Three disjoint sets describing how a snapshot should be filtered down
/// from the live source.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    pub full_tables: Vec<String>,
    pub filtered_tables: HashMap<String, String>,
    pub partial_tables: HashMap<String, PartialTableSpec>,
}

impl FilterSpec {
    /// Validate every WHERE predicate against the denylist.
    pub fn validate(&self) -> Result<(), DbSyncError> {
        for (table, predicate) in &self.filtered_tables {
            validate_where(predicate).map_err(|e| {
                DbSyncError::InvalidFilter(format!("table '{table}': {e}"))
            })?;
        }
        for (table, spec) in &self.partial_tables {
            if let Some(predicate) = &spec.where_clause {
                validate_where(predicate).map_err(|e| {
                    DbSyncError::InvalidFilter(format!("table '{table}': {e}"))
                })?;
            }
        }
        Ok(())
    }

    /// Union of every table name this spec keeps around — everything else
    /// gets dropped from the snapshot.
    pub fn whitelist(&self) -> HashSet<String> {
        let mut set: HashSet<String> = self.full_tables.iter().cloned().collect();
        set.extend(self.filtered_tables.keys().cloned());
        set.extend(self.partial_tables.keys().cloned());
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_statement_separator() {
        assert!(validate_where("id = 1; DROP TABLE x").is_err());
    }

    #[test]
    fn rejects_comment_tokens() {
        assert!(validate_where("id = 1 -- comment").is_err());
        assert!(validate_where("id = 1 /* comment */").is_err());
    }

    #[test]
    fn rejects_mutation_keywords() {
        assert!(validate_where("1=1; UPDATE x SET y=1").is_err());
        assert!(validate_where("id IN (SELECT id FROM y WHERE 1) OR EXEC('x')").is_err());
    }

    #[test]
    fn allows_ordinary_predicates_including_lookalike_columns() {
        assert!(validate_where("tenant_id = 'acme' AND updated_at > 0").is_ok());
        assert!(validate_where("status IN ('active', 'pending')").is_ok());
    }

    #[test]
    fn whitelist_is_union_of_all_three_sets() {
        let mut filtered = HashMap::new();
        filtered.insert("orders".to_string(), "status = 'open'".to_string());
        let mut partial = HashMap::new();
        partial.insert("users".to_string(), PartialTableSpec { columns: vec!["id".into()], where_clause: None });

        let spec = FilterSpec {
            full_tables: vec!["config".to_string()],
            filtered_tables: filtered,
            partial_tables: partial,
        };
        let wl = spec.whitelist();
        assert!(wl.contains("config"));
        assert!(wl.contains("orders"));
        assert!(wl.contains("users"));
        assert_eq!(wl.len(), 3);
    }
}
