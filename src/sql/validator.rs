//! Read-only safety checks for ad-hoc SQL

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// Statement types accepted unless configured otherwise
pub const DEFAULT_ALLOWED_STATEMENTS: &[&str] = &["SELECT", "WITH", "SHOW", "DESCRIBE", "DESC", "EXPLAIN"];

const DANGEROUS_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "INSERT", "UPDATE", "CREATE", "ALTER", "TRUNCATE", "MERGE", "COPY", "IMPORT", "EXPORT",
    "GRANT", "REVOKE", "SET", "CALL", "EXEC", "EXECUTE",
];

const DANGEROUS_FUNCTIONS: &[&str] = &["SYSTEM", "SHELL", "CMD", "EVAL", "EXECUTE"];

pub const MAX_QUERY_LENGTH: usize = 10_000;
pub const MAX_LIMIT: u64 = 10_000;

struct Patterns {
    line_comment: Regex,
    block_comment: Regex,
    whitespace: Regex,
    word: Regex,
    function_call: Regex,
    limit: Regex,
    suspicious: Vec<Regex>,
    injection: Vec<Regex>,
}

static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| {
    let compile = |p: &str| Regex::new(p).expect("static pattern");
    Patterns {
        line_comment: compile(r"(?m)--.*$"),
        block_comment: compile(r"(?s)/\*.*?\*/"),
        whitespace: compile(r"\s+"),
        word: compile(r"\b\w+\b"),
        function_call: compile(r"\b(\w+)\s*\("),
        limit: compile(r"\bLIMIT\s+(\d+)"),
        suspicious: [
            r"\bUNION\s+ALL\s+SELECT.*FROM.*INFORMATION_SCHEMA",
            r"\bSELECT.*FROM.*INFORMATION_SCHEMA.*TABLES",
            r";\s*DROP",
            r";\s*DELETE",
            r";\s*INSERT",
            r"CONCAT\s*\(\s*CHAR\s*\(",
            r"EXEC\s*\(",
            r"EXECUTE\s*\(",
        ]
        .into_iter()
        .map(compile)
        .collect(),
        injection: [
            r"'\s*OR\s*'1'\s*=\s*'1",
            r"'\s*OR\s*1\s*=\s*1",
            r"'\s*UNION\s+SELECT",
            r"'\s*;\s*DROP",
        ]
        .into_iter()
        .map(compile)
        .collect(),
    }
});

/// Strip comments, collapse whitespace and uppercase
pub fn normalize(query: &str) -> String {
    let p = &*PATTERNS;
    let without_line = p.line_comment.replace_all(query, "");
    let without_block = p.block_comment.replace_all(&without_line, "");
    p.whitespace
        .replace_all(without_block.trim(), " ")
        .to_uppercase()
}

/// Rejects anything that isn't a bounded read-only statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryValidator {
    allowed: BTreeSet<String>,
    max_query_length: usize,
    max_limit: u64,
}

impl Default for QueryValidator {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_STATEMENTS.iter().copied())
    }
}

impl QueryValidator {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: allowed.into_iter().map(|s| s.as_ref().trim().to_uppercase()).collect(),
            max_query_length: MAX_QUERY_LENGTH,
            max_limit: MAX_LIMIT,
        }
    }

    pub fn allowed_statements(&self) -> Vec<String> {
        self.allowed.iter().cloned().collect()
    }

    /// `Ok(())` when the query is safe, otherwise the reason it isn't
    pub fn check(&self, query: &str) -> Result<(), String> {
        if query.trim().is_empty() {
            return Err("Empty query not allowed".to_string());
        }
        if query.chars().count() > self.max_query_length {
            return Err(format!("Query too long (max {} characters)", self.max_query_length));
        }

        let normalized = normalize(query);
        let p = &*PATTERNS;

        let statement_type = p
            .word
            .find(&normalized)
            .filter(|m| m.start() == 0)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| "Unable to determine query type".to_string())?;
        if !self.allowed.contains(&statement_type) {
            return Err(format!("Statement type '{}' not allowed", statement_type));
        }

        let keywords: BTreeSet<&str> = p
            .word
            .find_iter(&normalized)
            .map(|m| m.as_str())
            .filter(|w| DANGEROUS_KEYWORDS.contains(w))
            .collect();
        if !keywords.is_empty() {
            return Err(format!(
                "Dangerous keywords found: {}",
                keywords.into_iter().collect::<Vec<_>>().join(", ")
            ));
        }

        let functions: BTreeSet<&str> = p
            .function_call
            .captures_iter(&normalized)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .filter(|f| DANGEROUS_FUNCTIONS.contains(f))
            .collect();
        if !functions.is_empty() {
            return Err(format!(
                "Dangerous functions found: {}",
                functions.into_iter().collect::<Vec<_>>().join(", ")
            ));
        }

        for caps in p.limit.captures_iter(&normalized) {
            let raw = &caps[1];
            match raw.parse::<u64>() {
                Ok(value) if value > self.max_limit => {
                    return Err(format!(
                        "LIMIT value {} exceeds maximum allowed ({})",
                        value, self.max_limit
                    ));
                }
                Ok(_) => {}
                Err(_) => return Err(format!("Invalid LIMIT value: {}", raw)),
            }
        }

        if let Some(pattern) = p.suspicious.iter().find(|re| re.is_match(&normalized)) {
            return Err(format!("Suspicious pattern detected: {}", pattern.as_str()));
        }
        if p.injection.iter().any(|re| re.is_match(&normalized)) {
            return Err("Potential SQL injection attempt detected".to_string());
        }

        log::debug!("Query validated: {}", statement_type);
        Ok(())
    }
}
