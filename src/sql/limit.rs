//! Row limits for ad-hoc queries

/// Append `LIMIT n` to a SELECT that has none. Other statements, and
/// SELECTs that already mention LIMIT anywhere, are returned unchanged.
pub fn add_limit_if_needed(query: &str, limit: u64) -> String {
    let upper = query.trim().to_uppercase();
    if upper.starts_with("SELECT") && !upper.contains("LIMIT") {
        let body = query.trim_end().trim_end_matches(';').trim_end();
        format!("{} LIMIT {}", body, limit)
    } else {
        query.to_string()
    }
}
