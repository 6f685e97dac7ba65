//! `tracing` events for prepared and executed SQL.
//!
//! Events are emitted at `DEBUG` on target `sqlchain.sql` with the fields
//! `operation`, `object`, `param_count` and `sql`.

use crate::command::CommandPlan;

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

pub(crate) fn truncate_sql(sql: &str, max_sql_length: Option<usize>) -> String {
    match max_sql_length {
        Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
        _ => sql.to_string(),
    }
}

/// Log a plan after it has been prepared.
pub(crate) fn log_prepared<P>(plan: &CommandPlan<P>, max_sql_length: Option<usize>) {
    let sql = truncate_sql(&plan.sql, max_sql_length);
    tracing::debug!(
        target: "sqlchain.sql",
        operation = %plan.kind,
        object = %plan.object,
        param_count = plan.parameters.len(),
        sql = %sql,
        "prepared"
    );
}

/// Log a plan right before it is sent to the server.
pub(crate) fn log_executing<P>(plan: &CommandPlan<P>, max_sql_length: Option<usize>) {
    let sql = truncate_sql(&plan.sql, max_sql_length);
    tracing::debug!(
        target: "sqlchain.sql",
        operation = %plan.kind,
        object = %plan.object,
        param_count = plan.parameters.len(),
        sql = %sql,
        "executing"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_sql("SELECT 1", Some(100)), "SELECT 1");
        assert_eq!(truncate_sql("SELECT 1", Some(6)), "SELECT...");
        assert_eq!(truncate_sql_bytes("héllo", 2), "h");
        assert_eq!(truncate_sql("SELECT 1", None), "SELECT 1");
    }
}
