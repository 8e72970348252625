//! In-memory session for testing collectors without a database.

use crate::error::CollectError;
use crate::model::TabularResult;

use super::Session;

/// Session answering queries from canned results.
///
/// A query is answered by the first registered result whose pattern occurs
/// in the SQL text. Queries matching no pattern return an empty result.
/// Every executed query is recorded.
#[derive(Debug, Clone, Default)]
pub struct MockSession {
    server_version: String,
    responses: Vec<(String, TabularResult)>,
    failures: Vec<String>,
    executed: Vec<String>,
}

impl MockSession {
    pub fn new(server_version: impl Into<String>) -> Self {
        Self {
            server_version: server_version.into(),
            ..Self::default()
        }
    }

    /// Answers queries containing `pattern` with `result`.
    pub fn add_result(&mut self, pattern: impl Into<String>, result: TabularResult) -> &mut Self {
        self.responses.push((pattern.into(), result));
        self
    }

    /// Fails queries containing `pattern`.
    pub fn add_failure(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.failures.push(pattern.into());
        self
    }

    /// SQL text of every executed query, in order.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }
}

impl Session for MockSession {
    fn server_version(&self) -> &str {
        &self.server_version
    }

    fn query(&mut self, sql: &str) -> Result<TabularResult, CollectError> {
        self.executed.push(sql.to_string());

        if let Some(pattern) = self.failures.iter().find(|p| sql.contains(p.as_str())) {
            return Err(CollectError::QueryError(format!(
                "mock failure for '{}'",
                pattern
            )));
        }

        Ok(self
            .responses
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_by_first_matching_pattern() {
        let mut session = MockSession::new("16.2");
        session
            .add_result("pg_stat_bgwriter", TabularResult::from_rows(&["a"], &[&[Some("1")]]))
            .add_result("pg_stat", TabularResult::from_rows(&["b"], &[&[Some("2")]]));

        let r = session.query("SELECT * FROM pg_stat_bgwriter").unwrap();
        assert_eq!(r.columns, vec!["a"]);
        let r = session.query("SELECT * FROM pg_stat_database").unwrap();
        assert_eq!(r.columns, vec!["b"]);
        let r = session.query("SHOW max_connections").unwrap();
        assert_eq!(r, TabularResult::default());

        assert_eq!(session.executed().len(), 3);
    }

    #[test]
    fn failures_take_precedence() {
        let mut session = MockSession::new("16.2");
        session
            .add_result("pg_locks", TabularResult::default())
            .add_failure("pg_locks");
        assert!(matches!(
            session.query("SELECT 1 FROM pg_locks"),
            Err(CollectError::QueryError(_))
        ));
    }
}
