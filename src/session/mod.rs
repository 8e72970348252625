//! Database sessions.
//!
//! The collectors only need two things from a connection: run a query and
//! return its rows as text, and report the server version. [`Session`]
//! captures that so collectors can be driven by [`MockSession`] in tests and
//! by [`PgSession`] against a real PostgreSQL or PgBouncer.

pub mod mock;

use postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::debug;

use crate::catalog::{APPLICATION_NAME_MIN_VERSION, ServerVersion};
use crate::error::{CollectError, format_postgres_error};
use crate::model::TabularResult;

pub use mock::MockSession;

/// A connection able to execute queries and report its server version.
pub trait Session {
    /// Version string as reported by the server.
    fn server_version(&self) -> &str;

    /// Executes `sql` and returns all rows as text cells.
    fn query(&mut self, sql: &str) -> Result<TabularResult, CollectError>;
}

/// Session over a synchronous `postgres::Client`.
///
/// Queries use the simple query protocol: results arrive as text, which is
/// what the transducer consumes, and it is the only protocol the PgBouncer
/// admin console understands.
pub struct PgSession {
    client: Client,
    server_version: String,
}

impl PgSession {
    /// Connects to PostgreSQL and tags the session with `application_name`
    /// when the server supports it.
    pub fn connect(connection_string: &str, application_name: &str) -> Result<Self, CollectError> {
        let client = open(connection_string)?;
        let mut session = Self {
            client,
            server_version: String::new(),
        };
        session.server_version = session
            .scalar("SHOW server_version")?
            .unwrap_or_default();

        let supports_app_name = ServerVersion::parse(&session.server_version)
            .is_some_and(|v| v >= APPLICATION_NAME_MIN_VERSION);
        if supports_app_name {
            session.query(&format!(
                "SET application_name = '{}'",
                application_name.replace('\'', "''")
            ))?;
        }

        debug!(server_version = %session.server_version, "connected to PostgreSQL");
        Ok(session)
    }

    /// Connects to the PgBouncer admin console.
    pub fn connect_pgbouncer(connection_string: &str) -> Result<Self, CollectError> {
        let client = open(connection_string)?;
        let mut session = Self {
            client,
            server_version: String::new(),
        };
        session.server_version = session.scalar("SHOW VERSION")?.unwrap_or_default();

        debug!(server_version = %session.server_version, "connected to PgBouncer");
        Ok(session)
    }

    fn scalar(&mut self, sql: &str) -> Result<Option<String>, CollectError> {
        let result = self.query(sql)?;
        Ok(result
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next().flatten()))
    }
}

fn open(connection_string: &str) -> Result<Client, CollectError> {
    Client::connect(connection_string, NoTls)
        .map_err(|e| CollectError::ConnectionError(format_postgres_error(&e)))
}

impl Session for PgSession {
    fn server_version(&self) -> &str {
        &self.server_version
    }

    fn query(&mut self, sql: &str) -> Result<TabularResult, CollectError> {
        let messages = self
            .client
            .simple_query(sql)
            .map_err(|e| CollectError::QueryError(format_postgres_error(&e)))?;

        let mut result = TabularResult::default();
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                if result.columns.is_empty() {
                    result.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                }
                result.push_row((0..row.len()).map(|i| row.get(i).map(str::to_string)).collect());
            }
        }
        Ok(result)
    }
}

/// Sets `key=value` in a libpq-style connection string.
///
/// An existing `key=...` token is replaced, otherwise the parameter is appended.
pub fn set_conn_param(connection_string: &str, key: &str, value: &str) -> String {
    let prefix = format!("{}=", key);
    let mut found = false;
    let parts: Vec<String> = connection_string
        .split_whitespace()
        .map(|token| {
            if token.starts_with(&prefix) {
                found = true;
                format!("{}={}", key, value)
            } else {
                token.to_string()
            }
        })
        .collect();

    if found {
        parts.join(" ")
    } else if parts.is_empty() {
        format!("{}={}", key, value)
    } else {
        format!("{} {}={}", parts.join(" "), key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_conn_param_replaces_existing() {
        let conn = "host=localhost port=5432 user=app dbname=postgres";
        assert_eq!(
            set_conn_param(conn, "dbname", "mydb"),
            "host=localhost port=5432 user=app dbname=mydb"
        );
    }

    #[test]
    fn set_conn_param_appends_when_missing() {
        let conn = "host=localhost port=5493";
        assert_eq!(
            set_conn_param(conn, "dbname", "mydb"),
            "host=localhost port=5493 dbname=mydb"
        );
    }

    #[test]
    fn set_conn_param_on_empty_string() {
        assert_eq!(set_conn_param("", "dbname", "postgres"), "dbname=postgres");
    }

    #[test]
    fn set_conn_param_does_not_match_longer_keys() {
        let conn = "username=x user=app";
        assert_eq!(
            set_conn_param(conn, "user", "admin"),
            "username=x user=admin"
        );
    }
}
