//! Error type shared by the collectors, sessions and transport.

/// Error type for a collection pass.
///
/// Every variant is fatal to the run: the binary logs it and exits non-zero.
/// Conditions that are tolerated (unsupported server version, missing join
/// target, null values) never produce an error.
#[derive(Debug)]
pub enum CollectError {
    /// Connection could not be opened or was lost.
    ConnectionError(String),
    /// Query execution failed.
    QueryError(String),
    /// Result shape matched none of the naming conventions.
    UnexpectedShape { columns: usize, rows: usize },
    /// Invalid command line or configuration value.
    InvalidArgument(String),
    /// Sending metrics to the backend failed.
    Transport(std::io::Error),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::ConnectionError(msg) => write!(f, "PostgreSQL: {}", msg),
            CollectError::QueryError(msg) => write!(f, "PostgreSQL query error: {}", msg),
            CollectError::UnexpectedShape { columns, rows } => write!(
                f,
                "unexpected result shape: {} columns, {} rows without key columns",
                columns, rows
            ),
            CollectError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            CollectError::Transport(e) => write!(f, "statsd transport: {}", e),
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CollectError {
    fn from(e: std::io::Error) -> Self {
        CollectError::Transport(e)
    }
}

/// Formats PostgreSQL error message for display.
pub(crate) fn format_postgres_error(e: &postgres::Error) -> String {
    if let Some(db_error) = e.as_db_error() {
        format!("{}: {}", db_error.severity(), db_error.message())
    } else {
        let msg = e.to_string();
        if msg.contains("Connection refused") {
            "connection refused".to_string()
        } else if msg.contains("password authentication failed") {
            "password authentication failed".to_string()
        } else if msg.contains("does not exist") {
            msg.split("FATAL:")
                .last()
                .unwrap_or(&msg)
                .trim()
                .to_string()
        } else {
            msg
        }
    }
}
