//! Metric collectors.
//!
//! - `pg_collector`: PostgreSQL instance and per-database metrics, driven by
//!   the version-gated catalog and the generic transducer
//! - `pgbouncer`: PgBouncer admin console metrics and per-backend aggregation

pub mod pg_collector;
pub mod pgbouncer;

pub use pg_collector::{APPLICATION_NAME, PostgresCollector, fetch_metrics};
pub use pgbouncer::PgBouncerCollector;
