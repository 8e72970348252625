//! pg-metrics - PostgreSQL and PgBouncer metrics for StatsD.
//!
//! One invocation opens one session, runs the version-gated query catalog,
//! maps every result to hierarchical metric names and returns the numeric
//! observations for transmission:
//!
//! - `catalog` - metric families and per-version queries
//! - `metrics` - result → observation transducer, sanitizers, filter
//! - `collector` - PostgreSQL instance/database and PgBouncer collectors
//! - `session` - database session abstraction
//! - `transport` - StatsD gauges over UDP

pub mod catalog;
pub mod cli;
pub mod collector;
pub mod error;
pub mod metrics;
pub mod model;
pub mod session;
pub mod transport;

pub use error::CollectError;
pub use model::{MetricValue, Observation, TabularResult};
