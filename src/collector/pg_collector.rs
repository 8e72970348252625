//! PostgreSQL metrics collector.
//!
//! One pass runs the resolved catalog sequentially over a single session:
//!
//! - instance mode: every instance family, connected to `postgres`
//! - database mode: a selected subset of database families, connected to the
//!   target database, every path prefixed with `database.<name>`
//!
//! Families whose query is absent for the server version are skipped silently.
//! The filter runs once over the concatenated observations.

use chrono::Utc;
use tracing::{debug, info};

use crate::catalog::{
    Catalog, DatabaseFamily, MetricFamily, QueryDefinition, ServerVersion,
};
use crate::error::CollectError;
use crate::metrics::{MetricFilter, transduce};
use crate::model::Observation;
use crate::session::Session;

/// `application_name` reported to the server.
pub const APPLICATION_NAME: &str = "pg_metrics_statsd";

/// Runs `query` and maps its result under `prefix`.
///
/// Returns no observations if `query` is `None`.
pub fn fetch_metrics<S: Session + ?Sized>(
    session: &mut S,
    prefix: &[&str],
    query: Option<&str>,
) -> Result<Vec<Observation>, CollectError> {
    let Some(query) = query else {
        return Ok(Vec::new());
    };

    let timestamp = Utc::now().timestamp();
    let result = session.query(query)?;
    transduce(&result, prefix, timestamp)
}

/// PostgreSQL collector bound to one session.
pub struct PostgresCollector<S: Session> {
    session: S,
    version: ServerVersion,
}

impl<S: Session> PostgresCollector<S> {
    /// Wraps an open session; fails if the server version is unrecognizable.
    pub fn new(session: S) -> Result<Self, CollectError> {
        let version = ServerVersion::parse(session.server_version()).ok_or_else(|| {
            CollectError::QueryError(format!(
                "unrecognized server version '{}'",
                session.server_version()
            ))
        })?;
        Ok(Self { session, version })
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Collects every instance family.
    pub fn collect_instance(
        &mut self,
        filter: &MetricFilter,
    ) -> Result<Vec<Observation>, CollectError> {
        let catalog = Catalog::instance(self.version);
        let mut metrics = Vec::new();
        for definition in catalog.definitions() {
            metrics.extend(self.run_definition(definition, &[])?);
        }
        info!(
            server_version = %catalog.version(),
            collected = metrics.len(),
            "collected instance metrics"
        );
        Ok(filter.apply(metrics))
    }

    /// Collects the selected database families for `dbname`.
    ///
    /// The session must already be connected to `dbname`.
    pub fn collect_database(
        &mut self,
        dbname: &str,
        families: &[DatabaseFamily],
        filter: &MetricFilter,
    ) -> Result<Vec<Observation>, CollectError> {
        let catalog = Catalog::database(self.version);
        let mut metrics = Vec::new();
        for definition in catalog.select(families) {
            metrics.extend(self.run_definition(definition, &["database", dbname])?);
        }
        info!(
            server_version = %catalog.version(),
            database = dbname,
            collected = metrics.len(),
            "collected database metrics"
        );
        Ok(filter.apply(metrics))
    }

    fn run_definition<F: MetricFamily>(
        &mut self,
        definition: &QueryDefinition<F>,
        leading: &[&str],
    ) -> Result<Vec<Observation>, CollectError> {
        let family = definition.family.name();
        if definition.query.is_none() {
            debug!(family, server_version = %self.version, "not supported by server, skipped");
            return Ok(Vec::new());
        }

        let prefix: Vec<&str> = leading
            .iter()
            .chain(definition.prefix.iter())
            .copied()
            .collect();
        let metrics = fetch_metrics(&mut self.session, &prefix, definition.query)?;
        debug!(family, observations = metrics.len(), "query executed");
        Ok(metrics)
    }
}
