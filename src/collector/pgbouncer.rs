//! PgBouncer metrics collector.
//!
//! Reads the admin console (`SHOW STATS`, `SHOW POOLS`, `SHOW DATABASES`)
//! and, besides the raw per-pool figures, aggregates pools by the physical
//! backend they route to. Several logical databases (and users) may share a
//! single server; the `backends.*` metrics answer how loaded that server is.
//!
//! All paths are sanitized with the strict sanitizer after filtering.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::CollectError;
use crate::metrics::{MetricFilter, sanitize_segment_strict};
use crate::model::{MetricValue, Observation, TabularResult};
use crate::session::Session;

/// `SHOW STATS` columns; PgBouncer 1.8 renamed most of them, both sets are
/// listed and the absent ones are dropped as null.
const STATS_COLUMNS: &[&str] = &[
    "total_requests",
    "total_received",
    "total_sent",
    "total_query_time",
    "avg_req",
    "avg_recv",
    "avg_sent",
    "avg_query",
    "total_xact_count",
    "total_query_count",
    "total_xact_time",
    "total_wait_time",
    "avg_xact_count",
    "avg_query_count",
    "avg_xact_time",
    "avg_wait_time",
];

const POOL_COLUMNS: &[&str] = &[
    "cl_active",
    "cl_waiting",
    "sv_active",
    "sv_idle",
    "sv_used",
    "sv_tested",
    "sv_login",
    "maxwait",
];

const DATABASE_COLUMNS: &[&str] = &["pool_size", "reserve_pool"];

/// Pool columns summed per backend.
pub const BACKEND_SUM_COLUMNS: [&str; 7] = [
    "cl_active",
    "cl_waiting",
    "sv_active",
    "sv_idle",
    "sv_used",
    "sv_tested",
    "sv_login",
];

/// Pool wait time, kept as a per-backend maximum.
pub const BACKEND_MAX_COLUMN: &str = "max_wait";

const DEFAULT_BACKEND_HOST: &str = "localhost";
const DEFAULT_BACKEND_PORT: &str = "5432";

/// User a logical database connects to its backend as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutedUser {
    /// `force_user` is set.
    Forced(String),
    /// No `force_user`: the pool's own user is used.
    SameUser,
}

/// Physical target of one logical database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingEntry {
    pub host: String,
    pub port: String,
    pub database: String,
    pub user: RoutedUser,
}

/// Physical backend identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendKey {
    pub host: String,
    pub port: String,
    pub database: String,
    pub user: String,
}

/// Per-backend accumulator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendStats {
    /// Sums, indexed like [`BACKEND_SUM_COLUMNS`].
    pub sums: [i64; 7],
    pub max_wait: i64,
}

impl BackendStats {
    fn add_pool_row(&mut self, pools: &TabularResult, row: usize) {
        for (sum, column) in self.sums.iter_mut().zip(BACKEND_SUM_COLUMNS) {
            *sum = sum.saturating_add(coerce_int(pools.value(row, column)));
        }
        let wait = pools
            .value(row, "maxwait")
            .or_else(|| pools.value(row, BACKEND_MAX_COLUMN));
        self.max_wait = self.max_wait.max(coerce_int(wait));
    }

    /// `(column, value)` pairs in emission order.
    pub fn columns(&self) -> impl Iterator<Item = (&'static str, i64)> + '_ {
        BACKEND_SUM_COLUMNS
            .into_iter()
            .zip(self.sums.iter().copied())
            .chain(std::iter::once((BACKEND_MAX_COLUMN, self.max_wait)))
    }
}

/// Leading integer of a cell, after optional whitespace and sign.
///
/// `"12abc"` and `"2.9"` give 12 and 2; null cells and cells without leading
/// digits count as zero. Runs too long for `i64` saturate.
fn coerce_int(cell: Option<&str>) -> i64 {
    let Some(s) = cell.map(str::trim_start) else {
        return 0;
    };
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    if end == 0 {
        return 0;
    }
    let digits = &rest[..end];
    if negative {
        format!("-{}", digits).parse::<i64>().unwrap_or(i64::MIN)
    } else {
        digits.parse::<i64>().unwrap_or(i64::MAX)
    }
}

/// Builds the logical database → backend routing map from `SHOW DATABASES`.
pub fn routing_entries(databases: &TabularResult) -> HashMap<String, RoutingEntry> {
    let mut routes = HashMap::with_capacity(databases.row_count());
    for row in 0..databases.row_count() {
        let Some(name) = databases.value(row, "name") else {
            continue;
        };
        let user = match databases.value(row, "force_user") {
            Some(forced) => RoutedUser::Forced(forced.to_string()),
            None => RoutedUser::SameUser,
        };
        routes.insert(
            name.to_string(),
            RoutingEntry {
                host: databases
                    .value(row, "host")
                    .unwrap_or(DEFAULT_BACKEND_HOST)
                    .to_string(),
                port: databases
                    .value(row, "port")
                    .unwrap_or(DEFAULT_BACKEND_PORT)
                    .to_string(),
                database: databases.value(row, "database").unwrap_or(name).to_string(),
                user,
            },
        );
    }
    routes
}

/// Groups pool rows by physical backend.
///
/// Pools whose database is missing from the routing map are skipped, as are
/// pools without a user unless the route forces one. Groups are returned in
/// order of first appearance.
pub fn aggregate_backends(
    routes: &HashMap<String, RoutingEntry>,
    pools: &TabularResult,
) -> Vec<(BackendKey, BackendStats)> {
    let mut groups: Vec<(BackendKey, BackendStats)> = Vec::new();
    let mut index: HashMap<BackendKey, usize> = HashMap::new();

    for row in 0..pools.row_count() {
        let Some(route) = pools.value(row, "database").and_then(|db| routes.get(db)) else {
            debug!(
                database = pools.value(row, "database").unwrap_or_default(),
                "pool without routing entry, skipped"
            );
            continue;
        };
        let user = match &route.user {
            RoutedUser::Forced(user) => user.clone(),
            RoutedUser::SameUser => match pools.value(row, "user") {
                Some(user) if !user.is_empty() => user.to_string(),
                _ => {
                    debug!(database = route.database.as_str(), "pool without user, skipped");
                    continue;
                }
            },
        };
        let key = BackendKey {
            host: route.host.clone(),
            port: route.port.clone(),
            database: route.database.clone(),
            user,
        };

        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push((key, BackendStats::default()));
            groups.len() - 1
        });
        groups[slot].1.add_pool_row(pools, row);
    }

    groups
}

/// Joins `SHOW DATABASES` and `SHOW POOLS` into `backends.*` observations.
pub fn extract_backend_metrics(
    databases: &TabularResult,
    pools: &TabularResult,
    timestamp: i64,
) -> Vec<Observation> {
    let routes = routing_entries(databases);
    let mut metrics = Vec::new();
    for (key, stats) in aggregate_backends(&routes, pools) {
        for (column, value) in stats.columns() {
            let path: [&str; 6] = [
                "backends",
                &key.host,
                &key.port,
                &key.database,
                &key.user,
                column,
            ];
            metrics.push(Observation::new(
                path.iter().map(|s| s.to_string()).collect(),
                Some(MetricValue::Integer(value)),
                timestamp,
            ));
        }
    }
    metrics
}

/// One observation per row and column, path `leading + row labels + column`.
fn extract_columns(
    result: &TabularResult,
    leading: &str,
    label_columns: &[&str],
    value_columns: &[&str],
    timestamp: i64,
) -> Vec<Observation> {
    let mut metrics = Vec::with_capacity(result.row_count() * value_columns.len());
    for row in 0..result.row_count() {
        for column in value_columns {
            let path = std::iter::once(leading)
                .chain(label_columns.iter().filter_map(|c| result.value(row, c)))
                .chain(std::iter::once(*column))
                .map(str::to_string)
                .collect();
            let value = result
                .value(row, column)
                .map(|v| MetricValue::Raw(v.to_string()));
            metrics.push(Observation::new(path, value, timestamp));
        }
    }
    metrics
}

pub fn extract_stats_metrics(stats: &TabularResult, timestamp: i64) -> Vec<Observation> {
    extract_columns(stats, "stats", &["database"], STATS_COLUMNS, timestamp)
}

pub fn extract_pool_metrics(pools: &TabularResult, timestamp: i64) -> Vec<Observation> {
    extract_columns(pools, "pools", &["database", "user"], POOL_COLUMNS, timestamp)
}

pub fn extract_database_metrics(databases: &TabularResult, timestamp: i64) -> Vec<Observation> {
    extract_columns(databases, "databases", &["name"], DATABASE_COLUMNS, timestamp)
}

/// Filters, then strictly sanitizes every path segment.
pub fn finalize(metrics: Vec<Observation>, filter: &MetricFilter) -> Vec<Observation> {
    filter
        .apply(metrics)
        .into_iter()
        .map(|mut observation| {
            observation.path = observation
                .path
                .iter()
                .map(|segment| sanitize_segment_strict(segment))
                .collect();
            observation
        })
        .collect()
}

/// PgBouncer collector bound to an admin console session.
pub struct PgBouncerCollector<S: Session> {
    session: S,
}

impl<S: Session> PgBouncerCollector<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Collects stats, pool, database and backend metrics.
    ///
    /// Pools and databases are both fetched before aggregation.
    pub fn collect(&mut self, filter: &MetricFilter) -> Result<Vec<Observation>, CollectError> {
        let timestamp = Utc::now().timestamp();
        let mut metrics = Vec::new();

        let stats = self.session.query("SHOW STATS")?;
        metrics.extend(extract_stats_metrics(&stats, timestamp));

        let pools = self.session.query("SHOW POOLS")?;
        metrics.extend(extract_pool_metrics(&pools, timestamp));

        let databases = self.session.query("SHOW DATABASES")?;
        metrics.extend(extract_database_metrics(&databases, timestamp));
        metrics.extend(extract_backend_metrics(&databases, &pools, timestamp));

        info!(
            server_version = self.session.server_version(),
            pools = pools.row_count(),
            databases = databases.row_count(),
            collected = metrics.len(),
            "collected pgbouncer metrics"
        );
        Ok(finalize(metrics, filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn routing() -> TabularResult {
        TabularResult::from_rows(
            &["name", "host", "port", "database", "force_user", "pool_size", "reserve_pool"],
            &[
                &[Some("app"), Some("10.0.0.1"), Some("6432"), Some("appdb"), None, Some("20"), Some("0")],
                &[Some("app_ro"), Some("10.0.0.1"), Some("6432"), Some("appdb"), Some("reader"), Some("10"), Some("2")],
                &[Some("local"), None, Some("5432"), Some("localdb"), None, Some("5"), Some("0")],
            ],
        )
    }

    fn pools(rows: &[&[Option<&str>]]) -> TabularResult {
        TabularResult::from_rows(
            &[
                "database", "user", "cl_active", "cl_waiting", "sv_active", "sv_idle", "sv_used",
                "sv_tested", "sv_login", "maxwait",
            ],
            rows,
        )
    }

    #[test]
    fn routing_defaults_host_and_user() {
        let routes = routing_entries(&routing());
        assert_eq!(routes["local"].host, "localhost");
        assert_eq!(routes["app"].user, RoutedUser::SameUser);
        assert_eq!(routes["app_ro"].user, RoutedUser::Forced("reader".into()));
    }

    #[test]
    fn inherited_users_form_distinct_groups() {
        let pools = pools(&[
            &[Some("app"), Some("alice"), Some("2"), Some("0"), Some("1"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0")],
            &[Some("app"), Some("bob"), Some("3"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0")],
        ]);
        let groups = aggregate_backends(&routing_entries(&routing()), &pools);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0.user, "alice");
        assert_eq!(groups[0].1.sums[0], 2);
        assert_eq!(groups[0].1.sums[2], 1);
        assert_eq!(groups[1].0.user, "bob");
        assert_eq!(groups[1].1.sums[0], 3);
        assert_eq!(groups[1].1.sums[2], 0);
    }

    #[test]
    fn forced_user_merges_pools_and_keeps_max_wait() {
        let pools = pools(&[
            &[Some("app_ro"), Some("alice"), Some("2"), Some("1"), Some("1"), Some("4"), Some("0"), Some("0"), Some("0"), Some("7")],
            &[Some("app_ro"), Some("bob"), Some("3"), Some("0"), Some("2"), Some("1"), Some("1"), Some("0"), Some("0"), Some("3")],
        ]);
        let groups = aggregate_backends(&routing_entries(&routing()), &pools);

        assert_eq!(groups.len(), 1);
        let (key, stats) = &groups[0];
        assert_eq!(
            key,
            &BackendKey {
                host: "10.0.0.1".into(),
                port: "6432".into(),
                database: "appdb".into(),
                user: "reader".into(),
            }
        );
        assert_eq!(stats.sums, [5, 1, 3, 5, 1, 0, 0]);
        assert_eq!(stats.max_wait, 7);
    }

    #[test]
    fn pools_without_route_are_skipped() {
        let pools = pools(&[
            &[Some("pgbouncer"), Some("admin"), Some("1"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0")],
        ]);
        assert!(aggregate_backends(&routing_entries(&routing()), &pools).is_empty());
    }

    #[test]
    fn unparsable_counters_count_as_zero() {
        assert_eq!(coerce_int(None), 0);
        assert_eq!(coerce_int(Some("abc")), 0);
        assert_eq!(coerce_int(Some(" 12 ")), 12);
        assert_eq!(coerce_int(Some("2.9")), 2);
        assert_eq!(coerce_int(Some("12abc")), 12);
        assert_eq!(coerce_int(Some("-3")), -3);
        assert_eq!(coerce_int(Some("99999999999999999999")), i64::MAX);
    }

    #[test]
    fn large_counters_saturate_instead_of_overflowing() {
        let pools = pools(&[
            &[Some("app_ro"), Some("alice"), Some("9223372036854775807"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0"), Some("9223372036854775807")],
            &[Some("app_ro"), Some("bob"), Some("1"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0"), Some("1")],
        ]);
        let groups = aggregate_backends(&routing_entries(&routing()), &pools);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].1.sums[0], i64::MAX);
        assert_eq!(groups[0].1.max_wait, i64::MAX);
    }

    #[test]
    fn pools_without_user_are_skipped() {
        let pools = pools(&[
            &[Some("app"), None, Some("1"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0")],
            &[Some("app"), Some("alice"), Some("2"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0")],
            &[Some("app_ro"), None, Some("4"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0")],
        ]);
        let metrics = extract_backend_metrics(&routing(), &pools, 0);

        assert!(metrics.iter().all(|m| m.path.iter().all(|s| !s.is_empty())));
        let groups = aggregate_backends(&routing_entries(&routing()), &pools);
        let users: Vec<&str> = groups.iter().map(|(key, _)| key.user.as_str()).collect();
        assert_eq!(users, vec!["alice", "reader"]);
    }

    #[test]
    fn backend_paths_are_strictly_sanitized() {
        let pools = pools(&[
            &[Some("local"), Some("svc@corp"), Some("1"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0"), Some("0"), Some("250")],
        ]);
        let metrics = finalize(
            extract_backend_metrics(&routing(), &pools, 0),
            &MetricFilter::new(),
        );

        assert_eq!(metrics.len(), BACKEND_SUM_COLUMNS.len() + 1);
        assert_eq!(
            metrics[0].dotted_path(),
            "backends.localhost.5432.localdb.svc_corp.cl_active"
        );
        let last = metrics.last().unwrap();
        assert_eq!(last.dotted_path(), "backends.localhost.5432.localdb.svc_corp.max_wait");
        assert_eq!(last.value, Some(MetricValue::Integer(250)));
    }

    #[test]
    fn missing_stats_columns_are_filtered() {
        let stats = TabularResult::from_rows(
            &["database", "total_xact_count", "avg_query_count"],
            &[&[Some("app.v2"), Some("100"), Some("4")]],
        );
        let metrics = finalize(extract_stats_metrics(&stats, 0), &MetricFilter::new());
        let names: Vec<String> = metrics.iter().map(|m| m.dotted_path()).collect();
        assert_eq!(
            names,
            vec!["stats.app_v2.total_xact_count", "stats.app_v2.avg_query_count"]
        );
    }

    #[test]
    fn exclusion_applies_before_sanitizing() {
        let metrics = extract_database_metrics(&routing(), 0);
        let filter = MetricFilter::with_exclude(Some(Regex::new("^app_ro$").unwrap()));
        let kept = finalize(metrics, &filter);
        assert_eq!(kept.len(), 4);
        assert!(kept.iter().all(|m| m.path[1] != "app_ro"));
    }

    #[test]
    fn collect_reads_console_in_order() {
        use crate::session::MockSession;

        let mut session = MockSession::new("PgBouncer 1.21.0");
        session
            .add_result(
                "SHOW STATS",
                TabularResult::from_rows(&["database", "total_xact_count"], &[&[Some("app"), Some("10")]]),
            )
            .add_result(
                "SHOW POOLS",
                pools(&[
                    &[Some("app"), Some("alice"), Some("2"), Some("0"), Some("1"), Some("0"), Some("0"), Some("0"), Some("0"), Some("5")],
                ]),
            )
            .add_result("SHOW DATABASES", routing());

        let mut collector = PgBouncerCollector::new(session);
        let metrics = collector.collect(&MetricFilter::new()).unwrap();

        assert_eq!(
            collector.session().executed(),
            &["SHOW STATS", "SHOW POOLS", "SHOW DATABASES"]
        );
        let names: Vec<String> = metrics.iter().map(|m| m.dotted_path()).collect();
        assert_eq!(names[0], "stats.app.total_xact_count");
        assert!(names.contains(&"pools.app.alice.maxwait".to_string()));
        assert!(names.contains(&"databases.app_ro.reserve_pool".to_string()));
        assert!(names.contains(&"backends.10_0_0_1.6432.appdb.alice.max_wait".to_string()));
        // 1 stats + 8 pool + 6 database + 8 backend
        assert_eq!(metrics.len(), 23);
    }
}
