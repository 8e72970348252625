//! Version-gated metric catalog.
//!
//! Each metric family has one or more `(minimum version, query)` variants in
//! an ordered table. At session open the table is resolved against the
//! server version into an immutable [`Catalog`]: per family, the variant with
//! the greatest minimum version not above the server version wins. A family
//! without an eligible variant keeps its prefix but has no query and is
//! skipped by the collector.

mod queries;

use std::fmt;
use std::str::FromStr;

use queries::*;

/// PostgreSQL server version, `major.minor`.
///
/// Before 10 the major version is two components (`9.6`); since 10 the
/// second component is the patch level. Comparison works for both schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
}

impl ServerVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parses the `server_version` parameter, e.g. `9.6.24`,
    /// `16.2 (Debian 16.2-1.pgdg120+2)` or `17beta1`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (major, rest) = split_number(s)?;
        let minor = rest
            .strip_prefix('.')
            .and_then(split_number)
            .map(|(minor, _)| minor)
            .unwrap_or(0);
        Some(Self { major, minor })
    }
}

fn split_number(s: &str) -> Option<(u32, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let n = s[..end].parse().ok()?;
    Some((n, &s[end..]))
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A closed set of metric families.
pub trait MetricFamily: Copy + Eq + Ord + fmt::Debug + 'static {
    /// Every family, in catalog order.
    const ALL: &'static [Self];

    /// Stable name, as used on the command line.
    fn name(self) -> &'static str;
}

/// Server-wide metric families, collected from the `postgres` database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InstanceFamily {
    MaxConnections,
    SuperuserConnections,
    ArchiveFiles,
    Bgwriter,
    Sessions,
    DatabaseConnectionLimits,
    UserConnectionLimits,
    DatabaseSize,
    StreamingState,
    Transactions,
    Xlog,
}

impl MetricFamily for InstanceFamily {
    const ALL: &'static [Self] = &[
        Self::MaxConnections,
        Self::SuperuserConnections,
        Self::ArchiveFiles,
        Self::Bgwriter,
        Self::Sessions,
        Self::DatabaseConnectionLimits,
        Self::UserConnectionLimits,
        Self::DatabaseSize,
        Self::StreamingState,
        Self::Transactions,
        Self::Xlog,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::MaxConnections => "max_connections",
            Self::SuperuserConnections => "superuser_connections",
            Self::ArchiveFiles => "archive_files",
            Self::Bgwriter => "bgwriter",
            Self::Sessions => "sessions",
            Self::DatabaseConnectionLimits => "database_connection_limits",
            Self::UserConnectionLimits => "user_connection_limits",
            Self::DatabaseSize => "database_size",
            Self::StreamingState => "streaming_state",
            Self::Transactions => "transactions",
            Self::Xlog => "xlog",
        }
    }
}

/// Per-database metric families, selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DatabaseFamily {
    Functions,
    Locks,
    TableSize,
    IndexSize,
    TableStatio,
    TableStats,
    IndexStatio,
    IndexStats,
}

impl DatabaseFamily {
    /// Families collected when no selection flag says otherwise.
    pub const DEFAULTS: &'static [Self] = &[
        Self::TableSize,
        Self::IndexSize,
        Self::TableStatio,
        Self::TableStats,
        Self::IndexStatio,
        Self::IndexStats,
    ];
}

impl MetricFamily for DatabaseFamily {
    const ALL: &'static [Self] = &[
        Self::Functions,
        Self::Locks,
        Self::TableSize,
        Self::IndexSize,
        Self::TableStatio,
        Self::TableStats,
        Self::IndexStatio,
        Self::IndexStats,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Functions => "functions",
            Self::Locks => "locks",
            Self::TableSize => "table_size",
            Self::IndexSize => "index_size",
            Self::TableStatio => "table_statio",
            Self::TableStats => "table_stats",
            Self::IndexStatio => "index_statio",
            Self::IndexStats => "index_stats",
        }
    }
}

impl FromStr for DatabaseFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name() == normalized)
            .ok_or_else(|| format!("unknown metric family '{}'", s))
    }
}

/// One row of the version table.
#[derive(Debug, Clone, Copy)]
pub struct VersionedQuery<F> {
    pub family: F,
    pub min_version: ServerVersion,
    pub prefix: &'static [&'static str],
    pub query: &'static str,
}

const fn entry<F>(
    family: F,
    min_version: ServerVersion,
    prefix: &'static [&'static str],
    query: &'static str,
) -> VersionedQuery<F> {
    VersionedQuery {
        family,
        min_version,
        prefix,
        query,
    }
}

const ANY: ServerVersion = ServerVersion::new(0, 0);
const V8_4: ServerVersion = ServerVersion::new(8, 4);
const V9_1: ServerVersion = ServerVersion::new(9, 1);
const V9_2: ServerVersion = ServerVersion::new(9, 2);
const V10: ServerVersion = ServerVersion::new(10, 0);
const V17: ServerVersion = ServerVersion::new(17, 0);

/// Server version from which `SET application_name` is accepted.
pub const APPLICATION_NAME_MIN_VERSION: ServerVersion = ServerVersion::new(9, 0);

/// Instance families by minimum server version.
pub const INSTANCE_QUERIES: &[VersionedQuery<InstanceFamily>] = &[
    entry(InstanceFamily::MaxConnections, ANY, &["config", "instance", "max_connections"], MAX_CONNECTIONS),
    entry(
        InstanceFamily::SuperuserConnections,
        ANY,
        &["config", "instance", "superuser_reserved_connections"],
        SUPERUSER_CONNECTIONS,
    ),
    entry(InstanceFamily::ArchiveFiles, ANY, &["archive_files"], ARCHIVE_FILES_XLOG),
    entry(InstanceFamily::ArchiveFiles, V10, &["archive_files"], ARCHIVE_FILES_WAL),
    entry(InstanceFamily::Bgwriter, ANY, &["bgwriter"], BGWRITER),
    entry(InstanceFamily::Bgwriter, V17, &["bgwriter"], BGWRITER_CHECKPOINTER),
    entry(InstanceFamily::Sessions, ANY, &["sessions"], SESSIONS_PROCPID),
    entry(InstanceFamily::Sessions, V9_2, &["sessions"], SESSIONS),
    entry(InstanceFamily::DatabaseConnectionLimits, ANY, &["config", "database"], DATABASE_CONNECTION_LIMITS),
    entry(InstanceFamily::UserConnectionLimits, ANY, &["config", "user"], USER_CONNECTION_LIMITS),
    entry(InstanceFamily::DatabaseSize, ANY, &["database"], DATABASE_SIZE),
    entry(InstanceFamily::StreamingState, V9_1, &["streaming_state"], STREAMING_STATE),
    entry(InstanceFamily::Transactions, ANY, &["database"], TRANSACTIONS),
    entry(InstanceFamily::Xlog, V9_1, &["xlog"], XLOG_LOCATION),
    entry(InstanceFamily::Xlog, V10, &["xlog"], WAL_LSN),
];

/// Database families by minimum server version.
pub const DATABASE_QUERIES: &[VersionedQuery<DatabaseFamily>] = &[
    entry(DatabaseFamily::Functions, V8_4, &["function"], FUNCTIONS),
    entry(DatabaseFamily::Locks, ANY, &["table"], LOCKS),
    entry(DatabaseFamily::TableSize, ANY, &["table"], TABLE_SIZE),
    entry(DatabaseFamily::IndexSize, ANY, &["table"], INDEX_SIZE),
    entry(DatabaseFamily::TableStatio, ANY, &["table"], TABLE_STATIO),
    entry(DatabaseFamily::TableStats, ANY, &["table"], TABLE_STATS_BASIC),
    entry(DatabaseFamily::TableStats, V9_1, &["table"], TABLE_STATS),
    entry(DatabaseFamily::IndexStatio, ANY, &["table"], INDEX_STATIO),
    entry(DatabaseFamily::IndexStats, ANY, &["table"], INDEX_STATS),
];

/// A resolved catalog entry. `query` is `None` when the server is too old.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryDefinition<F> {
    pub family: F,
    pub prefix: &'static [&'static str],
    pub query: Option<&'static str>,
}

/// Catalog resolved for one server version; one definition per family.
#[derive(Debug, Clone)]
pub struct Catalog<F> {
    version: ServerVersion,
    definitions: Vec<QueryDefinition<F>>,
}

impl<F: MetricFamily> Catalog<F> {
    /// Resolves `table` for `version`, in `F::ALL` order.
    pub fn resolve(table: &[VersionedQuery<F>], version: ServerVersion) -> Self {
        let definitions = F::ALL
            .iter()
            .filter_map(|&family| {
                let variants = table.iter().filter(|q| q.family == family);
                let prefix = variants.clone().next()?.prefix;
                let chosen = variants
                    .filter(|q| q.min_version <= version)
                    .max_by_key(|q| q.min_version);
                Some(QueryDefinition {
                    family,
                    prefix: chosen.map(|q| q.prefix).unwrap_or(prefix),
                    query: chosen.map(|q| q.query),
                })
            })
            .collect();
        Self {
            version,
            definitions,
        }
    }

    pub fn version(&self) -> ServerVersion {
        self.version
    }

    pub fn definitions(&self) -> &[QueryDefinition<F>] {
        &self.definitions
    }

    pub fn get(&self, family: F) -> Option<&QueryDefinition<F>> {
        self.definitions.iter().find(|d| d.family == family)
    }

    /// Definitions whose family is in `families`, in catalog order.
    pub fn select<'a>(
        &'a self,
        families: &'a [F],
    ) -> impl Iterator<Item = &'a QueryDefinition<F>> + 'a {
        self.definitions
            .iter()
            .filter(move |d| families.contains(&d.family))
    }
}

impl Catalog<InstanceFamily> {
    pub fn instance(version: ServerVersion) -> Self {
        Self::resolve(INSTANCE_QUERIES, version)
    }
}

impl Catalog<DatabaseFamily> {
    pub fn database(version: ServerVersion) -> Self {
        Self::resolve(DATABASE_QUERIES, version)
    }
}
