//! Command line options for `pg_metrics_statsd`.
//!
//! `-h` selects the StatsD host, so clap's short help flag is disabled;
//! help is available as `--help`.

use clap::{ArgAction, Parser};
use regex::Regex;

use crate::catalog::DatabaseFamily;
use crate::metrics::MetricFilter;
use crate::session::set_conn_param;

const DEFAULT_SCHEME_SUFFIX: &str = "postgresql";
const PGBOUNCER_DATABASE: &str = "pgbouncer";
const INSTANCE_DATABASE: &str = "postgres";

/// PostgreSQL and PgBouncer metrics for StatsD.
#[derive(Parser, Debug)]
#[command(
    name = "pg_metrics_statsd",
    about = "Send PostgreSQL metrics to StatsD",
    version,
    disable_help_flag = true
)]
pub struct Args {
    /// StatsD host.
    #[arg(short = 'h', long, default_value = "localhost", value_name = "STATSD_HOST")]
    pub host: String,

    /// StatsD port.
    #[arg(short = 'p', long, default_value_t = 8125, value_name = "STATSD_PORT")]
    pub port: u16,

    /// PostgreSQL connection string (libpq key=value format).
    #[arg(short = 'c', long = "connection", default_value = "", value_name = "CONN")]
    pub connection: String,

    /// Collect per-database metrics for DBNAME instead of instance metrics.
    #[arg(short = 'd', long, value_name = "DBNAME")]
    pub dbname: Option<String>,

    /// Exclude metrics with any name segment matching REGEXP.
    #[arg(short = 'e', long, value_name = "REGEXP", value_parser = parse_regex)]
    pub exclude: Option<Regex>,

    /// Metric namespace. Default: <hostname>.postgresql
    #[arg(short = 's', long, value_name = "SCHEME")]
    pub scheme: Option<String>,

    /// Collect PgBouncer admin console metrics.
    #[arg(long, conflicts_with = "dbname")]
    pub pgbouncer: bool,

    /// PgBouncer admin user.
    #[arg(long, default_value = "admin", value_name = "USER")]
    pub pgbouncer_user: String,

    /// Start per-database family selection from an empty set.
    #[arg(long)]
    pub only: bool,

    #[arg(long, overrides_with = "no_functions", help = "Collect function statistics")]
    pub functions: bool,
    #[arg(long, overrides_with = "functions", hide = true)]
    pub no_functions: bool,

    #[arg(long, overrides_with = "no_locks", help = "Collect relation lock counts")]
    pub locks: bool,
    #[arg(long, overrides_with = "locks", hide = true)]
    pub no_locks: bool,

    #[arg(long, overrides_with = "no_table_size", help = "Collect table sizes [default]")]
    pub table_size: bool,
    #[arg(long, overrides_with = "table_size", help = "Skip table sizes")]
    pub no_table_size: bool,

    #[arg(long, overrides_with = "no_index_size", help = "Collect index sizes [default]")]
    pub index_size: bool,
    #[arg(long, overrides_with = "index_size", help = "Skip index sizes")]
    pub no_index_size: bool,

    #[arg(long, overrides_with = "no_table_statio", help = "Collect table I/O [default]")]
    pub table_statio: bool,
    #[arg(long, overrides_with = "table_statio", help = "Skip table I/O")]
    pub no_table_statio: bool,

    #[arg(long, overrides_with = "no_table_stats", help = "Collect table access [default]")]
    pub table_stats: bool,
    #[arg(long, overrides_with = "table_stats", help = "Skip table access")]
    pub no_table_stats: bool,

    #[arg(long, overrides_with = "no_index_statio", help = "Collect index I/O [default]")]
    pub index_statio: bool,
    #[arg(long, overrides_with = "index_statio", help = "Skip index I/O")]
    pub no_index_statio: bool,

    #[arg(long, overrides_with = "no_index_stats", help = "Collect index access [default]")]
    pub index_stats: bool,
    #[arg(long, overrides_with = "index_stats", help = "Skip index access")]
    pub no_index_stats: bool,

    /// Print collected metrics as `name value` lines.
    #[arg(long)]
    pub verbose: bool,

    /// Quiet mode - only log errors.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Print help.
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

/// What a run collects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Instance,
    Database {
        dbname: String,
        families: Vec<DatabaseFamily>,
    },
    PgBouncer,
}

fn parse_regex(s: &str) -> Result<Regex, String> {
    Regex::new(s).map_err(|e| e.to_string())
}

impl Args {
    pub fn mode(&self) -> Mode {
        if self.pgbouncer {
            Mode::PgBouncer
        } else if let Some(dbname) = &self.dbname {
            Mode::Database {
                dbname: dbname.clone(),
                families: self.database_families(),
            }
        } else {
            Mode::Instance
        }
    }

    /// Per-database families to collect, in catalog order.
    ///
    /// Starts from the defaults (empty with `--only`), adds every family
    /// given as `--<family>` and removes every `--no-<family>`. For one family
    /// the flag given last wins.
    pub fn database_families(&self) -> Vec<DatabaseFamily> {
        let mut selected: Vec<DatabaseFamily> = if self.only {
            Vec::new()
        } else {
            DatabaseFamily::DEFAULTS.to_vec()
        };

        for (family, enable, disable) in self.family_toggles() {
            if enable && !selected.contains(&family) {
                selected.push(family);
            }
            if disable {
                selected.retain(|f| *f != family);
            }
        }

        selected.sort();
        selected
    }

    fn family_toggles(&self) -> [(DatabaseFamily, bool, bool); 8] {
        [
            (DatabaseFamily::Functions, self.functions, self.no_functions),
            (DatabaseFamily::Locks, self.locks, self.no_locks),
            (DatabaseFamily::TableSize, self.table_size, self.no_table_size),
            (DatabaseFamily::IndexSize, self.index_size, self.no_index_size),
            (DatabaseFamily::TableStatio, self.table_statio, self.no_table_statio),
            (DatabaseFamily::TableStats, self.table_stats, self.no_table_stats),
            (DatabaseFamily::IndexStatio, self.index_statio, self.no_index_statio),
            (DatabaseFamily::IndexStats, self.index_stats, self.no_index_stats),
        ]
    }

    /// Connection string for the selected mode.
    pub fn connection_string(&self) -> String {
        match self.mode() {
            Mode::Instance => set_conn_param(&self.connection, "dbname", INSTANCE_DATABASE),
            Mode::Database { dbname, .. } => set_conn_param(&self.connection, "dbname", &dbname),
            Mode::PgBouncer => {
                let conn = set_conn_param(&self.connection, "dbname", PGBOUNCER_DATABASE);
                set_conn_param(&conn, "user", &self.pgbouncer_user)
            }
        }
    }

    /// StatsD namespace.
    pub fn scheme(&self) -> String {
        self.scheme
            .clone()
            .unwrap_or_else(|| format!("{}.{}", hostname(), DEFAULT_SCHEME_SUFFIX))
    }

    pub fn filter(&self) -> MetricFilter {
        MetricFilter::with_exclude(self.exclude.clone())
    }
}

/// Local host name: `/proc/sys/kernel/hostname`, then `$HOSTNAME`, then `localhost`.
pub fn hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .or_else(|| std::env::var("HOSTNAME").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("pg_metrics_statsd").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn sensible_defaults() {
        let args = parse(&[]);
        assert_eq!(args.host, "localhost");
        assert_eq!(args.port, 8125);
        assert_eq!(args.connection, "");
        assert!(args.scheme().ends_with(".postgresql"));
        assert_eq!(args.mode(), Mode::Instance);
        assert_eq!(args.connection_string(), "dbname=postgres");
    }

    #[test]
    fn host_and_port() {
        let args = parse(&["--host", "127.0.0.1", "--port", "9000"]);
        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.port, 9000);

        let args = parse(&["-h", "statsd", "-p", "8126"]);
        assert_eq!(args.host, "statsd");
        assert_eq!(args.port, 8126);
    }

    #[test]
    fn exclude_regexp() {
        let args = parse(&["--exclude", "xdrop"]);
        assert_eq!(args.exclude.as_ref().map(Regex::as_str), Some("xdrop"));
        assert!(Args::try_parse_from(["pg_metrics_statsd", "-e", "(unclosed"]).is_err());
    }

    #[test]
    fn connection_and_dbname() {
        let args = parse(&["--connection", "host=localhost port=5493", "--dbname", "prod"]);
        assert_eq!(args.connection, "host=localhost port=5493");
        assert_eq!(args.connection_string(), "host=localhost port=5493 dbname=prod");
        assert_eq!(
            args.mode(),
            Mode::Database {
                dbname: "prod".into(),
                families: DatabaseFamily::DEFAULTS.to_vec(),
            }
        );
    }

    #[test]
    fn pgbouncer_connection() {
        let args = parse(&["-c", "host=pool port=6432 user=app", "--pgbouncer"]);
        assert_eq!(args.mode(), Mode::PgBouncer);
        assert_eq!(
            args.connection_string(),
            "host=pool port=6432 user=admin dbname=pgbouncer"
        );
        assert!(Args::try_parse_from(["pg_metrics_statsd", "--pgbouncer", "-d", "x"]).is_err());
    }

    #[test]
    fn positive_flags_add_to_defaults() {
        let args = parse(&["--functions", "--locks"]);
        let families = args.database_families();
        assert_eq!(families.len(), DatabaseFamily::DEFAULTS.len() + 2);
        assert_eq!(families[0], DatabaseFamily::Functions);
        assert_eq!(families[1], DatabaseFamily::Locks);
    }

    #[test]
    fn negative_flags_remove_from_defaults() {
        let args = parse(&["--no-table-statio", "--no-index-statio"]);
        assert_eq!(
            args.database_families(),
            vec![
                DatabaseFamily::TableSize,
                DatabaseFamily::IndexSize,
                DatabaseFamily::TableStats,
                DatabaseFamily::IndexStats,
            ]
        );
    }

    #[test]
    fn only_starts_from_empty() {
        let args = parse(&["--only", "--locks", "--table-size"]);
        assert_eq!(
            args.database_families(),
            vec![DatabaseFamily::Locks, DatabaseFamily::TableSize]
        );
        assert!(parse(&["--only"]).database_families().is_empty());
    }

    #[test]
    fn last_flag_wins() {
        let args = parse(&["--no-table-size", "--table-size"]);
        assert!(args.database_families().contains(&DatabaseFamily::TableSize));

        let args = parse(&["--locks", "--no-locks"]);
        assert!(!args.database_families().contains(&DatabaseFamily::Locks));
    }
}
