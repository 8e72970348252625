//! pg_metrics_statsd - send PostgreSQL or PgBouncer metrics to StatsD.
//!
//! Usage:
//!   pg_metrics_statsd -c "host=db1 user=monitor"             # instance metrics
//!   pg_metrics_statsd -c "host=db1" -d prod --locks           # per-database metrics
//!   pg_metrics_statsd -c "host=pool port=6432" --pgbouncer    # PgBouncer metrics
//!
//! Runs a single collection pass and exits non-zero on any failure.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::process::ExitCode;

use clap::Parser;
use tracing::{Level, debug, error, info};
use tracing_subscriber::EnvFilter;

use pg_metrics::CollectError;
use pg_metrics::Observation;
use pg_metrics::cli::{Args, Mode};
use pg_metrics::collector::{APPLICATION_NAME, PgBouncerCollector, PostgresCollector};
use pg_metrics::session::PgSession;
use pg_metrics::transport::{StatsdSink, send_all};

/// Initializes the tracing subscriber. Default level is INFO, `-q` shows errors only.
fn init_logging(quiet: bool) {
    let level = if quiet { Level::ERROR } else { Level::INFO };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("pg_metrics={}", level).parse().unwrap())
        .add_directive(format!("pg_metrics_statsd={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn collect(args: &Args) -> Result<Vec<Observation>, CollectError> {
    let conn = args.connection_string();
    let filter = args.filter();

    match args.mode() {
        Mode::Instance => {
            let session = PgSession::connect(&conn, APPLICATION_NAME)?;
            PostgresCollector::new(session)?.collect_instance(&filter)
        }
        Mode::Database { dbname, families } => {
            debug!(database = %dbname, families = ?families, "database mode");
            let session = PgSession::connect(&conn, APPLICATION_NAME)?;
            PostgresCollector::new(session)?.collect_database(&dbname, &families, &filter)
        }
        Mode::PgBouncer => {
            let session = PgSession::connect_pgbouncer(&conn)?;
            PgBouncerCollector::new(session).collect(&filter)
        }
    }
}

fn run(args: &Args) -> Result<usize, CollectError> {
    let observations = collect(args)?;

    if args.verbose {
        for observation in &observations {
            if let Some(value) = &observation.value {
                println!("{} {}", observation.dotted_path(), value);
            }
        }
    }

    let scheme = args.scheme();
    let mut sink = StatsdSink::connect(&args.host, args.port, &scheme)?;
    info!(statsd = %sink.target(), scheme = %scheme, "sending metrics");
    send_all(&mut sink, &observations)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.quiet);

    match run(&args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "collection failed");
            ExitCode::FAILURE
        }
    }
}
