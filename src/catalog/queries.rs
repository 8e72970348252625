//! SQL text for the metric catalog.
//!
//! Column aliases follow the transducer conventions: leading `key*` columns
//! become path segments, a trailing `value` column is the sole value, any
//! other column name becomes the final path segment.

pub(super) const MAX_CONNECTIONS: &str = "SHOW max_connections";

pub(super) const SUPERUSER_CONNECTIONS: &str = "SHOW superuser_reserved_connections";

pub(super) const ARCHIVE_FILES_XLOG: &str = r#"
    SELECT CAST(COALESCE(SUM(CAST(archive_file ~ E'\\.ready$' AS int)), 0) AS INT) AS ready,
           CAST(COALESCE(SUM(CAST(archive_file ~ E'\\.done$' AS int)), 0) AS INT) AS done
    FROM pg_catalog.pg_ls_dir('pg_xlog/archive_status') AS archive_files (archive_file)
"#;

pub(super) const ARCHIVE_FILES_WAL: &str = r#"
    SELECT CAST(COALESCE(SUM(CAST(archive_file ~ E'\\.ready$' AS int)), 0) AS INT) AS ready,
           CAST(COALESCE(SUM(CAST(archive_file ~ E'\\.done$' AS int)), 0) AS INT) AS done
    FROM pg_catalog.pg_ls_dir('pg_wal/archive_status') AS archive_files (archive_file)
"#;

pub(super) const BGWRITER: &str = r#"
    SELECT checkpoints_timed, checkpoints_req, buffers_checkpoint,
           buffers_clean, maxwritten_clean, buffers_backend, buffers_alloc
    FROM pg_stat_bgwriter
"#;

/// PostgreSQL 17 moved checkpoint counters to `pg_stat_checkpointer`.
pub(super) const BGWRITER_CHECKPOINTER: &str = r#"
    SELECT c.num_timed AS checkpoints_timed,
           c.num_requested AS checkpoints_req,
           c.buffers_written AS buffers_checkpoint,
           b.buffers_clean, b.maxwritten_clean, b.buffers_alloc
    FROM pg_stat_bgwriter b, pg_stat_checkpointer c
"#;

pub(super) const SESSIONS_PROCPID: &str = r#"
    SELECT datname AS key, usename,
           CASE current_query
             WHEN NULL THEN 'disabled'
             WHEN '<IDLE>' THEN 'idle'
             WHEN '<IDLE> in transaction' THEN 'idle in transaction'
             ELSE 'active' END,
           count(*) AS value
    FROM pg_stat_activity
    WHERE procpid <> pg_backend_pid()
    GROUP BY datname, usename, 3
"#;

pub(super) const SESSIONS: &str = r#"
    SELECT datname AS key, usename AS key2, state AS key3, count(*) AS value
    FROM pg_stat_activity
    WHERE pid <> pg_backend_pid()
    GROUP BY datname, usename, state
"#;

pub(super) const DATABASE_CONNECTION_LIMITS: &str = r#"
    SELECT datname AS key,
           CASE WHEN datconnlimit <> -1 THEN datconnlimit
                ELSE current_setting('max_connections')::int END AS connection_limit
    FROM pg_database
    WHERE datallowconn AND NOT datistemplate
"#;

pub(super) const USER_CONNECTION_LIMITS: &str = r#"
    SELECT rolname AS key,
           CASE WHEN rolconnlimit <> -1 THEN rolconnlimit
                ELSE current_setting('max_connections')::int
                     - CASE WHEN rolsuper THEN 0
                            ELSE current_setting('superuser_reserved_connections')::int END
           END AS connection_limit
    FROM pg_roles
    WHERE rolcanlogin
"#;

pub(super) const DATABASE_SIZE: &str = r#"
    SELECT datname AS key, pg_database_size(oid) AS size
    FROM pg_database
    WHERE NOT datistemplate
"#;

pub(super) const STREAMING_STATE: &str = r#"
    SELECT CASE WHEN client_hostname IS NULL THEN 'socket' ELSE host(client_addr) END AS key,
           CASE state WHEN 'catchup' THEN 1 WHEN 'streaming' THEN 2 ELSE 0 END AS value
    FROM pg_stat_replication
"#;

pub(super) const TRANSACTIONS: &str = r#"
    SELECT dat.datname AS key, 'transactions' AS key2,
           xact_commit AS commit, xact_rollback AS rollback
    FROM pg_stat_database
    JOIN pg_database dat ON dat.oid = datid
    WHERE datallowconn AND NOT datistemplate
"#;

pub(super) const XLOG_LOCATION: &str = r#"
    SELECT CASE WHEN pg_is_in_recovery() THEN NULL ELSE pg_current_xlog_location() END AS location,
           pg_last_xlog_receive_location() AS receive_location,
           pg_last_xlog_replay_location() AS replay_location
"#;

pub(super) const WAL_LSN: &str = r#"
    SELECT CASE WHEN pg_is_in_recovery() THEN NULL ELSE pg_current_wal_lsn() END AS location,
           pg_last_wal_receive_lsn() AS receive_location,
           pg_last_wal_replay_lsn() AS replay_location
"#;

pub(super) const FUNCTIONS: &str = r#"
    SELECT schemaname AS key,
           array_to_string(ARRAY[funcname, '-', pronargs::TEXT,
                  CASE WHEN pronargs = 0 THEN ''
                  ELSE '-' || array_to_string(
                         CASE WHEN pronargs > 16
                              THEN ARRAY(SELECT args[i] FROM generate_series(1, 8) AS _(i))
                                   || '-'::TEXT
                                   || ARRAY(SELECT args[i]
                                            FROM generate_series(pronargs - 7, pronargs) AS _(i))
                                   || funcid::TEXT
                              ELSE args END, '-') END], '') AS key2,
           calls, total_time, self_time
    FROM (SELECT funcid, schemaname, funcname::TEXT, pronargs,
                 ARRAY(SELECT typname::TEXT
                       FROM pg_type
                       JOIN (SELECT args.i, proargtypes[args.i] AS typid
                             FROM pg_catalog.generate_series(0, array_upper(proargtypes, 1)) AS args (i))
                         AS args (i, typid) ON typid = pg_type.oid
                       ORDER BY i) AS args,
                 calls, total_time, self_time
          FROM pg_stat_user_functions
          JOIN pg_proc ON pg_proc.oid = funcid
          WHERE schemaname NOT IN ('information_schema', 'pg_catalog')) AS funcs
"#;

/// Table locks map to `key..key4`; index locks use all six key columns.
pub(super) const LOCKS: &str = r#"
    SELECT nspname AS key,
           CASE rel.relkind WHEN 'r' THEN rel.relname ELSE crel.relname END AS key2,
           CASE rel.relkind WHEN 'r' THEN 'locks' ELSE 'index' END AS key3,
           CASE rel.relkind WHEN 'r' THEN mode ELSE rel.relname END AS key4,
           CASE rel.relkind WHEN 'r' THEN NULL ELSE 'locks' END AS key5,
           CASE rel.relkind WHEN 'r' THEN NULL ELSE mode END AS key6,
           count(*) AS value
    FROM pg_locks
    JOIN pg_database dat ON dat.oid = database
    JOIN pg_class rel ON rel.oid = relation
    LEFT JOIN pg_index ON indexrelid = rel.oid
    LEFT JOIN pg_class crel ON indrelid = crel.oid
    JOIN pg_namespace nsp ON nsp.oid = rel.relnamespace
    WHERE locktype = 'relation' AND nspname <> 'pg_catalog' AND rel.relkind IN ('r', 'i')
    GROUP BY 1, 2, 3, 4, 5, 6
"#;

pub(super) const TABLE_SIZE: &str = r#"
    SELECT n.nspname AS key, r.relname AS key2,
           pg_relation_size(r.oid) AS size,
           pg_total_relation_size(r.oid) AS total_size
    FROM pg_class r
    JOIN pg_namespace n ON r.relnamespace = n.oid
    WHERE r.relkind = 'r'
      AND n.nspname NOT IN ('pg_catalog', 'information_schema')
"#;

pub(super) const INDEX_SIZE: &str = r#"
    SELECT n.nspname AS key, cr.relname AS key2, 'index' AS key3,
           ci.relname AS key4, pg_relation_size(ci.oid) AS size
    FROM pg_class ci
    JOIN pg_index i ON ci.oid = i.indexrelid
    JOIN pg_class cr ON cr.oid = i.indrelid
    JOIN pg_namespace n ON ci.relnamespace = n.oid
    WHERE ci.relkind = 'i' AND cr.relkind = 'r'
      AND n.nspname NOT IN ('pg_catalog', 'information_schema')
"#;

pub(super) const TABLE_STATIO: &str = r#"
    SELECT schemaname AS key, relname AS key2, 'statio' AS key3,
           nullif(heap_blks_read, 0) AS heap_blks_read,
           nullif(heap_blks_hit, 0) AS heap_blks_hit,
           nullif(idx_blks_read, 0) AS idx_blks_read,
           nullif(idx_blks_hit, 0) AS idx_blks_hit,
           nullif(toast_blks_read, 0) AS toast_blks_read,
           nullif(toast_blks_hit, 0) AS toast_blks_hit,
           nullif(tidx_blks_read, 0) AS tidx_blks_read,
           nullif(tidx_blks_hit, 0) AS tidx_blks_hit
    FROM pg_statio_user_tables
"#;

pub(super) const TABLE_STATS_BASIC: &str = r#"
    SELECT schemaname AS key, relname AS key2, 'stat' AS key3,
           nullif(seq_scan, 0) AS seq_scan,
           nullif(seq_tup_read, 0) AS seq_tup_read,
           nullif(idx_scan, 0) AS idx_scan,
           nullif(idx_tup_fetch, 0) AS idx_tup_fetch,
           nullif(n_tup_ins, 0) AS n_tup_ins,
           nullif(n_tup_upd, 0) AS n_tup_upd,
           nullif(n_tup_del, 0) AS n_tup_del,
           nullif(n_tup_hot_upd, 0) AS n_tup_hot_upd,
           nullif(n_live_tup, 0) AS n_live_tup,
           nullif(n_dead_tup, 0) AS n_dead_tup
    FROM pg_stat_user_tables
"#;

/// Adds vacuum/analyze counters, available since 9.1.
pub(super) const TABLE_STATS: &str = r#"
    SELECT schemaname AS key, relname AS key2, 'stat' AS key3,
           nullif(seq_scan, 0) AS seq_scan,
           nullif(seq_tup_read, 0) AS seq_tup_read,
           nullif(idx_scan, 0) AS idx_scan,
           nullif(idx_tup_fetch, 0) AS idx_tup_fetch,
           nullif(n_tup_ins, 0) AS n_tup_ins,
           nullif(n_tup_upd, 0) AS n_tup_upd,
           nullif(n_tup_del, 0) AS n_tup_del,
           nullif(n_tup_hot_upd, 0) AS n_tup_hot_upd,
           nullif(n_live_tup, 0) AS n_live_tup,
           nullif(n_dead_tup, 0) AS n_dead_tup,
           nullif(vacuum_count, 0) AS vacuum_count,
           nullif(autovacuum_count, 0) AS autovacuum_count,
           nullif(analyze_count, 0) AS analyze_count,
           nullif(autoanalyze_count, 0) AS autoanalyze_count
    FROM pg_stat_user_tables
"#;

pub(super) const INDEX_STATIO: &str = r#"
    SELECT schemaname AS key, relname AS key2, 'index' AS key3,
           indexrelname AS key4, 'statio' AS key5,
           nullif(idx_blks_read, 0) AS idx_blks_read,
           nullif(idx_blks_hit, 0) AS idx_blks_hit
    FROM pg_statio_user_indexes
"#;

pub(super) const INDEX_STATS: &str = r#"
    SELECT schemaname AS key, relname AS key2, 'index' AS key3,
           indexrelname AS key4, 'stat' AS key5,
           nullif(idx_scan, 0) AS idx_scan,
           nullif(idx_tup_read, 0) AS idx_tup_read,
           nullif(idx_tup_fetch, 0) AS idx_tup_fetch
    FROM pg_stat_user_indexes
"#;
