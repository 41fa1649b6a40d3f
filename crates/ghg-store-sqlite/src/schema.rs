//! SQL schema for the GHG SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Decimal columns are TEXT holding the plain decimal string, so
/// DECIMAL(32,16) values survive without binary rounding.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Reference data. Written only by the loader; read-only to calculation.
CREATE TABLE IF NOT EXISTS emission_factors (
    category      TEXT NOT NULL,
    activity      TEXT NOT NULL,
    scope         INTEGER NOT NULL CHECK (scope IN (1, 2, 3)),
    co2_factor    TEXT,            -- NULL = unavailable, never zero
    ch4_factor    TEXT,
    n2o_factor    TEXT,
    biofuel_co2   TEXT,
    ar4_kgco2e    TEXT,
    ar5_kgco2e    TEXT,
    units         TEXT NOT NULL,
    last_updated  TEXT,            -- ISO 8601 date or NULL
    source        TEXT NOT NULL,
    source_origin TEXT NOT NULL,
    PRIMARY KEY (category, activity)
);

CREATE TABLE IF NOT EXISTS factor_loads (
    load_id         TEXT PRIMARY KEY,
    dataset_version TEXT NOT NULL,
    record_count    INTEGER NOT NULL,
    batch_count     INTEGER NOT NULL,
    mode            TEXT NOT NULL,   -- 'upsert' | 'replace'
    loaded_at       TEXT NOT NULL
);

-- One row per activity event; re-emitting an event replaces its row.
CREATE TABLE IF NOT EXISTS calculated_emissions (
    activity_event_id            TEXT PRIMARY KEY,
    asset_id                     TEXT,
    geo                          TEXT,   -- JSON {lat, long} or NULL
    origin_measurement_timestamp TEXT,   -- RFC 3339 UTC or NULL
    scope                        INTEGER NOT NULL,
    category                     TEXT NOT NULL,
    activity                     TEXT NOT NULL,
    source                       TEXT,
    raw_data                     TEXT NOT NULL,
    units                        TEXT NOT NULL,
    co2e_amount                  TEXT NOT NULL,
    co2e_unit                    TEXT NOT NULL,
    n2o_amount                   TEXT,
    n2o_unit                     TEXT,
    ch4_amount                   TEXT,
    ch4_unit                     TEXT,
    co2_amount                   TEXT,
    co2_unit                     TEXT,
    emissions_factor_amount      TEXT NOT NULL,
    emissions_factor_unit        TEXT NOT NULL,
    extra_json                   TEXT NOT NULL DEFAULT '{}'
);

-- Append-only triage log of events that produced no emission row.
CREATE TABLE IF NOT EXISTS rejections (
    rejection_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id            TEXT NOT NULL,
    activity_event_id TEXT NOT NULL,
    kind              TEXT NOT NULL,
    message           TEXT NOT NULL,
    recorded_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS rejections_run_idx   ON rejections(run_id);
CREATE INDEX IF NOT EXISTS emissions_factor_idx ON calculated_emissions(category, activity);

PRAGMA user_version = 1;
";
