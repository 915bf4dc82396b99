/// Tables shared by the ledger and the audit trail.
///
/// - `portfolios`: one row per agent. `cash`, `total_value` are decimal text;
///   `holdings` and `marks` are JSON objects keyed by symbol. `version` guards
///   conditional updates.
/// - `logs`: append-only trade events. `created_at` is RFC 3339 UTC with a
///   fixed microsecond width, so text comparison orders it correctly.
pub const LEDGER_TABLES_DDL: &str = "\
CREATE TABLE IF NOT EXISTS portfolios (
    agent_name    TEXT PRIMARY KEY,
    cash          TEXT NOT NULL,
    holdings      TEXT NOT NULL DEFAULT '{}',
    marks         TEXT NOT NULL DEFAULT '{}',
    total_value   TEXT NOT NULL,
    last_updated  TEXT NOT NULL,
    version       INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS logs (
    id          TEXT PRIMARY KEY,
    agent_name  TEXT NOT NULL,
    symbol      TEXT NOT NULL,
    action      TEXT NOT NULL,
    price       TEXT NOT NULL,
    quantity    INTEGER NOT NULL,
    reason      TEXT NOT NULL,
    simulated   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_logs_agent_created ON logs(agent_name, created_at);
";

/// Timestamp format written to every `*_at` / `last_updated` column.
pub fn format_timestamp(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
