use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use arena_models::portfolio::Portfolio;
use arena_models::storage_schema::{format_timestamp, LEDGER_TABLES_DDL};
use arena_models::trade::{TradeAction, TradeEvent};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::store::LedgerStore;

/// SQLite-backed ledger store.
///
/// Access is synchronized via `Mutex` since `rusqlite::Connection` is not `Sync`.
/// File databases run in WAL mode with a busy timeout so a second process
/// (a scheduled run overlapping a forced one) waits instead of failing.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Raw column values, decoded outside the rusqlite row closure.
struct PortfolioRow {
    agent_name: String,
    cash: String,
    holdings: String,
    marks: String,
    total_value: String,
    last_updated: DateTime<Utc>,
    version: i64,
}

struct EventRow {
    id: String,
    agent_name: String,
    symbol: String,
    action: String,
    price: String,
    quantity: i64,
    reason: String,
    simulated: bool,
    created_at: DateTime<Utc>,
}

const PORTFOLIO_COLUMNS: &str =
    "agent_name, cash, holdings, marks, total_value, last_updated, version";

const EVENT_COLUMNS: &str =
    "id, agent_name, symbol, action, price, quantity, reason, simulated, created_at";

impl SqliteStore {
    /// Open (or create) the ledger database. Creates the schema and enables WAL.
    pub fn open(path: &str) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(LEDGER_TABLES_DDL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(LEDGER_TABLES_DDL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LedgerError::Unavailable(format!("SQLite mutex poisoned: {e}")))?;
        f(&conn)
    }
}

fn read_portfolio_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PortfolioRow> {
    Ok(PortfolioRow {
        agent_name: row.get(0)?,
        cash: row.get(1)?,
        holdings: row.get(2)?,
        marks: row.get(3)?,
        total_value: row.get(4)?,
        last_updated: row.get(5)?,
        version: row.get(6)?,
    })
}

fn read_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: row.get(0)?,
        agent_name: row.get(1)?,
        symbol: row.get(2)?,
        action: row.get(3)?,
        price: row.get(4)?,
        quantity: row.get(5)?,
        reason: row.get(6)?,
        simulated: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Versioned portfolio write. `false` when the stored version moved on.
fn write_portfolio(conn: &Connection, portfolio: &Portfolio) -> Result<bool, LedgerError> {
    let holdings = serde_json::to_string(&portfolio.holdings)?;
    let marks = serde_json::to_string(&portfolio.marks)?;
    let changed = conn.execute(
        "UPDATE portfolios \
         SET cash = ?1, holdings = ?2, marks = ?3, total_value = ?4, \
             last_updated = ?5, version = version + 1 \
         WHERE agent_name = ?6 AND version = ?7",
        rusqlite::params![
            portfolio.cash.to_string(),
            holdings,
            marks,
            portfolio.total_value.to_string(),
            format_timestamp(&portfolio.last_updated),
            portfolio.agent_name,
            portfolio.version,
        ],
    )?;
    Ok(changed == 1)
}

fn write_event(conn: &Connection, event: &TradeEvent) -> Result<(), LedgerError> {
    let quantity = i64::try_from(event.quantity).map_err(|e| {
        LedgerError::Corrupt(format!("quantity={} does not fit the log: {e}", event.quantity))
    })?;
    conn.execute(
        &format!(
            "INSERT INTO logs ({EVENT_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        rusqlite::params![
            event.id.to_string(),
            event.agent_name,
            event.symbol,
            event.action.as_str(),
            event.price.to_string(),
            quantity,
            event.reason,
            event.simulated,
            format_timestamp(&event.created_at),
        ],
    )?;
    Ok(())
}

fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, LedgerError> {
    Decimal::from_str(raw).map_err(|e| LedgerError::Corrupt(format!("{field}={raw:?}: {e}")))
}

impl TryFrom<PortfolioRow> for Portfolio {
    type Error = LedgerError;

    fn try_from(row: PortfolioRow) -> Result<Self, Self::Error> {
        let holdings: BTreeMap<String, u64> = serde_json::from_str(&row.holdings)?;
        let marks: BTreeMap<String, Decimal> = serde_json::from_str(&row.marks)?;
        Ok(Portfolio {
            cash: parse_decimal("cash", &row.cash)?,
            total_value: parse_decimal("total_value", &row.total_value)?,
            agent_name: row.agent_name,
            holdings,
            marks,
            last_updated: row.last_updated,
            version: row.version,
        })
    }
}

impl TryFrom<EventRow> for TradeEvent {
    type Error = LedgerError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| LedgerError::Corrupt(format!("id={:?}: {e}", row.id)))?;
        let action = TradeAction::from_str(&row.action).map_err(LedgerError::Corrupt)?;
        let quantity = u64::try_from(row.quantity)
            .map_err(|e| LedgerError::Corrupt(format!("quantity={}: {e}", row.quantity)))?;
        Ok(TradeEvent {
            id,
            price: parse_decimal("price", &row.price)?,
            agent_name: row.agent_name,
            symbol: row.symbol,
            action,
            quantity,
            reason: row.reason,
            simulated: row.simulated,
            created_at: row.created_at,
        })
    }
}

impl LedgerStore for SqliteStore {
    fn get_portfolio(&self, agent_name: &str) -> Result<Option<Portfolio>, LedgerError> {
        let row = self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {PORTFOLIO_COLUMNS} FROM portfolios WHERE agent_name = ?1"
            ))?;
            Ok(stmt
                .query_row(rusqlite::params![agent_name], read_portfolio_row)
                .optional()?)
        })?;
        row.map(Portfolio::try_from).transpose()
    }

    fn update_portfolio(&self, portfolio: &Portfolio) -> Result<bool, LedgerError> {
        self.with_conn(|conn| write_portfolio(conn, portfolio))
    }

    fn insert_event(&self, event: &TradeEvent) -> Result<(), LedgerError> {
        self.with_conn(|conn| write_event(conn, event))
    }

    fn commit_trade(&self, portfolio: &Portfolio, event: &TradeEvent) -> Result<bool, LedgerError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            if !write_portfolio(&tx, portfolio)? {
                return Ok(false);
            }
            write_event(&tx, event)?;
            tx.commit()?;
            Ok(true)
        })
    }

    fn count_events_since(
        &self,
        agent_name: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, LedgerError> {
        let count: i64 = self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM logs WHERE agent_name = ?1 AND created_at >= ?2",
                rusqlite::params![agent_name, format_timestamp(&since)],
                |row| row.get(0),
            )?)
        })?;
        Ok(count.max(0) as u64)
    }

    fn create_portfolio(&self, portfolio: &Portfolio) -> Result<bool, LedgerError> {
        let holdings = serde_json::to_string(&portfolio.holdings)?;
        let marks = serde_json::to_string(&portfolio.marks)?;
        self.with_conn(|conn| {
            let inserted = conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO portfolios ({PORTFOLIO_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                rusqlite::params![
                    portfolio.agent_name,
                    portfolio.cash.to_string(),
                    holdings,
                    marks,
                    portfolio.total_value.to_string(),
                    format_timestamp(&portfolio.last_updated),
                    portfolio.version,
                ],
            )?;
            Ok(inserted == 1)
        })
    }

    fn list_portfolios(&self) -> Result<Vec<Portfolio>, LedgerError> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {PORTFOLIO_COLUMNS} FROM portfolios ORDER BY agent_name"
            ))?;
            let rows = stmt
                .query_map([], read_portfolio_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(Portfolio::try_from).collect()
    }

    fn events_since(
        &self,
        agent_name: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TradeEvent>, LedgerError> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {EVENT_COLUMNS} FROM logs \
                 WHERE agent_name = ?1 AND created_at >= ?2 ORDER BY created_at"
            ))?;
            let rows = stmt
                .query_map(
                    rusqlite::params![agent_name, format_timestamp(&since)],
                    read_event_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(TradeEvent::try_from).collect()
    }
}
