use std::sync::Arc;

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use tracing::{debug, error};

use crate::error::LedgerError;
use crate::store::LedgerStore;

pub const DEFAULT_MAX_DAILY_TRADES: u32 = 5;

/// Midnight UTC of the day containing `now`.
///
/// The one day boundary used for quota counting and for daily reporting.
pub fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN))
}

/// Counts an agent's trade events for the current UTC day against a ceiling.
///
/// Check-then-act against the same log the executor appends to, so two
/// overlapping cycles can each see `ceiling - 1` and both proceed. Enforcement
/// is best-effort.
pub struct QuotaTracker {
    store: Arc<dyn LedgerStore>,
    ceiling: u32,
}

impl QuotaTracker {
    pub fn new(store: Arc<dyn LedgerStore>, ceiling: u32) -> Self {
        Self { store, ceiling }
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn trades_today(&self, agent_name: &str, now: DateTime<Utc>) -> Result<u64, LedgerError> {
        self.store
            .count_events_since(agent_name, start_of_utc_day(now))
    }

    pub fn is_limit_reached(&self, agent_name: &str) -> bool {
        self.is_limit_reached_at(agent_name, Utc::now())
    }

    /// Fails closed: if the log cannot be read, the limit counts as reached.
    pub fn is_limit_reached_at(&self, agent_name: &str, now: DateTime<Utc>) -> bool {
        match self.trades_today(agent_name, now) {
            Ok(count) => {
                debug!(agent = %agent_name, count, ceiling = self.ceiling, "Quota check");
                count >= u64::from(self.ceiling)
            }
            Err(e) => {
                error!(agent = %agent_name, error = %e, "Quota check failed, blocking trades");
                true
            }
        }
    }
}
