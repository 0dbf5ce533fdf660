//! Per-client daily submission quota.

use std::collections::HashMap;

use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct QuotaState {
    counts: HashMap<(String, NaiveDate), u32>,
    /// Date of the most recent admission; older dates are pruned when it moves.
    current_day: Option<NaiveDate>,
}

/// Counts submissions per (client, calendar day) and refuses the one that
/// would exceed the limit.
///
/// The check and the increment happen in one critical section, so concurrent
/// requests at the boundary admit exactly `limit` in total. Charged quota is
/// never refunded.
#[derive(Debug)]
pub struct DailyQuota {
    limit: u32,
    state: Mutex<QuotaState>,
}

impl DailyQuota {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            state: Mutex::new(QuotaState::default()),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Admit one submission for `client` today, in server local time.
    pub fn admit(&self, client: &str) -> bool {
        self.admit_on(client, Local::now().date_naive())
    }

    /// Admit one submission for `client` on `day`.
    pub fn admit_on(&self, client: &str, day: NaiveDate) -> bool {
        let mut state = self.state.lock();

        if state.current_day.map_or(true, |current| day > current) {
            state.current_day = Some(day);
            let before = state.counts.len();
            state.counts.retain(|(_, date), _| *date >= day);
            let pruned = before - state.counts.len();
            if pruned > 0 {
                debug!(pruned, "Pruned quota counters from previous days");
            }
        }

        let count = state.counts.entry((client.to_string(), day)).or_insert(0);
        if *count >= self.limit {
            return false;
        }
        *count += 1;
        true
    }

    /// Submissions admitted for `client` today.
    pub fn used(&self, client: &str) -> u32 {
        self.used_on(client, Local::now().date_naive())
    }

    /// Submissions admitted for `client` on `day`.
    pub fn used_on(&self, client: &str, day: NaiveDate) -> u32 {
        self.state
            .lock()
            .counts
            .get(&(client.to_string(), day))
            .copied()
            .unwrap_or(0)
    }
}
