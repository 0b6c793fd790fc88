//! Budget Controller
//!
//! Daily transfer allowance enforced across any number of runs. The day is
//! compared once, at run start; a run that crosses midnight keeps the day it
//! started with.

use crate::ledger::Ledger;
use crate::Result;
use chrono::NaiveDate;
use tracing::info;

/// Outcome of the start-of-run day check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayRollover {
    /// First run of a new day; same-day usage was cleared
    Reset,
    /// Same day as the previous run (or first run ever); usage carries over
    Continued,
}

/// True iff `usage + candidate` would go over `limit`
pub fn exceeds(usage_gb: f64, candidate_gb: f64, limit_gb: f64) -> bool {
    usage_gb + candidate_gb > limit_gb
}

/// True iff the ledger's last run happened on an earlier UTC day than `today`
pub fn is_new_day(ledger: &Ledger, today: NaiveDate) -> bool {
    ledger.last_run_date().is_some_and(|last| last < today)
}

/// Per-file admission against a fixed daily limit
#[derive(Debug, Clone, Copy)]
pub struct BudgetController {
    daily_limit_gb: f64,
}

impl BudgetController {
    pub fn new(daily_limit_gb: f64) -> Self {
        Self { daily_limit_gb }
    }

    pub fn daily_limit_gb(&self) -> f64 {
        self.daily_limit_gb
    }

    /// Start-of-run bookkeeping: clear same-day usage on a new day, then persist
    /// (which also records this run's counter).
    pub fn begin_run(&self, ledger: &mut Ledger, today: NaiveDate) -> Result<DayRollover> {
        let rollover = if is_new_day(ledger, today) {
            info!(
                last_run = ?ledger.last_run_date(),
                today = %today,
                "New day detected, resetting daily usage"
            );
            ledger.reset_day_usage()?;
            DayRollover::Reset
        } else {
            ledger.save()?;
            DayRollover::Continued
        };

        info!(
            run = ledger.run_counter(),
            used_gb = ledger.current_day_usage_gb(),
            limit_gb = self.daily_limit_gb,
            "Daily budget"
        );
        Ok(rollover)
    }

    /// True iff admitting `candidate_gb` would exceed today's limit
    pub fn would_exceed(&self, ledger: &Ledger, candidate_gb: f64) -> bool {
        exceeds(ledger.current_day_usage_gb(), candidate_gb, self.daily_limit_gb)
    }

    pub fn remaining_gb(&self, ledger: &Ledger) -> f64 {
        (self.daily_limit_gb - ledger.current_day_usage_gb()).max(0.0)
    }
}
