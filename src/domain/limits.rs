//! Transfer limit policy
//!
//! Stateless caps evaluated before any balance mutation of a transfer:
//! a per-transaction cap and a rolling daily cap over the origin account's
//! TRANSFER_OUT movements. A rejection must never leave partial state, so
//! the orchestrator runs these checks before touching either account.

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;

use super::{Amount, DomainError};

/// Largest single transfer (Q)
pub const PER_TRANSACTION_LIMIT: Decimal = Decimal::from_parts(2000, 0, 0, false, 0);

/// Largest cumulative transfer total per local calendar day (Q)
pub const DAILY_LIMIT: Decimal = Decimal::from_parts(10000, 0, 0, false, 0);

/// Transfer limit policy
#[derive(Debug, Clone, Copy, Default)]
pub struct LimitPolicy;

impl LimitPolicy {
    /// Validate a transfer of `amount` given what the origin account already
    /// transferred out today.
    ///
    /// The daily total must be the sum of TRANSFER_OUT amounts from the
    /// origin account within today's local-time bounds (`local_day_bounds`).
    pub fn check(&self, amount: &Amount, transferred_today: Decimal) -> Result<(), DomainError> {
        if amount.value() > PER_TRANSACTION_LIMIT {
            return Err(DomainError::PerTransactionLimitExceeded {
                amount: amount.value(),
                limit: PER_TRANSACTION_LIMIT,
            });
        }

        if transferred_today + amount.value() > DAILY_LIMIT {
            return Err(DomainError::DailyLimitExceeded {
                spent_today: transferred_today,
                limit: DAILY_LIMIT,
            });
        }

        Ok(())
    }
}

/// `[start of today, start of tomorrow)` in server-local time, as UTC instants
/// for the database query.
pub fn local_day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_day = now.with_timezone(&Local).date_naive();
    let start = Local
        .from_local_datetime(&local_day.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);
    let end = start + chrono::Duration::days(1);
    (start, end)
}
