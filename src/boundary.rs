use crate::errors::{AppError, AppResult};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Resolves an IANA timezone name. The closer substitutes a configured
/// fallback zone on failure instead of aborting the pass.
pub fn resolve_timezone(name: &str) -> AppResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| AppError::Timezone(name.to_string()))
}

/// The calendar date at `now` in the given zone.
pub fn local_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// The next day eligible to close, if any.
///
/// With a cursor set, the candidate is the day after it; otherwise it is
/// yesterday, since today is still in progress. A day is eligible only once
/// the user's local date has moved strictly past it. Intentionally
/// single-day granular: catching up after downtime takes one pass per
/// missed day, keeping each pass bounded and cursor movement auditable.
pub fn target_day(local_today: NaiveDate, last_closed: Option<NaiveDate>) -> Option<NaiveDate> {
    let target = match last_closed {
        Some(day) => day.succ_opt()?,
        None => local_today.pred_opt()?,
    };
    (target < local_today).then_some(target)
}
