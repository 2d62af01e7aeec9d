use crate::boundary;
use crate::db::{Database, DayCloseOutcome};
use crate::errors::AppResult;
use crate::models::{Flag, User};
use crate::policy;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

/// Counters for one closing pass across all users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub users_closed: usize,
    pub users_skipped: usize,
    pub users_failed: usize,
    pub records_created: usize,
    pub records_existing: usize,
}

/// Fills in unrecorded days, one user-local day per user per pass.
///
/// Running a pass twice in succession is a no-op the second time: existing
/// records of either origin are never touched and the cursor only moves
/// forward. This is also what makes crash recovery safe; an unadvanced
/// cursor simply re-derives the same target day next pass.
pub struct AutoCloser {
    db: Arc<Database>,
    fallback_tz: Tz,
}

impl AutoCloser {
    pub fn new(db: Arc<Database>, fallback_tz: Tz) -> Self {
        Self { db, fallback_tz }
    }

    /// Runs one closing pass at the given instant. A failure closing one
    /// user is logged and counted; the remaining users still get their
    /// pass.
    pub fn run_pass(&self, now: DateTime<Utc>) -> AppResult<PassSummary> {
        let users = self.db.list_users()?;
        let mut summary = PassSummary::default();

        for user in users {
            match self.close_user(&user, now) {
                Ok(Some(outcome)) => {
                    summary.users_closed += 1;
                    summary.records_created += outcome.created;
                    summary.records_existing += outcome.existing;
                }
                Ok(None) => summary.users_skipped += 1,
                Err(error) => {
                    tracing::warn!(user_id = user.id, error = %error, "closing pass failed for user");
                    summary.users_failed += 1;
                }
            }
        }

        Ok(summary)
    }

    fn close_user(&self, user: &User, now: DateTime<Utc>) -> AppResult<Option<DayCloseOutcome>> {
        let tz = match boundary::resolve_timezone(&user.timezone) {
            Ok(tz) => tz,
            Err(_) => {
                tracing::warn!(
                    user_id = user.id,
                    timezone = %user.timezone,
                    fallback = %self.fallback_tz,
                    "invalid user timezone, using fallback"
                );
                self.fallback_tz
            }
        };

        let local_today = boundary::local_date(now, tz);
        let Some(target) = boundary::target_day(local_today, user.last_closed_date) else {
            return Ok(None);
        };

        let outcome = self.close_day(user, target, now)?;
        tracing::info!(
            user_id = user.id,
            date = %target,
            created = outcome.created,
            existing = outcome.existing,
            "closed day"
        );
        Ok(Some(outcome))
    }

    fn close_day(
        &self,
        user: &User,
        target: NaiveDate,
        now: DateTime<Utc>,
    ) -> AppResult<DayCloseOutcome> {
        let challenges = self.db.list_active_challenges(user.id)?;
        let defaults: Vec<(i64, Flag)> = challenges
            .iter()
            .map(|challenge| (challenge.id, policy::resolve(challenge)))
            .collect();

        self.db.close_user_day(user.id, target, &defaults, now)
    }
}
