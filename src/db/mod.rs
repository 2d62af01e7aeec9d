use crate::errors::{AppError, AppResult};
use crate::models::{
    Challenge, ChallengePatch, DailyRecord, Flag, NewChallenge, Origin, User,
};
use crate::status;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Result of closing one user's target day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayCloseOutcome {
    pub created: usize,
    pub existing: usize,
}

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    pub fn create_user(&self, timezone: &str, now: DateTime<Utc>) -> AppResult<User> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (timezone, created_at) VALUES (?1, ?2)",
            params![timezone, now],
        )?;
        let id = conn.last_insert_rowid();

        Ok(User {
            id,
            timezone: timezone.to_string(),
            last_closed_date: None,
            created_at: now,
        })
    }

    pub fn get_user(&self, user_id: i64) -> AppResult<Option<User>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, timezone, last_closed_date, created_at FROM users WHERE id = ?1",
            [user_id],
            user_from_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn list_users(&self) -> AppResult<Vec<User>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, timezone, last_closed_date, created_at FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Advances the closing cursor. The guard keeps it monotonic even if a
    /// stale pass retries a day the cursor already moved past.
    pub fn update_user_cursor(&self, user_id: i64, day: NaiveDate) -> AppResult<()> {
        let conn = self.lock()?;
        update_cursor_on(&conn, user_id, day)
    }

    pub fn create_challenge(
        &self,
        user_id: i64,
        payload: &NewChallenge,
        now: DateTime<Utc>,
    ) -> AppResult<Challenge> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO challenges (user_id, title, description, miss_policy, is_active, is_template, created_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)",
            params![
                user_id,
                payload.title,
                payload.description,
                payload.miss_policy,
                payload.is_template,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();

        Ok(Challenge {
            id,
            user_id,
            title: payload.title.clone(),
            description: payload.description.clone(),
            miss_policy: payload.miss_policy.clone(),
            is_active: true,
            is_template: payload.is_template,
            created_at: now,
            updated_at: None,
        })
    }

    pub fn patch_challenge(
        &self,
        user_id: i64,
        challenge_id: i64,
        patch: &ChallengePatch,
        now: DateTime<Utc>,
    ) -> AppResult<Challenge> {
        let conn = self.lock()?;
        let existing = get_user_challenge_on(&conn, user_id, challenge_id)?
            .ok_or_else(|| AppError::NotFound(format!("challenge {challenge_id}")))?;

        let title = patch.title.clone().unwrap_or_else(|| existing.title.clone());
        let description = patch.description.clone().or_else(|| existing.description.clone());
        let miss_policy = patch
            .miss_policy
            .clone()
            .unwrap_or_else(|| existing.miss_policy.clone());
        let is_active = patch.is_active.unwrap_or(existing.is_active);

        conn.execute(
            "UPDATE challenges
             SET title = ?1, description = ?2, miss_policy = ?3, is_active = ?4, updated_at = ?5
             WHERE id = ?6 AND user_id = ?7",
            params![title, description, miss_policy, is_active, now, challenge_id, user_id],
        )?;

        Ok(Challenge {
            title,
            description,
            miss_policy,
            is_active,
            updated_at: Some(now),
            ..existing
        })
    }

    /// Challenges the closer operates on: active and adopted, never
    /// templates.
    pub fn list_active_challenges(&self, user_id: i64) -> AppResult<Vec<Challenge>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, description, miss_policy, is_active, is_template, created_at, updated_at
             FROM challenges
             WHERE user_id = ?1 AND is_active = 1 AND is_template = 0
             ORDER BY id",
        )?;
        let challenges = stmt
            .query_map([user_id], challenge_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(challenges)
    }

    pub fn get_user_challenge(
        &self,
        user_id: i64,
        challenge_id: i64,
    ) -> AppResult<Option<Challenge>> {
        let conn = self.lock()?;
        get_user_challenge_on(&conn, user_id, challenge_id)
    }

    pub fn find_record(
        &self,
        user_id: i64,
        challenge_id: i64,
        day: NaiveDate,
    ) -> AppResult<Option<DailyRecord>> {
        let conn = self.lock()?;
        find_record_on(&conn, user_id, challenge_id, day)
    }

    /// Inserts a record as-is. Fails with `Conflict` when a record for the
    /// same (user, challenge, date) already exists; it never overwrites.
    pub fn create_record(&self, record: &DailyRecord) -> AppResult<DailyRecord> {
        let conn = self.lock()?;
        let id = insert_record_on(&conn, record)?;
        Ok(DailyRecord {
            id,
            ..record.clone()
        })
    }

    /// Interactive upsert. Always lands as MANUAL; an edit to an existing
    /// record stamps `edited_at`.
    pub fn upsert_manual_record(
        &self,
        user_id: i64,
        challenge_id: i64,
        day: NaiveDate,
        flag: Flag,
        minutes_fact: Option<i64>,
        comment: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<DailyRecord> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let record = match find_record_on(&tx, user_id, challenge_id, day)? {
            None => {
                let mut record = blank_record(user_id, challenge_id, day, Origin::Manual, now);
                status::apply_single_flag(&mut record, flag);
                record.minutes_fact = minutes_fact;
                record.comment = comment.map(ToString::to_string);
                let id = insert_record_on(&tx, &record)?;
                DailyRecord { id, ..record }
            }
            Some(mut record) => {
                status::apply_single_flag(&mut record, flag);
                record.minutes_fact = minutes_fact;
                record.comment = comment.map(ToString::to_string);
                record.origin = Origin::Manual;
                record.updated_at = Some(now);
                record.edited_at = Some(now);
                tx.execute(
                    "UPDATE daily_log
                     SET origin = ?1, flag_min = ?2, flag_bonus = ?3, flag_skip = ?4, flag_fail = ?5,
                         minutes_fact = ?6, comment = ?7, updated_at = ?8, edited_at = ?8
                     WHERE id = ?9",
                    params![
                        record.origin.as_str(),
                        record.flag_min,
                        record.flag_bonus,
                        record.flag_skip,
                        record.flag_fail,
                        record.minutes_fact,
                        record.comment,
                        now,
                        record.id,
                    ],
                )?;
                record
            }
        };

        tx.commit()?;
        Ok(record)
    }

    /// Closes one user's target day as an atomic unit: missing records are
    /// created AUTO with their default flag, existing records of either
    /// origin are left alone, and the cursor advance commits together with
    /// the inserts or not at all.
    pub fn close_user_day(
        &self,
        user_id: i64,
        day: NaiveDate,
        defaults: &[(i64, Flag)],
        now: DateTime<Utc>,
    ) -> AppResult<DayCloseOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut outcome = DayCloseOutcome::default();
        for &(challenge_id, flag) in defaults {
            if find_record_on(&tx, user_id, challenge_id, day)?.is_some() {
                outcome.existing += 1;
                continue;
            }

            let mut record = blank_record(user_id, challenge_id, day, Origin::Auto, now);
            status::apply_single_flag(&mut record, flag);
            match insert_record_on(&tx, &record) {
                Ok(_) => {
                    tracing::debug!(
                        user_id,
                        challenge_id,
                        date = %day,
                        flag = flag.as_str(),
                        "auto record created"
                    );
                    outcome.created += 1;
                }
                // Another writer created the row between check and insert;
                // whatever it wrote wins.
                Err(AppError::Conflict(_)) => outcome.existing += 1,
                Err(other) => return Err(other),
            }
        }

        update_cursor_on(&tx, user_id, day)?;
        tx.commit()?;
        Ok(outcome)
    }

    pub fn list_challenge_records_since(
        &self,
        user_id: i64,
        challenge_id: i64,
        since: NaiveDate,
    ) -> AppResult<Vec<DailyRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, challenge_id, date, origin, flag_min, flag_bonus, flag_skip, flag_fail,
                    minutes_fact, comment, created_at, updated_at, edited_at
             FROM daily_log
             WHERE user_id = ?1 AND challenge_id = ?2 AND date >= ?3
             ORDER BY date",
        )?;
        let records = stmt
            .query_map(params![user_id, challenge_id, since], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn blank_record(
    user_id: i64,
    challenge_id: i64,
    day: NaiveDate,
    origin: Origin,
    now: DateTime<Utc>,
) -> DailyRecord {
    DailyRecord {
        id: 0,
        user_id,
        challenge_id,
        date: day,
        origin,
        flag_min: false,
        flag_bonus: false,
        flag_skip: false,
        flag_fail: false,
        minutes_fact: None,
        comment: None,
        created_at: now,
        updated_at: None,
        edited_at: None,
    }
}

fn find_record_on(
    conn: &Connection,
    user_id: i64,
    challenge_id: i64,
    day: NaiveDate,
) -> AppResult<Option<DailyRecord>> {
    conn.query_row(
        "SELECT id, user_id, challenge_id, date, origin, flag_min, flag_bonus, flag_skip, flag_fail,
                minutes_fact, comment, created_at, updated_at, edited_at
         FROM daily_log
         WHERE user_id = ?1 AND challenge_id = ?2 AND date = ?3",
        params![user_id, challenge_id, day],
        record_from_row,
    )
    .optional()
    .map_err(AppError::from)
}

fn insert_record_on(conn: &Connection, record: &DailyRecord) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO daily_log (
           user_id, challenge_id, date, origin, flag_min, flag_bonus, flag_skip, flag_fail,
           minutes_fact, comment, created_at, updated_at, edited_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            record.user_id,
            record.challenge_id,
            record.date,
            record.origin.as_str(),
            record.flag_min,
            record.flag_bonus,
            record.flag_skip,
            record.flag_fail,
            record.minutes_fact,
            record.comment,
            record.created_at,
            record.updated_at,
            record.edited_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn update_cursor_on(conn: &Connection, user_id: i64, day: NaiveDate) -> AppResult<()> {
    conn.execute(
        "UPDATE users
         SET last_closed_date = ?2
         WHERE id = ?1 AND (last_closed_date IS NULL OR last_closed_date < ?2)",
        params![user_id, day],
    )?;
    Ok(())
}

fn get_user_challenge_on(
    conn: &Connection,
    user_id: i64,
    challenge_id: i64,
) -> AppResult<Option<Challenge>> {
    conn.query_row(
        "SELECT id, user_id, title, description, miss_policy, is_active, is_template, created_at, updated_at
         FROM challenges
         WHERE id = ?1 AND user_id = ?2 AND is_template = 0",
        params![challenge_id, user_id],
        challenge_from_row,
    )
    .optional()
    .map_err(AppError::from)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        timezone: row.get(1)?,
        last_closed_date: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn challenge_from_row(row: &Row<'_>) -> rusqlite::Result<Challenge> {
    Ok(Challenge {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        miss_policy: row.get(4)?,
        is_active: row.get(5)?,
        is_template: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<DailyRecord> {
    let origin_raw: String = row.get(4)?;
    let origin = Origin::from_str(&origin_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown origin {origin_raw}").into(),
        )
    })?;

    Ok(DailyRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        challenge_id: row.get(2)?,
        date: row.get(3)?,
        origin,
        flag_min: row.get(5)?,
        flag_bonus: row.get(6)?,
        flag_skip: row.get(7)?,
        flag_fail: row.get(8)?,
        minutes_fact: row.get(9)?,
        comment: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
        edited_at: row.get(13)?,
    })
}

#[cfg(test)]
mod tests {
    use super::Database;
    use crate::errors::AppError;
    use crate::models::{Flag, NewChallenge, Origin};
    use chrono::{NaiveDate, Utc};

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        (dir, db)
    }

    fn date(value: &str) -> NaiveDate {
        value.parse().expect("date")
    }

    fn new_challenge(title: &str, policy: &str) -> NewChallenge {
        NewChallenge {
            title: title.to_string(),
            description: None,
            miss_policy: policy.to_string(),
            is_template: false,
        }
    }

    #[test]
    fn duplicate_record_insert_is_a_clean_conflict() {
        let (_dir, db) = test_db();
        let now = Utc::now();
        let user = db.create_user("UTC", now).expect("user");
        let challenge = db
            .create_challenge(user.id, &new_challenge("Fit", "FAIL"), now)
            .expect("challenge");
        let day = date("2024-01-02");

        let first = db
            .upsert_manual_record(user.id, challenge.id, day, Flag::Min, None, None, now)
            .expect("first insert");

        let duplicate = db.create_record(&first);
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));

        // The stored record is untouched by the failed insert.
        let stored = db
            .find_record(user.id, challenge.id, day)
            .expect("find")
            .expect("exists");
        assert_eq!(stored.id, first.id);
        assert!(stored.flag_min);
    }

    #[test]
    fn cursor_updates_are_monotonic() {
        let (_dir, db) = test_db();
        let user = db.create_user("UTC", Utc::now()).expect("user");

        db.update_user_cursor(user.id, date("2024-01-05")).expect("advance");
        db.update_user_cursor(user.id, date("2024-01-03")).expect("stale update");

        let loaded = db.get_user(user.id).expect("get").expect("exists");
        assert_eq!(loaded.last_closed_date, Some(date("2024-01-05")));
    }

    #[test]
    fn manual_upsert_stamps_edited_at_only_on_edits() {
        let (_dir, db) = test_db();
        let now = Utc::now();
        let user = db.create_user("UTC", now).expect("user");
        let challenge = db
            .create_challenge(user.id, &new_challenge("Reading", "MIN"), now)
            .expect("challenge");
        let day = date("2024-01-02");

        let created = db
            .upsert_manual_record(user.id, challenge.id, day, Flag::Bonus, Some(45), None, now)
            .expect("create");
        assert_eq!(created.origin, Origin::Manual);
        assert!(created.edited_at.is_none());
        assert!(created.flag_bonus);

        let edited = db
            .upsert_manual_record(
                user.id,
                challenge.id,
                day,
                Flag::Skip,
                None,
                Some("travel day"),
                now,
            )
            .expect("edit");
        assert_eq!(edited.id, created.id);
        assert!(edited.edited_at.is_some());
        assert!(edited.flag_skip);
        assert!(!edited.flag_bonus);
        assert_eq!(edited.comment.as_deref(), Some("travel day"));
    }

    #[test]
    fn active_listing_excludes_templates_and_inactive() {
        let (_dir, db) = test_db();
        let now = Utc::now();
        let user = db.create_user("UTC", now).expect("user");

        db.create_challenge(user.id, &new_challenge("Fit", "FAIL"), now)
            .expect("active");
        db.create_challenge(
            user.id,
            &NewChallenge {
                title: "Template".to_string(),
                description: None,
                miss_policy: "FAIL".to_string(),
                is_template: true,
            },
            now,
        )
        .expect("template");
        let paused = db
            .create_challenge(user.id, &new_challenge("Paused", "MIN"), now)
            .expect("paused");
        db.patch_challenge(
            user.id,
            paused.id,
            &crate::models::ChallengePatch {
                is_active: Some(false),
                ..Default::default()
            },
            now,
        )
        .expect("deactivate");

        let active = db.list_active_challenges(user.id).expect("list");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].title, "Fit");
    }

    #[test]
    fn close_user_day_advances_cursor_with_zero_challenges() {
        let (_dir, db) = test_db();
        let user = db.create_user("UTC", Utc::now()).expect("user");

        let outcome = db
            .close_user_day(user.id, date("2024-01-02"), &[], Utc::now())
            .expect("close");
        assert_eq!(outcome.created, 0);

        let loaded = db.get_user(user.id).expect("get").expect("exists");
        assert_eq!(loaded.last_closed_date, Some(date("2024-01-02")));
    }
}
