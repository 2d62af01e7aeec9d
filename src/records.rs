use crate::boundary;
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    ChallengeHistory, DailyRecord, DayItem, DayView, Flag, HistoryItem, StatusView,
    UpsertDailyRecord, User,
};
use crate::status;
use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;

/// Interactive record upsert. Validates the flag name before anything is
/// touched, resolves the challenge against the owning user, and lands the
/// outcome as MANUAL. The date defaults to the user's current local day
/// when the payload leaves it out, using the same fallback zone as the
/// closer for unresolvable timezones.
pub fn upsert_manual_record(
    db: &Database,
    user: &User,
    payload: &UpsertDailyRecord,
    fallback_tz: Tz,
    now: DateTime<Utc>,
) -> AppResult<DailyRecord> {
    let flag = Flag::parse(&payload.flag)?;
    let day = payload.date.unwrap_or_else(|| {
        let tz = boundary::resolve_timezone(&user.timezone).unwrap_or_else(|_| {
            tracing::warn!(
                user_id = user.id,
                timezone = %user.timezone,
                fallback = %fallback_tz,
                "invalid user timezone, using fallback"
            );
            fallback_tz
        });
        boundary::local_date(now, tz)
    });

    let challenge = db
        .get_user_challenge(user.id, payload.challenge_id)?
        .ok_or_else(|| AppError::NotFound(format!("challenge {}", payload.challenge_id)))?;

    db.upsert_manual_record(
        user.id,
        challenge.id,
        day,
        flag,
        payload.minutes_fact,
        payload.comment.as_deref(),
        now,
    )
}

/// Per-day view for a user: one item per active challenge with its derived
/// status, plus the first challenge still waiting for an outcome.
pub fn build_day_view(db: &Database, user: &User, day: NaiveDate) -> AppResult<DayView> {
    let is_day_closed = user
        .last_closed_date
        .is_some_and(|closed| closed >= day);

    let challenges = db.list_active_challenges(user.id)?;
    let mut all = Vec::with_capacity(challenges.len());
    let mut first_uncompleted: Option<DayItem> = None;

    for challenge in challenges {
        let record = db.find_record(user.id, challenge.id, day)?;
        let status_view = status::compute_status_view(record.as_ref());

        let item = DayItem {
            challenge_id: challenge.id,
            title: challenge.title,
            status_view,
        };
        if first_uncompleted.is_none() && status_view == StatusView::Waiting {
            first_uncompleted = Some(item.clone());
        }
        all.push(item);
    }

    Ok(DayView {
        date: day,
        is_day_closed,
        first_uncompleted,
        all,
    })
}

/// Outcome history for one challenge over the last `days` days ending at
/// `today` inclusive.
pub fn build_challenge_history(
    db: &Database,
    user_id: i64,
    challenge_id: i64,
    days: u32,
    today: NaiveDate,
) -> AppResult<ChallengeHistory> {
    let since = today
        .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .unwrap_or(today);

    let records = db.list_challenge_records_since(user_id, challenge_id, since)?;
    let items = records
        .into_iter()
        .map(|record| HistoryItem {
            date: record.date,
            status_view: status::compute_status_view(Some(&record)),
            minutes_fact: record.minutes_fact,
            comment: record.comment,
        })
        .collect();

    Ok(ChallengeHistory {
        challenge_id,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::{build_challenge_history, build_day_view, upsert_manual_record};
    use crate::db::Database;
    use crate::errors::AppError;
    use crate::models::{NewChallenge, Origin, StatusView, UpsertDailyRecord};
    use chrono::{DateTime, NaiveDate, Utc};

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        (dir, db)
    }

    fn date(value: &str) -> NaiveDate {
        value.parse().expect("date")
    }

    fn instant(value: &str) -> DateTime<Utc> {
        value.parse().expect("instant")
    }

    fn challenge(title: &str) -> NewChallenge {
        NewChallenge {
            title: title.to_string(),
            description: None,
            miss_policy: "FAIL".to_string(),
            is_template: false,
        }
    }

    #[test]
    fn upsert_rejects_unknown_flags_before_writing() {
        let (_dir, db) = test_db();
        let now = Utc::now();
        let user = db.create_user("UTC", now).expect("user");
        let fit = db.create_challenge(user.id, &challenge("Fit"), now).expect("fit");

        let result = upsert_manual_record(
            &db,
            &user,
            &UpsertDailyRecord {
                challenge_id: fit.id,
                date: Some(date("2024-01-02")),
                flag: "DONE".to_string(),
                minutes_fact: None,
                comment: None,
            },
            chrono_tz::UTC,
            now,
        );
        assert!(matches!(result, Err(AppError::InvalidFlag(_))));
        assert!(db
            .find_record(user.id, fit.id, date("2024-01-02"))
            .expect("find")
            .is_none());
    }

    #[test]
    fn upsert_rejects_another_users_challenge() {
        let (_dir, db) = test_db();
        let now = Utc::now();
        let owner = db.create_user("UTC", now).expect("owner");
        let stranger = db.create_user("UTC", now).expect("stranger");
        let fit = db.create_challenge(owner.id, &challenge("Fit"), now).expect("fit");

        let result = upsert_manual_record(
            &db,
            &stranger,
            &UpsertDailyRecord {
                challenge_id: fit.id,
                date: Some(date("2024-01-02")),
                flag: "MIN".to_string(),
                minutes_fact: None,
                comment: None,
            },
            chrono_tz::UTC,
            now,
        );
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn upsert_lands_manual_and_day_view_reflects_it() {
        let (_dir, db) = test_db();
        let now = Utc::now();
        let user = db.create_user("UTC", now).expect("user");
        let fit = db.create_challenge(user.id, &challenge("Fit"), now).expect("fit");
        let reading = db
            .create_challenge(user.id, &challenge("Reading"), now)
            .expect("reading");
        let day = date("2024-01-02");

        let record = upsert_manual_record(
            &db,
            &user,
            &UpsertDailyRecord {
                challenge_id: fit.id,
                date: Some(day),
                flag: "BONUS".to_string(),
                minutes_fact: Some(40),
                comment: None,
            },
            chrono_tz::UTC,
            now,
        )
        .expect("upsert");
        assert_eq!(record.origin, Origin::Manual);

        let user = db.get_user(user.id).expect("get").expect("exists");
        let view = build_day_view(&db, &user, day).expect("view");
        assert!(!view.is_day_closed);
        assert_eq!(view.all.len(), 2);
        assert_eq!(view.all[0].status_view, StatusView::Bonus);
        assert_eq!(view.all[1].status_view, StatusView::Waiting);
        let first = view.first_uncompleted.as_ref().expect("waiting item");
        assert_eq!(first.challenge_id, reading.id);

        // The view serializes with the WAITING sentinel for UI consumption.
        let json = serde_json::to_value(&view).expect("json");
        assert_eq!(json["all"][1]["statusView"], "WAITING");
    }

    #[test]
    fn missing_date_defaults_to_the_users_local_day() {
        let (_dir, db) = test_db();
        // 23:00 UTC on Jan 2 is already Jan 3 at UTC+2.
        let now = instant("2024-01-02T23:00:00Z");
        let user = db.create_user("Etc/GMT-2", now).expect("user");
        let fit = db.create_challenge(user.id, &challenge("Fit"), now).expect("fit");

        upsert_manual_record(
            &db,
            &user,
            &UpsertDailyRecord {
                challenge_id: fit.id,
                date: None,
                flag: "MIN".to_string(),
                minutes_fact: None,
                comment: None,
            },
            chrono_tz::UTC,
            now,
        )
        .expect("upsert");

        assert!(db
            .find_record(user.id, fit.id, date("2024-01-03"))
            .expect("find")
            .is_some());
        assert!(db
            .find_record(user.id, fit.id, date("2024-01-02"))
            .expect("find")
            .is_none());
    }

    #[test]
    fn missing_date_uses_the_fallback_zone_for_invalid_timezones() {
        let (_dir, db) = test_db();
        let now = instant("2024-01-02T23:00:00Z");
        let user = db.create_user("Atlantis/Lost", now).expect("user");
        let fit = db.create_challenge(user.id, &challenge("Fit"), now).expect("fit");

        let fallback = crate::boundary::resolve_timezone("Etc/GMT-2").expect("tz");
        upsert_manual_record(
            &db,
            &user,
            &UpsertDailyRecord {
                challenge_id: fit.id,
                date: None,
                flag: "MIN".to_string(),
                minutes_fact: None,
                comment: None,
            },
            fallback,
            now,
        )
        .expect("upsert");

        assert!(db
            .find_record(user.id, fit.id, date("2024-01-03"))
            .expect("find")
            .is_some());
    }

    #[test]
    fn day_view_marks_closed_days_by_cursor() {
        let (_dir, db) = test_db();
        let now = Utc::now();
        let user = db.create_user("UTC", now).expect("user");
        db.update_user_cursor(user.id, date("2024-01-03")).expect("cursor");
        let user = db.get_user(user.id).expect("get").expect("exists");

        assert!(build_day_view(&db, &user, date("2024-01-02")).expect("view").is_day_closed);
        assert!(build_day_view(&db, &user, date("2024-01-03")).expect("view").is_day_closed);
        assert!(!build_day_view(&db, &user, date("2024-01-04")).expect("view").is_day_closed);
    }

    #[test]
    fn history_lists_outcomes_in_date_order_within_the_window() {
        let (_dir, db) = test_db();
        let now = Utc::now();
        let user = db.create_user("UTC", now).expect("user");
        let fit = db.create_challenge(user.id, &challenge("Fit"), now).expect("fit");

        for (day, flag) in [("2024-01-01", "MIN"), ("2024-01-03", "FAIL"), ("2024-01-04", "SKIP")] {
            upsert_manual_record(
                &db,
                &user,
                &UpsertDailyRecord {
                    challenge_id: fit.id,
                    date: Some(date(day)),
                    flag: flag.to_string(),
                    minutes_fact: None,
                    comment: None,
                },
                chrono_tz::UTC,
                now,
            )
            .expect("upsert");
        }

        // Two-day window ending 2024-01-04 excludes the first record.
        let history =
            build_challenge_history(&db, user.id, fit.id, 2, date("2024-01-04")).expect("history");
        assert_eq!(history.items.len(), 2);
        assert_eq!(history.items[0].date, date("2024-01-03"));
        assert_eq!(history.items[0].status_view, StatusView::Fail);
        assert_eq!(history.items[1].status_view, StatusView::Skip);
    }
}
