use crate::errors::{AppError, AppResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The single outcome a day may carry. Exactly zero or one flag is ever set
/// on a record; `status::apply_single_flag` enforces that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Flag {
    Min,
    Bonus,
    Skip,
    Fail,
}

impl Flag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Min => "MIN",
            Self::Bonus => "BONUS",
            Self::Skip => "SKIP",
            Self::Fail => "FAIL",
        }
    }

    /// Parses a flag name arriving from the manual upsert surface. Rejects
    /// anything outside the four recognized values before any record is
    /// touched.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "MIN" => Ok(Self::Min),
            "BONUS" => Ok(Self::Bonus),
            "SKIP" => Ok(Self::Skip),
            "FAIL" => Ok(Self::Fail),
            other => Err(AppError::InvalidFlag(other.to_string())),
        }
    }
}

/// Displayed status for one challenge on one day. `Waiting` is the sentinel
/// for "no record yet" and "record without a flag".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusView {
    Waiting,
    Min,
    Bonus,
    Skip,
    Fail,
}

/// Provenance of a daily record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Origin {
    Manual,
    Auto,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "MANUAL",
            Self::Auto => "AUTO",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "MANUAL" => Some(Self::Manual),
            "AUTO" => Some(Self::Auto),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub timezone: String,
    pub last_closed_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    /// Stored as raw text so unknown values degrade to FAIL at resolution
    /// time instead of being rejected at rest.
    pub miss_policy: String,
    pub is_active: bool,
    pub is_template: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecord {
    pub id: i64,
    pub user_id: i64,
    pub challenge_id: i64,
    pub date: NaiveDate,
    pub origin: Origin,
    pub flag_min: bool,
    pub flag_bonus: bool,
    pub flag_skip: bool,
    pub flag_fail: bool,
    pub minutes_fact: Option<i64>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub edited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChallenge {
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_miss_policy")]
    pub miss_policy: String,
    #[serde(default)]
    pub is_template: bool,
}

fn default_miss_policy() -> String {
    "FAIL".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChallengePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub miss_policy: Option<String>,
    pub is_active: Option<bool>,
}

/// Payload of the interactive record-upsert path. The flag arrives as a
/// string and is validated with `Flag::parse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertDailyRecord {
    pub challenge_id: i64,
    pub date: Option<NaiveDate>,
    pub flag: String,
    pub minutes_fact: Option<i64>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayItem {
    pub challenge_id: i64,
    pub title: String,
    pub status_view: StatusView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayView {
    pub date: NaiveDate,
    pub is_day_closed: bool,
    pub first_uncompleted: Option<DayItem>,
    pub all: Vec<DayItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub date: NaiveDate,
    pub status_view: StatusView,
    pub minutes_fact: Option<i64>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeHistory {
    pub challenge_id: i64,
    pub items: Vec<HistoryItem>,
}
