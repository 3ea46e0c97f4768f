use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EntryId, UserId};

/// Lowest accepted knee-pain score.
pub const KNEE_PAIN_MIN: i32 = 0;
/// Highest accepted knee-pain score.
pub const KNEE_PAIN_MAX: i32 = 10;

/// The normalized measurement values of a body entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFields {
    /// Body weight.
    pub weight: Option<f64>,
    /// Systolic blood pressure.
    pub bp_systolic: Option<i32>,
    /// Diastolic blood pressure.
    pub bp_diastolic: Option<i32>,
    /// Minutes of exercise.
    pub exercise_minutes: Option<i32>,
    /// Minutes of plank.
    pub plank_minutes: Option<i32>,
    /// Knee-pain score, `0..=10`.
    #[serde(default)]
    pub knee_pain: i32,
    /// Free-text notes.
    pub notes: Option<String>,
}

impl Default for EntryFields {
    fn default() -> Self {
        Self {
            weight: None,
            bp_systolic: None,
            bp_diastolic: None,
            exercise_minutes: None,
            plank_minutes: None,
            knee_pain: KNEE_PAIN_MIN,
            notes: None,
        }
    }
}

/// An entry about to be written, keyed by `(user_id, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub user_id: UserId,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub fields: EntryFields,
}

impl NewEntry {
    pub fn new(user_id: impl Into<UserId>, date: NaiveDate, fields: EntryFields) -> Self {
        Self {
            user_id: user_id.into(),
            date,
            fields,
        }
    }
}

/// One day's body-metric record as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyEntry {
    pub id: EntryId,
    pub user_id: UserId,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub fields: EntryFields,
    /// Assigned by the store on insert and never changed afterwards.
    pub created_at: DateTime<Utc>,
}

impl BodyEntry {
    /// Display order: newest date first, then newest creation first.
    pub fn recent_first(a: &Self, b: &Self) -> Ordering {
        b.date
            .cmp(&a.date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    }
}

/// Sort entries into display order (see [`BodyEntry::recent_first`]).
pub fn sort_recent_first(entries: &mut [BodyEntry]) {
    entries.sort_by(BodyEntry::recent_first);
}
