//! The free-text entry form and its normalization into [`EntryFields`].
//!
//! Every numeric input is trimmed; an empty value is absent, and a value that
//! does not parse to a finite number is treated as absent rather than
//! rejected. Only the date is mandatory.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::entry::{BodyEntry, EntryFields, KNEE_PAIN_MAX, KNEE_PAIN_MIN};
use crate::error::ValidationError;
use crate::types::EntryId;

/// Calendar date format used by forms and stores.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Today's date in the local timezone.
pub fn today_local() -> NaiveDate {
    Local::now().date_naive()
}

/// Snapshot of the entry form exactly as typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryForm {
    pub date: String,
    pub weight: String,
    pub bp_systolic: String,
    pub bp_diastolic: String,
    pub exercise_minutes: String,
    pub plank_minutes: String,
    pub knee_pain: String,
    pub notes: String,
}

impl EntryForm {
    /// An empty form with the date seeded to `today`.
    pub fn blank(today: NaiveDate) -> Self {
        Self {
            date: today.format(DATE_FORMAT).to_string(),
            weight: String::new(),
            bp_systolic: String::new(),
            bp_diastolic: String::new(),
            exercise_minutes: String::new(),
            plank_minutes: String::new(),
            knee_pain: KNEE_PAIN_MIN.to_string(),
            notes: String::new(),
        }
    }

    /// A form pre-filled from a stored entry, for editing.
    pub fn from_entry(entry: &BodyEntry) -> Self {
        let f = &entry.fields;
        Self {
            date: entry.date.format(DATE_FORMAT).to_string(),
            weight: render(f.weight),
            bp_systolic: render(f.bp_systolic),
            bp_diastolic: render(f.bp_diastolic),
            exercise_minutes: render(f.exercise_minutes),
            plank_minutes: render(f.plank_minutes),
            knee_pain: f.knee_pain.to_string(),
            notes: f.notes.clone().unwrap_or_default(),
        }
    }

    /// Validate the date field.
    pub fn parse_date(&self) -> Result<NaiveDate, ValidationError> {
        let raw = self.date.trim();
        if raw.is_empty() {
            return Err(ValidationError::MissingDate);
        }
        NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map_err(|_| ValidationError::InvalidDate(raw.to_owned()))
    }

    /// Validate the date and normalize every other field.
    pub fn normalize(&self) -> Result<(NaiveDate, EntryFields), ValidationError> {
        let date = self.parse_date()?;
        let fields = EntryFields {
            weight: parse_decimal(&self.weight),
            bp_systolic: parse_whole(&self.bp_systolic),
            bp_diastolic: parse_whole(&self.bp_diastolic),
            exercise_minutes: parse_whole(&self.exercise_minutes),
            plank_minutes: parse_whole(&self.plank_minutes),
            knee_pain: parse_whole(&self.knee_pain)
                .map_or(KNEE_PAIN_MIN, |v| v.clamp(KNEE_PAIN_MIN, KNEE_PAIN_MAX)),
            notes: normalize_notes(&self.notes),
        };
        Ok((date, fields))
    }
}

/// Identifies the stored entry an edit session started from.
///
/// The date is part of the entry's logical key, so an edit that moves the
/// date has to remove the record under `original_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditingContext {
    pub entry_id: EntryId,
    pub original_date: NaiveDate,
}

impl EditingContext {
    pub fn for_entry(entry: &BodyEntry) -> Self {
        Self {
            entry_id: entry.id.clone(),
            original_date: entry.date,
        }
    }

    /// Whether saving under `date` moves the entry to a different key.
    pub fn changes_key(&self, date: NaiveDate) -> bool {
        self.original_date != date
    }
}

/// Parse a decimal field. Empty or non-finite input is absent.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse an integer field. Fractional or out-of-range numbers are absent.
#[allow(clippy::cast_possible_truncation)]
pub fn parse_whole(raw: &str) -> Option<i32> {
    parse_decimal(raw)
        .filter(|n| n.fract() == 0.0)
        .filter(|n| *n >= f64::from(i32::MIN) && *n <= f64::from(i32::MAX))
        .map(|n| n as i32)
}

/// Whitespace-only notes are absent; anything else is kept as typed.
pub fn normalize_notes(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw.to_owned())
    }
}

fn render<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
