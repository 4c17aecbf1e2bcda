//! Picks the notes that go to the summarizer and names the window they
//! came from. Caching the result is the store's job.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::aggregate::GroupedDay;
use crate::date::{month_key, to_local_iso};

pub const DEFAULT_TRAILING_DAYS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentWindow {
    /// Calendar month containing the date.
    Month(NaiveDate),
    /// The last `days` days up to and including `today`.
    Trailing { days: u32, today: NaiveDate },
}

impl SentimentWindow {
    pub fn key(&self) -> String {
        match self {
            SentimentWindow::Month(month) => month_key(*month),
            SentimentWindow::Trailing { days, .. } => format!("last{}", days),
        }
    }

    pub fn contains(&self, iso: &str) -> bool {
        match self {
            SentimentWindow::Month(month) => iso.starts_with(&format!("{}-", month_key(*month))),
            SentimentWindow::Trailing { days, today } => {
                let since = to_local_iso(*today - Duration::days(*days as i64));
                // Zero-padded ISO strings order the same as the dates.
                iso >= since.as_str() && iso <= to_local_iso(*today).as_str()
            }
        }
    }
}

impl fmt::Display for SentimentWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentWindow::Month(month) => write!(f, "{}", month.format("%B %Y")),
            SentimentWindow::Trailing { days, .. } => write!(f, "the last {} days", days),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSample {
    pub date: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentimentRequest {
    pub window_key: String,
    pub notes: Vec<NoteSample>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("nothing to analyze: no notes in {0}")]
pub struct NothingToAnalyze(pub String);

/// Days inside `window` whose first record has a note, in the order given.
pub fn select_notes(
    groups: &[GroupedDay],
    window: &SentimentWindow,
) -> Result<SentimentRequest, NothingToAnalyze> {
    let notes: Vec<NoteSample> = groups
        .iter()
        .filter(|g| window.contains(&g.date))
        .filter_map(|g| {
            g.note().map(|note| NoteSample {
                date: g.date.clone(),
                note: note.to_string(),
            })
        })
        .collect();
    if notes.is_empty() {
        return Err(NothingToAnalyze(window.to_string()));
    }
    tracing::debug!(window = %window.key(), count = notes.len(), "selected notes");
    Ok(SentimentRequest {
        window_key: window.key(),
        notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::group_by_date;
    use crate::model::{DayType, Energy, Entry, Touch};

    fn entry(date: &str, note: &str) -> Entry {
        Entry {
            date: date.into(),
            day_type: DayType::GoodDay,
            energy: Energy::Tired,
            touch: Touch::NoTouching,
            note: note.into(),
            photo_refs: Vec::new(),
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_keys() {
        assert_eq!(SentimentWindow::Month(ymd(2024, 6, 14)).key(), "2024-06");
        let trailing = SentimentWindow::Trailing {
            days: 60,
            today: ymd(2024, 6, 14),
        };
        assert_eq!(trailing.key(), "last60");
    }

    #[test]
    fn month_window_matches_by_prefix() {
        let window = SentimentWindow::Month(ymd(2024, 6, 1));
        assert!(window.contains("2024-06-30"));
        assert!(!window.contains("2024-07-01"));
        assert!(!window.contains("2024-05-31"));
    }

    #[test]
    fn trailing_window_selects_recent_notes_in_date_order() {
        let entries = vec![
            entry("2024-03-01", "too old"),
            entry("2024-04-15", "spring"),
            entry("2024-06-01", ""),
            entry("2024-06-10", "summer"),
        ];
        let groups = group_by_date(&entries);
        let window = SentimentWindow::Trailing {
            days: 60,
            today: ymd(2024, 6, 14),
        };
        let request = select_notes(&groups, &window).unwrap();
        assert_eq!(request.window_key, "last60");
        let dates: Vec<_> = request.notes.iter().map(|n| n.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-06-10", "2024-04-15"]);
    }

    #[test]
    fn only_first_record_note_counts() {
        let entries = vec![entry("2024-06-10", ""), entry("2024-06-10", "second")];
        let groups = group_by_date(&entries);
        let window = SentimentWindow::Month(ymd(2024, 6, 1));
        assert_eq!(
            select_notes(&groups, &window),
            Err(NothingToAnalyze("June 2024".into()))
        );
    }

    #[test]
    fn empty_window_is_reported() {
        let window = SentimentWindow::Trailing {
            days: 7,
            today: ymd(2024, 6, 14),
        };
        assert!(select_notes(&[], &window).is_err());
    }
}
