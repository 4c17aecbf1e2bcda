use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::date::{from_local_iso, to_storage_key, DateError};

pub type ThemeId = String;
/// Entries keyed by storage key (`YYYYMMDD`).
pub type EntryMap = BTreeMap<String, Entry>;

pub const MAX_PHOTOS: usize = 3;
pub const DEFAULT_THEME_COLOR: &str = "#93c5fd";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DayType {
    #[serde(rename = "Good day")]
    #[value(name = "good")]
    GoodDay,
    #[serde(rename = "Bad day")]
    #[value(name = "bad")]
    BadDay,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Energy {
    Energized,
    Tired,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Touch {
    Touching,
    #[serde(rename = "No Touching")]
    NoTouching,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(from = "RawEntry")]
pub struct Entry {
    pub date: String,
    #[serde(rename = "day")]
    pub day_type: DayType,
    pub energy: Energy,
    pub touch: Touch,
    pub note: String,
    #[serde(rename = "photoUrls")]
    pub photo_refs: Vec<String>,
}

// Older records carry a single `photoUrl`; fold it into the list on read.
#[derive(Deserialize)]
struct RawEntry {
    #[serde(default)]
    date: String,
    day: DayType,
    energy: Energy,
    touch: Touch,
    #[serde(default)]
    note: String,
    #[serde(rename = "photoUrl", default)]
    photo_url: Option<String>,
    #[serde(rename = "photoUrls", default)]
    photo_urls: Vec<String>,
}

impl From<RawEntry> for Entry {
    fn from(raw: RawEntry) -> Self {
        let photo_refs = if !raw.photo_urls.is_empty() {
            raw.photo_urls
        } else {
            raw.photo_url.into_iter().filter(|p| !p.is_empty()).collect()
        };
        Entry {
            date: raw.date,
            day_type: raw.day,
            energy: raw.energy,
            touch: raw.touch,
            note: raw.note,
            photo_refs,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ModelError {
    #[error(transparent)]
    Date(#[from] DateError),
    #[error("theme title must not be empty")]
    EmptyTitle,
    #[error("theme ends ({end}) before it starts ({start})")]
    EndBeforeStart { start: String, end: String },
    #[error("an entry holds at most 3 photos, got {0}")]
    TooManyPhotos(usize),
}

impl Entry {
    pub fn new(
        date: NaiveDate,
        day_type: DayType,
        energy: Energy,
        touch: Touch,
        note: impl Into<String>,
        photo_refs: Vec<String>,
    ) -> Result<Self, ModelError> {
        if photo_refs.len() > MAX_PHOTOS {
            return Err(ModelError::TooManyPhotos(photo_refs.len()));
        }
        Ok(Entry {
            date: crate::date::to_local_iso(date),
            day_type,
            energy,
            touch,
            note: note.into(),
            photo_refs,
        })
    }

    pub fn storage_key(&self) -> String {
        to_storage_key(&self.date)
    }

    pub fn is_good(&self) -> bool {
        self.day_type == DayType::GoodDay
    }

    pub fn has_note(&self) -> bool {
        !self.note.trim().is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Theme {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ThemeId>,
    pub title: String,
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Theme {
    pub fn new(title: impl Into<String>, start: NaiveDate, end: Option<NaiveDate>) -> Self {
        Theme {
            id: None,
            title: title.into(),
            start: crate::date::to_local_iso(start),
            end: end.map(crate::date::to_local_iso),
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn color_or_default(&self) -> &str {
        self.color
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_THEME_COLOR)
    }

    pub fn start_date(&self) -> Result<NaiveDate, DateError> {
        from_local_iso(&self.start)
    }

    /// Missing end means a single-day theme.
    pub fn end_date(&self) -> Result<NaiveDate, DateError> {
        match self.end.as_deref().filter(|e| !e.is_empty()) {
            Some(end) => from_local_iso(end),
            None => self.start_date(),
        }
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        match (self.start_date(), self.end_date()) {
            (Ok(start), Ok(end)) => start <= date && date <= end,
            _ => false,
        }
    }

    /// Checks the theme before it is persisted and fills in the default color.
    pub fn validated(mut self) -> Result<Self, ModelError> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(ModelError::EmptyTitle);
        }
        let start = self.start_date()?;
        let end = self.end_date()?;
        if end < start {
            return Err(ModelError::EndBeforeStart {
                start: self.start.clone(),
                end: self.end.clone().unwrap_or_default(),
            });
        }
        if self.end.as_deref() == Some("") {
            self.end = None;
        }
        self.color = Some(self.color_or_default().to_string());
        Ok(self)
    }
}

/// Output of the summarizer, in whichever shape the analysis mode asked for.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum SentimentResult {
    Graded { grade: String, summary: String },
    Scored { score: f64, phrase: String },
}

impl SentimentResult {
    pub fn headline(&self) -> String {
        match self {
            SentimentResult::Graded { grade, .. } => grade.clone(),
            SentimentResult::Scored { score, .. } => format!("{:.0}/100", score),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            SentimentResult::Graded { summary, .. } => summary,
            SentimentResult::Scored { phrase, .. } => phrase,
        }
    }
}
