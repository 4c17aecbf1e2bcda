//! Local calendar dates and their `YYYY-MM-DD` / `YYYYMMDD` spellings.
//!
//! All dates here are `NaiveDate`s interpreted as local midnight. Nothing in
//! this module goes through UTC, so a date never shifts by a day near a
//! timezone boundary.

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone};

const ISO_FORMAT: &str = "%Y-%m-%d";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    #[error("invalid date (use YYYY-MM-DD): {0}")]
    InvalidIso(String),
    #[error("invalid month (use YYYY-MM): {0}")]
    InvalidMonth(String),
}

pub fn to_local_iso(date: NaiveDate) -> String {
    date.format(ISO_FORMAT).to_string()
}

pub fn from_local_iso(iso: &str) -> Result<NaiveDate, DateError> {
    let raw = iso.trim();
    // chrono accepts unpadded fields; stored keys must stay sortable.
    if raw.len() != 10 {
        return Err(DateError::InvalidIso(iso.to_string()));
    }
    NaiveDate::parse_from_str(raw, ISO_FORMAT).map_err(|_| DateError::InvalidIso(iso.to_string()))
}

/// `2024-06-05` -> `20240605`
pub fn to_storage_key(iso: &str) -> String {
    iso.replace('-', "")
}

/// Calendar day of a zoned timestamp, read in that timestamp's own zone.
pub fn local_day<Tz: TimeZone>(at: &DateTime<Tz>) -> NaiveDate {
    at.date_naive()
}

pub fn today() -> NaiveDate {
    local_day(&Local::now())
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Parses `YYYY-MM` into the first day of that month.
pub fn parse_month(input: &str) -> Result<NaiveDate, DateError> {
    let raw = input.trim();
    let (year, month) = raw
        .split_once('-')
        .ok_or_else(|| DateError::InvalidMonth(input.to_string()))?;
    let year: i32 = year
        .parse()
        .map_err(|_| DateError::InvalidMonth(input.to_string()))?;
    let month: u32 = month
        .parse()
        .map_err(|_| DateError::InvalidMonth(input.to_string()))?;
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| DateError::InvalidMonth(input.to_string()))
}

pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub fn shift_months(date: NaiveDate, delta: i32) -> NaiveDate {
    let index = date.year() * 12 + date.month0() as i32 + delta;
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_zero_padding() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(to_local_iso(date), "2024-03-07");
    }

    #[test]
    fn rejects_unpadded_and_garbage() {
        assert!(from_local_iso("2024-3-7").is_err());
        assert!(from_local_iso("2024-02-30").is_err());
        assert!(from_local_iso("yesterday").is_err());
        assert!(from_local_iso("").is_err());
    }

    #[test]
    fn round_trips_every_month_for_two_years() {
        for year in [2023, 2024] {
            for month in 1..=12 {
                for day in [1, 15, 28] {
                    let date = NaiveDate::from_ymd_opt(year, month, day).unwrap();
                    assert_eq!(from_local_iso(&to_local_iso(date)).unwrap(), date);
                }
            }
        }
    }

    #[test]
    fn round_trips_local_dst_transition_days() {
        // US and EU spring-forward/fall-back Sundays; noon always exists.
        for (y, m, d) in [(2024, 3, 10), (2024, 3, 31), (2024, 11, 3), (2024, 10, 27)] {
            let at = Local
                .with_ymd_and_hms(y, m, d, 12, 0, 0)
                .single()
                .expect("noon is unambiguous");
            let iso = to_local_iso(local_day(&at));
            assert_eq!(iso, format!("{y:04}-{m:02}-{d:02}"));
            assert_eq!(from_local_iso(&iso).unwrap(), local_day(&at));
        }
    }

    #[test]
    fn round_trips_range_edges() {
        for (y, m, d) in [(1900, 1, 1), (2100, 12, 31), (2000, 2, 29)] {
            let date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
            assert_eq!(from_local_iso(&to_local_iso(date)).unwrap(), date);
        }
    }

    #[test]
    fn storage_key_strips_dashes() {
        assert_eq!(to_storage_key("2024-06-05"), "20240605");
    }

    #[test]
    fn month_helpers() {
        assert_eq!(
            parse_month("2024-06").unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );
        assert!(parse_month("2024-13").is_err());
        assert!(parse_month("June").is_err());
        let jan = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();
        assert_eq!(shift_months(jan, -1), NaiveDate::from_ymd_opt(2023, 12, 1).unwrap());
        assert_eq!(shift_months(jan, 12), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(month_key(jan), "2024-01");
    }
}
