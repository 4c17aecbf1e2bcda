use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::date::from_local_iso;
use crate::model::Entry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedDay {
    pub date: String,
    pub items: Vec<Entry>,
}

impl GroupedDay {
    pub fn is_good(&self) -> bool {
        self.items.iter().any(Entry::is_good)
    }

    /// Note of the first record for the day, if it has one.
    pub fn note(&self) -> Option<&str> {
        self.items
            .first()
            .filter(|e| e.has_note())
            .map(|e| e.note.as_str())
    }
}

/// Groups entries by their `date`, newest first. Dateless entries are dropped.
pub fn group_by_date<'a, I>(entries: I) -> Vec<GroupedDay>
where
    I: IntoIterator<Item = &'a Entry>,
{
    let mut by_date: BTreeMap<&str, Vec<Entry>> = BTreeMap::new();
    for entry in entries {
        if entry.date.trim().is_empty() {
            continue;
        }
        by_date.entry(entry.date.as_str()).or_default().push(entry.clone());
    }
    by_date
        .into_iter()
        .rev()
        .map(|(date, items)| GroupedDay {
            date: date.to_string(),
            items,
        })
        .collect()
}

fn sorted_days<I, S>(dates: I) -> Vec<NaiveDate>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut days: Vec<NaiveDate> = dates
        .into_iter()
        .filter_map(|d| match from_local_iso(d.as_ref()) {
            Ok(day) => Some(day),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unparseable date in streak");
                None
            }
        })
        .collect();
    days.sort();
    days.dedup();
    days
}

/// Longest run of calendar-consecutive days. Duplicates count once.
pub fn longest_streak<I, S>(dates: I) -> usize
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let days = sorted_days(dates);
    if days.is_empty() {
        return 0;
    }
    let mut longest = 1;
    let mut current = 1;
    for pair in days.windows(2) {
        if pair[1] - pair[0] == Duration::days(1) {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 1;
        }
    }
    longest
}

/// Consecutive days ending today, or ending yesterday when today has no
/// entry yet.
pub fn current_streak<I, S>(dates: I, today: NaiveDate) -> usize
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let days = sorted_days(dates);
    let mut check = match days.last() {
        Some(last) if *last == today => today,
        Some(last) if *last == today - Duration::days(1) => *last,
        _ => return 0,
    };
    let mut streak = 0;
    for day in days.iter().rev() {
        if *day == check {
            streak += 1;
            check -= Duration::days(1);
        } else {
            break;
        }
    }
    streak
}

/// Whole-number percentage of days with at least one good entry, or `None`
/// when there are no days.
pub fn good_day_rate(groups: &[GroupedDay]) -> Option<u32> {
    if groups.is_empty() {
        return None;
    }
    let good = groups.iter().filter(|g| g.is_good()).count();
    Some((good as f64 / groups.len() as f64 * 100.0).round() as u32)
}

pub fn format_rate(rate: Option<u32>) -> String {
    match rate {
        Some(rate) => format!("{}%", rate),
        None => "–".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub days_logged: usize,
    pub longest_streak: usize,
    pub current_streak: usize,
    pub good_day_rate: Option<u32>,
}

impl Stats {
    pub fn compute(groups: &[GroupedDay], today: NaiveDate) -> Self {
        let dates = groups.iter().map(|g| g.date.as_str());
        Stats {
            days_logged: groups.len(),
            longest_streak: longest_streak(dates.clone()),
            current_streak: current_streak(dates, today),
            good_day_rate: good_day_rate(groups),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DayType, Energy, Touch};

    fn entry(date: &str, day_type: DayType, note: &str) -> Entry {
        Entry {
            date: date.into(),
            day_type,
            energy: Energy::Energized,
            touch: Touch::Touching,
            note: note.into(),
            photo_refs: Vec::new(),
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn groups_newest_first_and_keeps_duplicates() {
        let entries = vec![
            entry("2024-06-01", DayType::GoodDay, "a"),
            entry("2024-06-03", DayType::BadDay, "b"),
            entry("", DayType::GoodDay, "lost"),
            entry("2024-06-01", DayType::BadDay, "c"),
        ];
        let groups = group_by_date(&entries);
        let dates: Vec<_> = groups.iter().map(|g| g.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-06-03", "2024-06-01"]);
        assert_eq!(groups[1].items.len(), 2);
        assert_eq!(groups[1].note(), Some("a"));
    }

    #[test]
    fn streak_examples() {
        assert_eq!(longest_streak(["2024-01-01", "2024-01-02", "2024-01-03"]), 3);
        assert_eq!(longest_streak(["2024-01-01", "2024-01-03"]), 1);
        assert_eq!(longest_streak(Vec::<String>::new()), 0);
        assert_eq!(longest_streak(["2024-01-01"]), 1);
    }

    #[test]
    fn streak_handles_unsorted_duplicates_and_month_edges() {
        let dates = [
            "2024-03-01",
            "2024-02-28",
            "2024-02-29",
            "2024-02-29",
            "2024-03-10",
        ];
        assert_eq!(longest_streak(dates), 3);
        assert_eq!(longest_streak(["2023-12-31", "2024-01-01"]), 2);
    }

    #[test]
    fn current_streak_ends_today_or_yesterday() {
        let dates = ["2024-06-08", "2024-06-09", "2024-06-10"];
        assert_eq!(current_streak(dates, ymd(2024, 6, 10)), 3);
        assert_eq!(current_streak(dates, ymd(2024, 6, 11)), 3);
        assert_eq!(current_streak(dates, ymd(2024, 6, 12)), 0);
        assert_eq!(current_streak(Vec::<&str>::new(), ymd(2024, 6, 12)), 0);
    }

    #[test]
    fn good_day_rate_counts_days_not_entries() {
        assert_eq!(good_day_rate(&[]), None);
        assert_eq!(format_rate(None), "–");
        let entries = vec![
            entry("2024-06-01", DayType::BadDay, ""),
            entry("2024-06-01", DayType::GoodDay, ""),
            entry("2024-06-02", DayType::BadDay, ""),
            entry("2024-06-03", DayType::BadDay, ""),
        ];
        let groups = group_by_date(&entries);
        assert_eq!(good_day_rate(&groups), Some(33));
        assert_eq!(format_rate(good_day_rate(&groups)), "33%");
    }

    #[test]
    fn stats_summary() {
        let entries = vec![
            entry("2024-06-09", DayType::GoodDay, ""),
            entry("2024-06-10", DayType::GoodDay, ""),
        ];
        let stats = Stats::compute(&group_by_date(&entries), ymd(2024, 6, 10));
        assert_eq!(
            stats,
            Stats {
                days_logged: 2,
                longest_streak: 2,
                current_streak: 2,
                good_day_rate: Some(100),
            }
        );
    }
}
