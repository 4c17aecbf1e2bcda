use chrono::NaiveDate;

use gooddays::aggregate::{format_rate, group_by_date, Stats};
use gooddays::model::{DayType, Energy, Entry, Theme, Touch};
use gooddays::ribbon::pack_themes;
use gooddays::sentiment::{select_notes, SentimentWindow};
use gooddays::store::{init_project_journal, EntryStore, LocalStore, SentimentCache, ThemeStore};

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn open_store(dir: &tempfile::TempDir) -> LocalStore {
    LocalStore::open(init_project_journal(dir.path()).unwrap())
}

fn log(store: &LocalStore, date: NaiveDate, day: DayType, note: &str) {
    let entry =
        Entry::new(date, day, Energy::Energized, Touch::Touching, note, Vec::new()).unwrap();
    store.upsert(&entry).unwrap();
}

#[test]
fn crowded_week_pushes_third_theme_to_next_row() {
    // B and C start together, so caller order decides who gets the slot.
    let themes = vec![
        Theme::new("A", ymd(2024, 6, 1), Some(ymd(2024, 6, 10))),
        Theme::new("B", ymd(2024, 6, 5), None),
        Theme::new("C", ymd(2024, 6, 5), Some(ymd(2024, 6, 20))),
    ];

    let segments = pack_themes(&themes, ymd(2024, 6, 1));
    let placed: Vec<(&str, usize, usize, usize, usize)> = segments
        .iter()
        .map(|s| (s.title.as_str(), s.row, s.slot, s.col, s.span_days))
        .collect();

    assert_eq!(
        placed,
        vec![
            ("A", 0, 0, 6, 1),
            ("A", 1, 0, 0, 7),
            ("A", 2, 0, 0, 2),
            ("B", 1, 1, 3, 1),
            ("C", 2, 1, 0, 7),
            ("C", 3, 0, 0, 5),
        ]
    );
    let c_first = segments.iter().find(|s| s.title == "C").unwrap();
    assert!(c_first.key.ends_with("2024-06-09"));
}

#[test]
fn saved_themes_pack_like_literal_ones() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let id = store
        .save_theme(&Theme::new("  Trip ", ymd(2024, 6, 12), Some(ymd(2024, 6, 14))))
        .unwrap();

    let themes = store.themes().unwrap();
    assert_eq!(themes.len(), 1);
    assert_eq!(themes[0].title, "Trip");
    let segments = pack_themes(&themes, ymd(2024, 6, 1));
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].theme_id.as_deref(), Some(id.as_str()));
    assert_eq!((segments[0].row, segments[0].col, segments[0].span_days), (2, 3, 3));
    assert_eq!(segments[0].color, "#93c5fd");
    assert!(segments[0].key.starts_with(&id));

    store.delete_theme(&id).unwrap();
    assert!(pack_themes(&store.themes().unwrap(), ymd(2024, 6, 1)).is_empty());
}

#[test]
fn theme_covering_the_grid_fills_every_row() {
    let themes = vec![Theme::new("Long", ymd(2024, 1, 1), Some(ymd(2024, 12, 31)))];
    let segments = pack_themes(&themes, ymd(2024, 6, 1));
    assert_eq!(segments.len(), 6);
    assert!(segments.iter().all(|s| s.col == 0 && s.span_days == 7));
    assert!(segments.iter().all(|s| (s.width_percent - 100.0).abs() < 1e-9));
}

#[test]
fn stats_follow_the_journal() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    let groups = group_by_date(store.entries().unwrap().values());
    let empty = Stats::compute(&groups, ymd(2024, 6, 10));
    assert_eq!(empty.longest_streak, 0);
    assert_eq!(format_rate(empty.good_day_rate), "–");

    log(&store, ymd(2024, 6, 1), DayType::GoodDay, "");
    log(&store, ymd(2024, 6, 2), DayType::BadDay, "rain");
    log(&store, ymd(2024, 6, 4), DayType::GoodDay, "");
    log(&store, ymd(2024, 6, 8), DayType::GoodDay, "");
    log(&store, ymd(2024, 6, 9), DayType::GoodDay, "");
    log(&store, ymd(2024, 6, 10), DayType::GoodDay, "");

    let groups = group_by_date(store.entries().unwrap().values());
    assert_eq!(groups.first().map(|g| g.date.as_str()), Some("2024-06-10"));

    let stats = Stats::compute(&groups, ymd(2024, 6, 10));
    assert_eq!(stats.days_logged, 6);
    assert_eq!(stats.longest_streak, 3);
    assert_eq!(stats.current_streak, 3);
    // 5 of 6 days good.
    assert_eq!(stats.good_day_rate, Some(83));
}

#[test]
fn relogging_a_day_replaces_it() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    log(&store, ymd(2024, 6, 1), DayType::GoodDay, "first");
    log(&store, ymd(2024, 6, 1), DayType::BadDay, "second");

    let entries = store.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries["20240601"].note, "second");
}

#[test]
fn month_notes_and_cached_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    log(&store, ymd(2024, 5, 31), DayType::GoodDay, "last of may");
    log(&store, ymd(2024, 6, 3), DayType::GoodDay, "picnic");
    log(&store, ymd(2024, 6, 4), DayType::BadDay, "   ");

    let groups = group_by_date(store.entries().unwrap().values());
    let window = SentimentWindow::Month(ymd(2024, 6, 1));
    let request = select_notes(&groups, &window).unwrap();
    assert_eq!(request.window_key, "2024-06");
    assert_eq!(request.notes.len(), 1);
    assert_eq!(request.notes[0].note, "picnic");

    let july = SentimentWindow::Month(ymd(2024, 7, 1));
    assert!(select_notes(&groups, &july).is_err());

    let result: gooddays::model::SentimentResult =
        serde_json::from_str(r#"{"grade":"B+","summary":"Mostly sunny."}"#).unwrap();
    store.save_sentiment(&request.window_key, &result).unwrap();

    // A fresh handle reads the cache back from disk.
    let reopened = open_store(&dir);
    assert_eq!(reopened.load_sentiment("2024-06").unwrap(), Some(result));
    assert_eq!(reopened.load_sentiment("2024-07").unwrap(), None);
}
