use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use std::env;

use crate::ui;
use gooddays::aggregate::{format_rate, group_by_date, GroupedDay, Stats};
use gooddays::config::Config;
use gooddays::date::{first_of_month, from_local_iso, parse_month, to_local_iso, today};
use gooddays::grid::{CalendarGrid, GRID_COLS, GRID_ROWS};
use gooddays::model::{DayType, Energy, Entry, SentimentResult, Theme, Touch};
use gooddays::ribbon::{pack_themes, RibbonSegment, ROW_CAPACITY};
use gooddays::sentiment::{select_notes, SentimentWindow};
use gooddays::store::{
    init_project_journal, locate_journal, EntryStore, FallbackStore, JournalScope, LocalStore,
    RemoteStore, SentimentCache, Store, StoreError, ThemeStore,
};
use gooddays::summarizer::{
    AnalysisMode, AnthropicSummarizer, ProxySummarizer, SummarizeError, Summarizer,
};

const CELL_WIDTH: usize = 5;

pub fn open_store(config: &Config) -> Result<FallbackStore> {
    let primary = config.remote_url.as_ref().map(|url| {
        RemoteStore::connect(url.clone(), config.remote_auth.clone(), config.remote_timeout)
            .map(|store| {
                Box::new(store.with_poll_interval(config.remote_poll)) as Box<dyn Store>
            })
    });
    let store = FallbackStore::connect(primary, || {
        let cwd = env::current_dir().map_err(|source| StoreError::Io {
            path: ".".into(),
            source,
        })?;
        let location = locate_journal(&cwd)?;
        tracing::debug!(path = %location.path.display(), "using local journal");
        Ok(Box::new(LocalStore::open(location)) as Box<dyn Store>)
    })
    .context("opening journal")?;
    Ok(store.with_user(config.user.clone()))
}

pub fn init() -> Result<()> {
    let cwd = env::current_dir()?;
    let location = init_project_journal(&cwd).context("creating journal")?;
    println!("Initialized journal at {}", location.path.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn log(
    store: &FallbackStore,
    date: Option<String>,
    day: DayType,
    energy: Energy,
    touch: Touch,
    note: String,
    photos: Vec<String>,
) -> Result<()> {
    let date = parse_day(date.as_deref())?;
    let entry = Entry::new(date, day, energy, touch, note, photos)?;
    store
        .upsert(&entry)
        .with_context(|| format!("saving entry for {}", entry.date))?;
    println!("Logged {}", entry.date);
    Ok(())
}

pub fn list(store: &FallbackStore, limit: Option<usize>) -> Result<()> {
    let groups = load_groups(store)?;
    if groups.is_empty() {
        println!("(no entries)");
        return Ok(());
    }
    for group in groups.iter().take(limit.unwrap_or(usize::MAX)) {
        for entry in &group.items {
            print_entry(entry);
        }
    }
    Ok(())
}

pub fn show(store: &FallbackStore, date: String) -> Result<()> {
    let day = from_local_iso(&date)?;
    let iso = to_local_iso(day);
    let groups = load_groups(store)?;
    let group = groups
        .iter()
        .find(|g| g.date == iso)
        .ok_or_else(|| anyhow!("no entry for {}", iso))?;
    for entry in &group.items {
        print_entry(entry);
        for photo in &entry.photo_refs {
            println!("    photo: {}", photo);
        }
    }
    let themes = store.themes()?;
    for theme in themes.iter().filter(|t| t.covers(day)) {
        println!("    theme: {}", theme.title);
    }
    Ok(())
}

pub fn remove(store: &FallbackStore, date: String) -> Result<()> {
    let iso = to_local_iso(from_local_iso(&date)?);
    store
        .remove_entry(&iso)
        .with_context(|| format!("removing entry for {}", iso))?;
    println!("Removed {}", iso);
    Ok(())
}

pub fn stats(store: &FallbackStore) -> Result<()> {
    let groups = load_groups(store)?;
    let stats = Stats::compute(&groups, today());
    println!("Days logged:    {}", stats.days_logged);
    println!("Longest streak: {}", stats.longest_streak);
    println!("Current streak: {}", stats.current_streak);
    println!("Good days:      {}", format_rate(stats.good_day_rate));
    Ok(())
}

pub fn theme_add(
    store: &FallbackStore,
    title: String,
    start: String,
    end: Option<String>,
    color: Option<String>,
) -> Result<()> {
    let start = from_local_iso(&start)?;
    let end = end.as_deref().map(from_local_iso).transpose()?;
    let mut theme = Theme::new(title, start, end);
    theme.color = color;
    let id = store.save_theme(&theme).context("saving theme")?;
    println!("Added theme {}", id);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn theme_edit(
    store: &FallbackStore,
    id: String,
    title: Option<String>,
    start: Option<String>,
    end: Option<String>,
    clear_end: bool,
    color: Option<String>,
) -> Result<()> {
    let mut theme = store
        .themes()?
        .into_iter()
        .find(|t| t.id.as_deref() == Some(id.as_str()))
        .ok_or_else(|| anyhow!("theme {} not found", id))?;
    if let Some(t) = title {
        theme.title = t;
    }
    if let Some(s) = start {
        theme.start = to_local_iso(from_local_iso(&s)?);
    }
    if clear_end {
        theme.end = None;
    }
    if let Some(e) = end {
        theme.end = Some(to_local_iso(from_local_iso(&e)?));
    }
    if let Some(c) = color {
        theme.color = Some(c);
    }
    store
        .save_theme(&theme)
        .with_context(|| format!("updating theme {}", id))?;
    println!("Updated theme {}", id);
    Ok(())
}

pub fn theme_delete(store: &FallbackStore, id: String) -> Result<()> {
    store
        .delete_theme(&id)
        .with_context(|| format!("deleting theme {}", id))?;
    println!("Deleted theme {}", id);
    Ok(())
}

pub fn theme_list(store: &FallbackStore) -> Result<()> {
    let mut themes = store.themes()?;
    if themes.is_empty() {
        println!("(no themes)");
        return Ok(());
    }
    themes.sort_by(|a, b| a.start.cmp(&b.start));
    for theme in themes {
        let range = match theme.end.as_deref() {
            Some(end) if end != theme.start => format!("{} → {}", theme.start, end),
            _ => theme.start.clone(),
        };
        println!(
            "  - {}: {} ({}) {}",
            theme.id.as_deref().unwrap_or("?"),
            theme.title,
            range,
            theme.color_or_default()
        );
    }
    Ok(())
}

pub fn calendar(store: &FallbackStore, month: Option<String>) -> Result<()> {
    let month = parse_month_arg(month.as_deref())?;
    let groups = load_groups(store)?;
    let themes = store.themes()?;
    let segments = pack_themes(&themes, month);
    for line in render_month(&CalendarGrid::for_month(month), &groups, &segments) {
        println!("{}", line);
    }
    Ok(())
}

pub fn analyze(
    store: &FallbackStore,
    config: &Config,
    month: Option<String>,
    days: Option<u32>,
    mode: AnalysisMode,
    force: bool,
) -> Result<()> {
    let window = match month {
        Some(m) => SentimentWindow::Month(parse_month(&m)?),
        None => SentimentWindow::Trailing {
            days: days.unwrap_or(config.sentiment_days),
            today: today(),
        },
    };
    if !force {
        if let Some(cached) = cached_analysis(store, &window, mode)? {
            print_sentiment(&window, &cached, true);
            return Ok(());
        }
    }

    let groups = load_groups(store)?;
    let request = select_notes(&groups, &window)?;
    let summarizer = build_summarizer(config, &window)?;
    let result = summarizer
        .analyze(&request.notes, mode)
        .context("mood analysis failed")?;
    store
        .save_sentiment(&mode.cache_key(&request.window_key), &result)
        .context("caching analysis")?;
    print_sentiment(&window, &result, false);
    Ok(())
}

/// A cached result only counts if it has the shape `mode` asks for.
fn cached_analysis(
    store: &FallbackStore,
    window: &SentimentWindow,
    mode: AnalysisMode,
) -> Result<Option<SentimentResult>> {
    let key = mode.cache_key(&window.key());
    let cached = store.load_sentiment(&key)?;
    Ok(cached.filter(|result| mode.matches(result)))
}

pub fn status(store: &FallbackStore, config: &Config) -> Result<()> {
    println!("Backend: {}", store.backend());
    if let Some(url) = &config.remote_url {
        println!("Remote:  {}", url);
    }
    if let Ok(cwd) = env::current_dir() {
        if let Ok(location) = locate_journal(&cwd) {
            let scope = match location.scope {
                JournalScope::Project => "project",
                JournalScope::Global => "global",
            };
            println!("Journal: {} ({})", location.path.display(), scope);
        }
    }
    println!("User:    {}", store.user().unwrap_or("(signed out)"));
    Ok(())
}

pub fn tui(store: FallbackStore, month: Option<String>) -> Result<()> {
    let month = parse_month_arg(month.as_deref())?;
    ui::run(store, month)
}

fn build_summarizer(config: &Config, window: &SentimentWindow) -> Result<Box<dyn Summarizer>> {
    if let Some(key) = &config.anthropic_api_key {
        let summarizer =
            AnthropicSummarizer::new(key.clone(), config.model.clone(), window.to_string())?;
        return Ok(Box::new(summarizer));
    }
    if let Some(url) = &config.sentiment_url {
        return Ok(Box::new(ProxySummarizer::new(url.clone())?));
    }
    Err(SummarizeError::NotConfigured.into())
}

fn load_groups(store: &FallbackStore) -> Result<Vec<GroupedDay>> {
    let entries = store.entries().context("loading entries")?;
    Ok(group_by_date(entries.values()))
}

fn parse_day(input: Option<&str>) -> Result<NaiveDate> {
    match input.map(str::trim) {
        Some(raw) if !raw.is_empty() => Ok(from_local_iso(raw)?),
        _ => Ok(today()),
    }
}

fn parse_month_arg(input: Option<&str>) -> Result<NaiveDate> {
    match input {
        Some(raw) => Ok(parse_month(raw)?),
        None => Ok(first_of_month(today())),
    }
}

fn day_marker(group: Option<&GroupedDay>) -> char {
    match group {
        Some(g) if g.is_good() => '+',
        Some(_) => '-',
        None => ' ',
    }
}

/// Plain-text month grid: a day line per week followed by one line per
/// ribbon slot.
pub fn render_month(
    grid: &CalendarGrid,
    groups: &[GroupedDay],
    segments: &[RibbonSegment],
) -> Vec<String> {
    let cell = CELL_WIDTH;
    let width = GRID_COLS * cell;
    let mut lines = vec![
        format!("{:^width$}", grid.month().format("%B %Y").to_string()),
        ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"]
            .iter()
            .map(|d| format!("{:^cell$}", d))
            .collect::<String>(),
    ];

    for row in 0..GRID_ROWS {
        let days: String = grid
            .week(row)
            .into_iter()
            .map(|date| {
                let iso = to_local_iso(date);
                let marker = day_marker(groups.iter().find(|g| g.date == iso));
                let day = chrono::Datelike::day(&date);
                if grid.in_month(date) {
                    format!(" {:>2}{} ", day, marker)
                } else {
                    format!("({:>2}{})", day, marker)
                }
            })
            .collect();
        lines.push(days);

        for slot in 0..ROW_CAPACITY {
            let mut lane = vec![' '; width];
            for seg in segments.iter().filter(|s| s.row == row && s.slot == slot) {
                let start = seg.col * CELL_WIDTH;
                let len = seg.span_days * CELL_WIDTH;
                let label: Vec<char> = format!("[{}", seg.title).chars().collect();
                for i in 0..len {
                    lane[start + i] = if i + 1 == len {
                        ']'
                    } else {
                        label.get(i).copied().unwrap_or('=')
                    };
                }
            }
            let lane: String = lane.into_iter().collect();
            if !lane.trim().is_empty() {
                lines.push(lane.trim_end().to_string());
            }
        }
    }
    lines
}

fn print_entry(entry: &Entry) {
    let day = match entry.day_type {
        DayType::GoodDay => "good",
        DayType::BadDay => "bad",
    };
    let energy = match entry.energy {
        Energy::Energized => "energized",
        Energy::Tired => "tired",
    };
    let touch = match entry.touch {
        Touch::Touching => "touching",
        Touch::NoTouching => "no touching",
    };
    println!("  - {}: {} day, {}, {}", entry.date, day, energy, touch);
    if entry.has_note() {
        println!("    {}", entry.note);
    }
    if !entry.photo_refs.is_empty() {
        println!("    photos: {}", entry.photo_refs.len());
    }
}

fn print_sentiment(window: &SentimentWindow, result: &SentimentResult, cached: bool) {
    println!(
        "Mood for {}: {}{}",
        window,
        result.headline(),
        if cached { " (cached, use --force to refresh)" } else { "" }
    );
    println!("  {}", result.text());
}
