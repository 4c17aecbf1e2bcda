//! Theme ribbons laid over the month grid.
//!
//! Themes are placed in ascending start order. Each week row holds at most
//! [`ROW_CAPACITY`] segments; a theme that finds its row full is skipped for
//! the rest of that week and picks up again at the next row.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::date::to_local_iso;
use crate::grid::{CalendarGrid, GRID_COLS, GRID_ROWS};
use crate::model::{Theme, ThemeId};

pub const ROW_CAPACITY: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RibbonSegment {
    /// Unique per emitted slice: theme identity plus the slice's first day.
    pub key: String,
    pub theme_id: Option<ThemeId>,
    pub title: String,
    pub row: usize,
    /// Which of the row's slots this segment took, `0..ROW_CAPACITY`.
    pub slot: usize,
    pub col: usize,
    pub span_days: usize,
    pub left_percent: f64,
    pub width_percent: f64,
    pub color: String,
}

/// Resolved `[start, end]` for a theme. Malformed ranges collapse to the
/// start day; unparseable starts yield `None`.
fn theme_interval(theme: &Theme) -> Option<(NaiveDate, NaiveDate)> {
    let start = match theme.start_date() {
        Ok(start) => start,
        Err(err) => {
            tracing::warn!(title = %theme.title, error = %err, "skipping theme with bad start date");
            return None;
        }
    };
    let end = match theme.end_date() {
        Ok(end) if end >= start => end,
        Ok(end) => {
            tracing::warn!(
                title = %theme.title,
                start = %start,
                end = %end,
                "theme ends before it starts, drawing start day only"
            );
            start
        }
        Err(err) => {
            tracing::warn!(title = %theme.title, error = %err, "bad end date, drawing start day only");
            start
        }
    };
    Some((start, end))
}

pub fn pack_themes(themes: &[Theme], month: NaiveDate) -> Vec<RibbonSegment> {
    let grid = CalendarGrid::for_month(month);
    let grid_start = grid.start();
    let grid_end = grid.end();

    let mut ordered: Vec<(&Theme, (NaiveDate, NaiveDate))> = themes
        .iter()
        .filter_map(|theme| theme_interval(theme).map(|interval| (theme, interval)))
        .collect();
    // Stable: equal starts keep caller order.
    ordered.sort_by_key(|(_, (start, _))| *start);

    let mut row_usage = [0usize; GRID_ROWS];
    let mut segments = Vec::new();

    for (index, (theme, (theme_start, theme_end))) in ordered.into_iter().enumerate() {
        if theme_end < grid_start || theme_start >= grid_end {
            continue;
        }

        let mut cursor = theme_start.max(grid_start);
        let clipped_end = theme_end.min(grid.last_visible());
        // Unsaved themes may share a title, so their place in the order disambiguates.
        let identity = match &theme.id {
            Some(id) => id.clone(),
            None => format!("{}#{}", theme.title, index),
        };

        while cursor <= clipped_end {
            let Some(cell) = grid.cell_of(cursor) else {
                cursor += Duration::days(1);
                continue;
            };

            if row_usage[cell.row] >= ROW_CAPACITY {
                tracing::debug!(
                    title = %theme.title,
                    row = cell.row,
                    "row full, skipping rest of week"
                );
                cursor += Duration::days((GRID_COLS - cell.col) as i64);
                continue;
            }

            let remaining = (clipped_end - cursor).num_days() as usize + 1;
            let span_days = remaining.min(GRID_COLS - cell.col);

            segments.push(RibbonSegment {
                key: format!("{}-{}", identity, to_local_iso(cursor)),
                theme_id: theme.id.clone(),
                title: theme.title.clone(),
                row: cell.row,
                slot: row_usage[cell.row],
                col: cell.col,
                span_days,
                left_percent: cell.col as f64 / GRID_COLS as f64 * 100.0,
                width_percent: span_days as f64 / GRID_COLS as f64 * 100.0,
                color: theme.color_or_default().to_string(),
            });
            row_usage[cell.row] += 1;
            cursor += Duration::days(span_days as i64);
        }
    }

    segments
}
