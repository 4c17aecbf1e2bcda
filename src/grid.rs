use chrono::{Datelike, Duration, NaiveDate};

use crate::date::first_of_month;

pub const GRID_ROWS: usize = 6;
pub const GRID_COLS: usize = 7;
pub const GRID_DAYS: usize = GRID_ROWS * GRID_COLS;

/// Sunday on or before the 1st of `month_anchor`'s month.
pub fn start_of_grid(month_anchor: NaiveDate) -> NaiveDate {
    let first = first_of_month(month_anchor);
    first - Duration::days(first.weekday().num_days_from_sunday() as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    pub row: usize,
    /// Sunday = 0 .. Saturday = 6
    pub col: usize,
}

impl GridCell {
    pub fn from_offset(offset: usize) -> Option<Self> {
        if offset >= GRID_DAYS {
            return None;
        }
        Some(GridCell {
            row: offset / GRID_COLS,
            col: offset % GRID_COLS,
        })
    }

    pub fn offset(&self) -> usize {
        self.row * GRID_COLS + self.col
    }
}

/// The fixed 6x7 block of days shown for one month, leading and trailing
/// days from the neighbouring months included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarGrid {
    month: NaiveDate,
    start: NaiveDate,
}

impl CalendarGrid {
    pub fn for_month(month_anchor: NaiveDate) -> Self {
        CalendarGrid {
            month: first_of_month(month_anchor),
            start: start_of_grid(month_anchor),
        }
    }

    pub fn month(&self) -> NaiveDate {
        self.month
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Exclusive upper bound.
    pub fn end(&self) -> NaiveDate {
        self.start + Duration::days(GRID_DAYS as i64)
    }

    pub fn last_visible(&self) -> NaiveDate {
        self.end() - Duration::days(1)
    }

    pub fn offset_of(&self, date: NaiveDate) -> Option<usize> {
        let offset = (date - self.start).num_days();
        if (0..GRID_DAYS as i64).contains(&offset) {
            Some(offset as usize)
        } else {
            None
        }
    }

    pub fn cell_of(&self, date: NaiveDate) -> Option<GridCell> {
        self.offset_of(date).and_then(GridCell::from_offset)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.offset_of(date).is_some()
    }

    pub fn date_at(&self, cell: GridCell) -> Option<NaiveDate> {
        if cell.row >= GRID_ROWS || cell.col >= GRID_COLS {
            return None;
        }
        Some(self.start + Duration::days(cell.offset() as i64))
    }

    pub fn in_month(&self, date: NaiveDate) -> bool {
        date.year() == self.month.year() && date.month() == self.month.month()
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..GRID_DAYS as i64).map(move |offset| self.start + Duration::days(offset))
    }

    pub fn week(&self, row: usize) -> Vec<NaiveDate> {
        (0..GRID_COLS)
            .filter_map(|col| self.date_at(GridCell { row, col }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn grid_always_starts_on_sunday() {
        for year in 1999..=2026 {
            for month in 1..=12 {
                let start = start_of_grid(ymd(year, month, 17));
                assert_eq!(start.weekday(), Weekday::Sun, "{year}-{month}");
                assert!(start <= ymd(year, month, 1));
                assert!((ymd(year, month, 1) - start).num_days() < 7);
            }
        }
    }

    #[test]
    fn first_on_sunday_is_its_own_grid_start() {
        // 2024-09-01 is a Sunday.
        assert_eq!(start_of_grid(ymd(2024, 9, 20)), ymd(2024, 9, 1));
    }

    #[test]
    fn june_2024_layout() {
        let grid = CalendarGrid::for_month(ymd(2024, 6, 15));
        assert_eq!(grid.start(), ymd(2024, 5, 26));
        assert_eq!(grid.end(), ymd(2024, 7, 7));
        assert_eq!(grid.last_visible(), ymd(2024, 7, 6));
        assert_eq!(grid.cell_of(ymd(2024, 6, 1)), Some(GridCell { row: 0, col: 6 }));
        assert_eq!(grid.cell_of(ymd(2024, 6, 5)), Some(GridCell { row: 1, col: 3 }));
        assert_eq!(grid.cell_of(ymd(2024, 7, 6)), Some(GridCell { row: 5, col: 6 }));
        assert!(grid.in_month(ymd(2024, 6, 30)));
        assert!(!grid.in_month(ymd(2024, 5, 31)));
    }

    #[test]
    fn dates_outside_grid_are_not_wrapped_or_clamped() {
        let grid = CalendarGrid::for_month(ymd(2024, 6, 1));
        assert_eq!(grid.cell_of(ymd(2024, 5, 25)), None);
        assert_eq!(grid.cell_of(ymd(2024, 7, 7)), None);
        assert_eq!(grid.date_at(GridCell { row: 6, col: 0 }), None);
        assert_eq!(GridCell::from_offset(42), None);
    }

    #[test]
    fn days_cover_42_consecutive_dates() {
        let grid = CalendarGrid::for_month(ymd(2025, 2, 1));
        let days: Vec<_> = grid.days().collect();
        assert_eq!(days.len(), GRID_DAYS);
        assert!(days.windows(2).all(|w| w[1] - w[0] == Duration::days(1)));
        assert_eq!(grid.week(5).len(), GRID_COLS);
        assert_eq!(grid.week(5)[0], grid.start() + Duration::days(35));
    }
}
