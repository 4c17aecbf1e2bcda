use anyhow::Result;
use chrono::{Datelike, Duration as Days, NaiveDate};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use parking_lot::Mutex;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::sync::Arc;
use std::time::Duration;

use gooddays::aggregate::{format_rate, group_by_date, Stats};
use gooddays::date::{first_of_month, shift_months, to_local_iso, to_storage_key, today};
use gooddays::grid::{CalendarGrid, GRID_COLS, GRID_ROWS};
use gooddays::model::{DayType, EntryMap, Theme};
use gooddays::ribbon::{pack_themes, RibbonSegment, ROW_CAPACITY};
use gooddays::store::{EntryStore, FallbackStore, Subscription, ThemeStore};

const RIBBON_FALLBACK: Color = Color::LightBlue;

pub fn run(store: FallbackStore, month: NaiveDate) -> Result<()> {
    let mut app = App::new(store, month)?;
    let mut terminal = setup_terminal()?;
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    store: FallbackStore,
    entries: Arc<Mutex<EntryMap>>,
    themes: Arc<Mutex<Vec<Theme>>>,
    // Held so the listeners stay registered while the view is open.
    _subscriptions: Vec<Subscription>,
    month: NaiveDate,
    cursor: NaiveDate,
    status: String,
    mode: Mode,
}

enum Mode {
    Normal,
    ConfirmDelete { date: String },
}

impl App {
    fn new(store: FallbackStore, month: NaiveDate) -> Result<Self> {
        let entries = Arc::new(Mutex::new(EntryMap::new()));
        let themes = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&entries);
        let entry_sub = store.subscribe_entries(Box::new(move |latest: &EntryMap| {
            *sink.lock() = latest.clone();
        }))?;
        let sink = Arc::clone(&themes);
        let theme_sub = store.subscribe_themes(Box::new(move |latest: &Vec<Theme>| {
            *sink.lock() = latest.clone();
        }))?;

        let month = first_of_month(month);
        let now = today();
        let cursor = if first_of_month(now) == month { now } else { month };
        let status = format!("{} journal", store.backend());
        Ok(App {
            store,
            entries,
            themes,
            _subscriptions: vec![entry_sub, theme_sub],
            month,
            cursor,
            status,
            mode: Mode::Normal,
        })
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::ConfirmDelete { .. } => self.handle_confirm_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Left | KeyCode::Char('h') => self.move_cursor(-1),
            KeyCode::Right | KeyCode::Char('l') => self.move_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-7),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(7),
            KeyCode::PageUp | KeyCode::Char('[') => self.shift_month(-1),
            KeyCode::PageDown | KeyCode::Char(']') => self.shift_month(1),
            KeyCode::Char('t') => {
                self.cursor = today();
                self.month = first_of_month(self.cursor);
            }
            KeyCode::Char('d') => {
                let date = to_local_iso(self.cursor);
                if self.entries.lock().contains_key(&to_storage_key(&date)) {
                    self.status = format!("Delete entry for {}? (y/n)", date);
                    self.mode = Mode::ConfirmDelete { date };
                } else {
                    self.status = format!("No entry for {}", date);
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) -> Result<bool> {
        let Mode::ConfirmDelete { date } = &self.mode else {
            return Ok(false);
        };
        let date = date.clone();
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                self.status = match self.store.remove_entry(&date) {
                    Ok(()) => format!("Removed {}", date),
                    Err(err) => {
                        tracing::warn!(date = %date, error = %err, "delete failed");
                        format!("Could not remove {}: {}", date, err)
                    }
                };
                self.mode = Mode::Normal;
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Delete cancelled".into();
                self.mode = Mode::Normal;
            }
            _ => {}
        }
        Ok(false)
    }

    /// Moves the cursor by whole days; the visible month follows it.
    fn move_cursor(&mut self, days: i64) {
        self.cursor += Days::days(days);
        self.month = first_of_month(self.cursor);
    }

    fn shift_month(&mut self, delta: i32) {
        self.month = shift_months(self.month, delta);
        self.cursor = self.month;
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(layout[1]);
        self.draw_calendar(f, body[0]);
        self.draw_detail(f, body[1]);
        self.draw_footer(f, layout[2]);

        if let Mode::ConfirmDelete { date } = &self.mode {
            self.draw_confirm(f, date);
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let title = Line::from(vec![
            Span::styled(
                "gooddays ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                self.month.format("%B %Y").to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(
                self.store.backend().to_string(),
                Style::default().fg(Color::Green),
            ),
            Span::raw("  •  "),
            Span::styled(
                self.store.user().unwrap_or("signed out").to_string(),
                Style::default().fg(Color::DarkGray),
            ),
        ]);

        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_calendar(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let grid = CalendarGrid::for_month(self.month);
        let segments = pack_themes(&self.themes.lock(), self.month);
        let entries = self.entries.lock();
        let cell_w = (area.width.saturating_sub(2) as usize / GRID_COLS).clamp(4, 14);
        let now = today();

        let mut lines = Vec::new();
        let header: Vec<Span<'static>> = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"]
            .iter()
            .map(|h| Span::styled(format!("{:<cell_w$}", h), Style::default().fg(Color::Gray)))
            .collect();
        lines.push(Line::from(header));

        for row in 0..GRID_ROWS {
            let spans: Vec<Span<'static>> = grid
                .week(row)
                .into_iter()
                .map(|date| {
                    let day = entries
                        .get(&to_storage_key(&to_local_iso(date)))
                        .map(|e| e.day_type);
                    let marker = match day {
                        Some(DayType::GoodDay) => '●',
                        Some(DayType::BadDay) => '○',
                        None => ' ',
                    };
                    let mut style = Style::default().fg(match day {
                        _ if !grid.in_month(date) => Color::DarkGray,
                        Some(DayType::GoodDay) => Color::LightGreen,
                        Some(DayType::BadDay) => Color::LightRed,
                        None => Color::Gray,
                    });
                    if date == now {
                        style = style.add_modifier(Modifier::UNDERLINED);
                    }
                    if date == self.cursor {
                        style = style
                            .bg(Color::Cyan)
                            .fg(Color::Black)
                            .add_modifier(Modifier::BOLD);
                    }
                    let text = format!("{:>2}{}", date.day(), marker);
                    Span::styled(format!("{:<cell_w$}", text), style)
                })
                .collect();
            lines.push(Line::from(spans));
            for slot in 0..ROW_CAPACITY {
                lines.push(lane_line(&segments, row, slot, cell_w));
            }
        }

        let block = Block::default()
            .title(Span::styled(
                "Calendar",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        f.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn draw_detail(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let iso = to_local_iso(self.cursor);
        let mut lines = Vec::new();
        match self.entries.lock().get(&to_storage_key(&iso)) {
            Some(entry) => {
                let (label, color) = match entry.day_type {
                    DayType::GoodDay => ("Good day", Color::LightGreen),
                    DayType::BadDay => ("Bad day", Color::LightRed),
                };
                lines.push(Line::from(Span::styled(
                    label,
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(format!("{:?} • {:?}", entry.energy, entry.touch)));
                if entry.has_note() {
                    lines.push(Line::from(""));
                    lines.push(Line::from(entry.note.clone()));
                }
                if !entry.photo_refs.is_empty() {
                    lines.push(Line::from(Span::styled(
                        format!("{} photo(s)", entry.photo_refs.len()),
                        Style::default().fg(Color::DarkGray),
                    )));
                }
            }
            None => lines.push(Line::from(Span::styled(
                "Nothing logged",
                Style::default().fg(Color::DarkGray),
            ))),
        }

        let themes = self.themes.lock();
        let covering: Vec<&Theme> = themes.iter().filter(|t| t.covers(self.cursor)).collect();
        if !covering.is_empty() {
            lines.push(Line::from(""));
            for theme in covering {
                let color = parse_hex_color(theme.color_or_default()).unwrap_or(RIBBON_FALLBACK);
                lines.push(Line::from(vec![
                    Span::styled("■ ", Style::default().fg(color)),
                    Span::raw(theme.title.clone()),
                ]));
            }
        }

        let block = Block::default()
            .title(Span::styled(
                iso,
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let groups = group_by_date(self.entries.lock().values());
        let stats = Stats::compute(&groups, today());
        let summary = format!(
            "{} days logged  •  longest streak {}  •  current streak {}  •  good days {}",
            stats.days_logged,
            stats.longest_streak,
            stats.current_streak,
            format_rate(stats.good_day_rate)
        );
        let stats_bar = Paragraph::new(summary)
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(stats_bar, rows[0]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(rows[1]);
        let status = Paragraph::new(self.status.clone()).block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(status, bottom[0]);
        let help = Paragraph::new("←→ day  ↑↓ week  [ ] month  t today  d delete  q quit")
            .alignment(Alignment::Right)
            .style(Style::default().fg(Color::DarkGray))
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help, bottom[1]);
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, date: &str) {
        let area = centered_rect(50, 30, f.size());
        let body = vec![
            Line::from(Span::styled(
                format!("Delete the entry for {}?", date),
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press y to confirm, n or Esc to cancel"),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    "Confirm Delete",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

/// One ribbon lane of a week row, `cell_w` columns per day.
fn lane_line(segments: &[RibbonSegment], row: usize, slot: usize, cell_w: usize) -> Line<'static> {
    let mut lane: Vec<&RibbonSegment> = segments
        .iter()
        .filter(|s| s.row == row && s.slot == slot)
        .collect();
    lane.sort_by_key(|s| s.col);

    let mut spans = Vec::new();
    let mut col = 0;
    for seg in lane {
        if seg.col > col {
            spans.push(Span::raw(" ".repeat((seg.col - col) * cell_w)));
        }
        let width = seg.span_days * cell_w;
        let label = format!("{:<width$}", truncate_text(&seg.title, width));
        let color = parse_hex_color(&seg.color).unwrap_or(RIBBON_FALLBACK);
        spans.push(Span::styled(label, Style::default().bg(color).fg(Color::Black)));
        col = seg.col + seg.span_days;
    }
    Line::from(spans)
}

/// `#rrggbb` to a terminal color.
fn parse_hex_color(input: &str) -> Option<Color> {
    let hex = input.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max <= 3 {
        return text.chars().take(max).collect();
    }
    let mut out: String = text.chars().take(max - 3).collect();
    out.push_str("...");
    out
}
