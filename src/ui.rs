use agenda::config::AgendaConfig;
use agenda::layout::effective_end;
use agenda::model::{LayoutEvent, NormalizedEvent};
use agenda::snapshot::{AgendaSnapshot, EventFilter};
use agenda::source::{SourceLocation, YamlFileSource};
use agenda::window::{shift, window_for, DateWindow, ViewMode};
use anyhow::Result;
use chrono::{Datelike, Duration as ChronoDuration, Local, NaiveDate, Timelike};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

const ROWS_PER_HOUR: u16 = 2;
const DEFAULT_FIRST_HOUR: u32 = 7;

pub fn run(
    location: SourceLocation,
    config: AgendaConfig,
    anchor: NaiveDate,
    filter: EventFilter,
) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(location, config, anchor, filter);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    location: SourceLocation,
    source: YamlFileSource,
    config: AgendaConfig,
    filter: EventFilter,
    view: ViewMode,
    cursor: NaiveDate,
    snapshot: Option<AgendaSnapshot>,
    /// View and window of the last fetch that failed; not retried until `r`
    /// or the cursor leaves it.
    failed: Option<(ViewMode, DateWindow)>,
    last_load: Instant,
    status: String,
    first_hour: u32,
}

impl App {
    fn new(
        location: SourceLocation,
        config: AgendaConfig,
        anchor: NaiveDate,
        filter: EventFilter,
    ) -> Self {
        let source = YamlFileSource::new(&location.events);
        let status = format!("Reading events from {}", location.events.display());
        App {
            location,
            source,
            config,
            filter,
            view: ViewMode::Month,
            cursor: anchor,
            snapshot: None,
            failed: None,
            last_load: Instant::now(),
            status,
            first_hour: DEFAULT_FIRST_HOUR,
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            self.ensure_snapshot();
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Refetches whenever the view or the cursor leaves the loaded window.
    fn ensure_snapshot(&mut self) {
        if self.is_stale() {
            self.reload();
        }
    }

    fn is_stale(&self) -> bool {
        let covers = |mode: ViewMode, window: &DateWindow| {
            mode == self.view && window.contains(self.cursor)
        };
        match (&self.snapshot, &self.failed) {
            (Some(snap), _) => !covers(snap.mode, &snap.window),
            (None, Some((mode, window))) => !covers(*mode, window),
            (None, None) => true,
        }
    }

    fn reload(&mut self) {
        match AgendaSnapshot::fetch(
            &self.source,
            self.view,
            self.cursor,
            &self.filter,
            &self.config,
        ) {
            Ok(snap) => {
                self.status = if snap.skipped.is_empty() {
                    format!("{} event(s) in {}", snap.total_events(), snap.window)
                } else {
                    format!(
                        "{} event(s) in {}  •  {} record(s) could not be read",
                        snap.total_events(),
                        snap.window,
                        snap.skipped.len()
                    )
                };
                self.snapshot = Some(snap);
                self.failed = None;
            }
            Err(err) => {
                self.status = format!("Load failed: {}", err);
                self.snapshot = None;
                self.failed = Some((self.view, window_for(self.view, self.cursor)));
            }
        }
        self.last_load = Instant::now();
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('1') => self.view = ViewMode::Month,
            KeyCode::Char('2') => self.view = ViewMode::Week,
            KeyCode::Char('3') => self.view = ViewMode::Day,
            KeyCode::Char('t') => self.cursor = Local::now().date_naive(),
            KeyCode::Char('r') => {
                self.reload();
                return false;
            }
            KeyCode::Char('[') => self.cursor = shift(self.view, self.cursor, -1),
            KeyCode::Char(']') => self.cursor = shift(self.view, self.cursor, 1),
            KeyCode::Left | KeyCode::Char('h') => self.move_cursor(-1),
            KeyCode::Right | KeyCode::Char('l') => self.move_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => match self.view {
                ViewMode::Day => self.first_hour = self.first_hour.saturating_sub(1),
                _ => self.move_cursor(-7),
            },
            KeyCode::Down | KeyCode::Char('j') => match self.view {
                ViewMode::Day => self.first_hour = (self.first_hour + 1).min(23),
                _ => self.move_cursor(7),
            },
            KeyCode::Enter => {
                if self.view != ViewMode::Day {
                    self.view = ViewMode::Day;
                }
            }
            _ => {}
        }
        false
    }

    fn move_cursor(&mut self, days: i64) {
        if let Some(date) = self.cursor.checked_add_signed(ChronoDuration::days(days)) {
            self.cursor = date;
        }
    }

    fn draw(&self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(5),
                Constraint::Length(2),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        match &self.snapshot {
            Some(snap) => match self.view {
                ViewMode::Month => self.draw_month(f, layout[1], snap),
                ViewMode::Week => self.draw_week(f, layout[1], snap),
                ViewMode::Day => self.draw_day(f, layout[1], snap),
            },
            None => {
                let msg = Paragraph::new("No events loaded")
                    .alignment(Alignment::Center)
                    .block(Block::default().borders(Borders::ALL).title("agenda"));
                f.render_widget(Clear, layout[1]);
                f.render_widget(msg, layout[1]);
            }
        }
        self.draw_footer(f, layout[2]);
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let title = Line::from(vec![
            Span::styled(
                "agenda ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                self.cursor.format("%A %d %B %Y").to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(self.location.scope_label(), Style::default().fg(Color::Green)),
            Span::raw("  •  "),
            Span::styled(
                format!("{}", self.location.events.display()),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("loaded {}", format_elapsed(self.last_load)),
                Style::default().fg(Color::Gray),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("view {}", self.view),
                Style::default().fg(Color::Magenta),
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

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "1 month  2 week  3 day  ←→/hl day  ↑↓/kj week|scroll  [ ] period  t today  r reload  q quit";
        let lines = vec![
            Line::from(Span::styled(help, Style::default().fg(Color::DarkGray))),
            Line::from(Span::styled(
                self.status.clone(),
                Style::default().fg(self.status_color()),
            )),
        ];
        let footer = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(footer, area);
    }

    fn status_color(&self) -> Color {
        match &self.snapshot {
            Some(snap) if !snap.skipped.is_empty() => Color::LightYellow,
            Some(_) => Color::Gray,
            None => Color::LightRed,
        }
    }

    fn draw_month(&self, f: &mut ratatui::Frame<'_>, area: Rect, snap: &AgendaSnapshot) {
        let sections = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);

        let month_start = snap.window.start;
        let start_offset = month_start.weekday().num_days_from_monday() as usize;
        let cells = snap.month_cells();
        let mut lines = Vec::new();
        lines.push(Line::from(Span::styled(
            format!("{} {}", month_start.format("%B"), month_start.year()),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
        let headings = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];
        let header_spans: Vec<Span<'static>> = headings
            .iter()
            .map(|h| Span::styled(format!("{:^10}", h), Style::default().fg(Color::Gray)))
            .collect();
        lines.push(Line::from(header_spans));

        let mut spans: Vec<Span<'static>> = vec![Span::raw(" ".repeat(10)); start_offset];
        for (idx, cell) in cells.iter().enumerate() {
            let mut day_style = Style::default().fg(if cell.total > 0 {
                Color::White
            } else {
                Color::DarkGray
            });
            if cell.has_urgent() {
                day_style = day_style.fg(Color::LightRed).add_modifier(Modifier::BOLD);
            } else if cell.warning {
                day_style = day_style.fg(Color::LightYellow);
            }
            if cell.date == self.cursor {
                day_style = day_style.bg(Color::Cyan).fg(Color::Black);
            }
            spans.push(Span::styled(format!(" {:>2}", cell.date.day()), day_style));
            let dot_spans: Vec<Span<'static>> = cell
                .dots
                .iter()
                .map(|c| Span::styled("•", Style::default().fg(hex_color(c))))
                .collect();
            let used = dot_spans.len() + usize::from(cell.overflow > 0);
            spans.push(Span::raw(" "));
            spans.extend(dot_spans);
            if cell.overflow > 0 {
                spans.push(Span::styled("+", Style::default().fg(Color::Gray)));
            }
            spans.push(Span::raw(" ".repeat(6usize.saturating_sub(used))));
            if (start_offset + idx + 1) % 7 == 0 {
                lines.push(Line::from(std::mem::take(&mut spans)));
                lines.push(Line::from(""));
            }
        }
        if !spans.is_empty() {
            lines.push(Line::from(spans));
        }

        let calendar = Paragraph::new(lines).block(
            Block::default()
                .title(Span::styled(
                    "Month",
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
        f.render_widget(calendar, sections[0]);

        let mut events: Vec<&NormalizedEvent> = snap.events_on(self.cursor).iter().collect();
        events.sort_by_key(|e| e.start);
        self.draw_event_list(
            f,
            sections[1],
            &self.cursor.format("%a %d %b").to_string(),
            &events,
            0,
        );
    }

    fn draw_week(&self, f: &mut ratatui::Frame<'_>, area: Rect, snap: &AgendaSnapshot) {
        let cells = snap.week_cells();
        let constraints = vec![Constraint::Ratio(1, 7); 7];
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);
        for (idx, cell) in cells.iter().enumerate().take(columns.len()) {
            let events: Vec<&NormalizedEvent> = cell.events.iter().collect();
            let title = cell.date.format("%a %d").to_string();
            self.draw_event_list(f, columns[idx], &title, &events, cell.overflow);
            if cell.date == self.cursor {
                let marker = Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan));
                f.render_widget(marker, columns[idx]);
            }
        }
    }

    fn draw_event_list(
        &self,
        f: &mut ratatui::Frame<'_>,
        area: Rect,
        title: &str,
        events: &[&NormalizedEvent],
        overflow: usize,
    ) {
        let width = area.width.saturating_sub(4) as usize;
        let mut items: Vec<ListItem> = if events.is_empty() {
            vec![ListItem::new(Span::styled(
                "Nothing scheduled",
                Style::default().fg(Color::DarkGray),
            ))]
        } else {
            events.iter().map(|e| event_item(e, width)).collect()
        };
        if overflow > 0 {
            items.push(ListItem::new(Span::styled(
                format!("+{} more", overflow),
                Style::default().fg(Color::Gray),
            )));
        }
        let block = Block::default()
            .title(Span::styled(
                title.to_string(),
                Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        f.render_widget(List::new(items).block(block), area);
    }

    fn draw_day(&self, f: &mut ratatui::Frame<'_>, area: Rect, snap: &AgendaSnapshot) {
        let day = snap.day_layout(self.cursor);
        let all_day_height = (day.all_day.len().min(3) as u16).max(1) + 2;
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(all_day_height), Constraint::Min(3)])
            .split(area);

        let all_day: Vec<&NormalizedEvent> = day.all_day.iter().collect();
        self.draw_event_list(f, sections[0], "All day", &all_day, 0);

        let block = Block::default()
            .title(Span::styled(
                format!("{} timed", day.timed.len()),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let inner = block.inner(sections[1]);
        f.render_widget(block, sections[1]);
        if inner.width < 8 || inner.height == 0 {
            return;
        }

        let gutter = Rect {
            x: inner.x,
            y: inner.y,
            width: 6,
            height: inner.height,
        };
        let grid = Rect {
            x: inner.x + 6,
            y: inner.y,
            width: inner.width - 6,
            height: inner.height,
        };
        let hour_lines: Vec<Line> = (0..inner.height)
            .map(|row| {
                let hour = self.first_hour + u32::from(row / ROWS_PER_HOUR);
                if row % ROWS_PER_HOUR == 0 && hour < 24 {
                    Line::from(Span::styled(
                        format!("{:02}:00", hour),
                        Style::default().fg(Color::DarkGray),
                    ))
                } else {
                    Line::from("")
                }
            })
            .collect();
        f.render_widget(Paragraph::new(hour_lines), gutter);

        for placed in &day.timed {
            if let Some(rect) = self.event_rect(placed, grid) {
                let color = hex_color(&placed.event.color);
                let text = truncate_text(
                    &format!(
                        "{} {}",
                        placed.event.start.format("%H:%M"),
                        placed.event.title
                    ),
                    rect.width as usize,
                );
                let widget = Paragraph::new(text).style(
                    Style::default()
                        .bg(color)
                        .fg(Color::Black)
                        .add_modifier(Modifier::BOLD),
                );
                f.render_widget(widget, rect);
            }
        }
    }

    /// Screen rectangle of a laid-out event inside the hour grid, if visible.
    fn event_rect(&self, placed: &LayoutEvent, grid: Rect) -> Option<Rect> {
        let start = &placed.event.start;
        let end = effective_end(&placed.event, self.config.default_duration());
        let start_min = i64::from(start.hour() * 60 + start.minute());
        let end_min = if end.date() > start.date() {
            24 * 60
        } else {
            i64::from(end.hour() * 60 + end.minute())
        };
        let origin = i64::from(self.first_hour) * 60;
        let per_row = 60 / i64::from(ROWS_PER_HOUR);
        let top = (start_min - origin).div_euclid(per_row);
        let bottom = (end_min - origin + per_row - 1).div_euclid(per_row);
        let height = i64::from(grid.height);
        if bottom <= 0 || top >= height {
            return None;
        }
        let top = top.max(0);
        let bottom = bottom.min(height).max(top + 1);

        let total = placed.total_columns.max(1) as u16;
        let col_width = grid.width / total;
        if col_width == 0 {
            return None;
        }
        let column = placed.column as u16;
        let x = grid.x + column * col_width;
        let width = if column + 1 == total {
            grid.width - column * col_width
        } else {
            col_width.saturating_sub(1).max(1)
        };
        Some(Rect {
            x,
            y: grid.y + top as u16,
            width,
            height: (bottom - top) as u16,
        })
    }
}

fn event_item(event: &NormalizedEvent, width: usize) -> ListItem<'static> {
    let when = if event.is_all_day() {
        String::new()
    } else {
        format!("{} ", event.start.format("%H:%M"))
    };
    let mut spans = vec![
        Span::styled("▍", Style::default().fg(hex_color(&event.color))),
        Span::styled(when.clone(), Style::default().fg(Color::LightYellow)),
        Span::styled(
            truncate_text(&event.title, width.saturating_sub(when.len() + 1)),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ];
    if let Some(patient) = &event.patient {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            patient.name.clone(),
            Style::default().fg(Color::LightMagenta),
        ));
    }
    ListItem::new(Line::from(spans))
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

/// `#rrggbb` to a terminal colour; anything else is gray.
fn hex_color(hex: &str) -> Color {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 {
        return Color::Gray;
    }
    let channel = |range: std::ops::Range<usize>| {
        digits
            .get(range)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
    };
    match (channel(0..2), channel(2..4), channel(4..6)) {
        (Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
        _ => Color::Gray,
    }
}

fn truncate_text(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out.chars().take(max).collect()
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}
