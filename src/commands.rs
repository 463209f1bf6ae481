use crate::cli::{FilterArgs, ViewArgs};
use crate::ui;
use agenda::aggregate::{MonthCell, WeekCell};
use agenda::model::{DayLayout, EventType, NormalizedEvent};
use agenda::snapshot::{AgendaSnapshot, EventFilter};
use agenda::source::{explicit, init_project, locate, SourceLocation, YamlFileSource};
use agenda::window::{window_for, DateWindow, ViewMode};
use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;
use std::env;
use std::path::PathBuf;

#[derive(Serialize)]
struct ViewOutput<T: Serialize> {
    window: DateWindow,
    view: T,
    skipped: Vec<String>,
}

pub fn init() -> Result<()> {
    let cwd = env::current_dir()?;
    let location = init_project(&cwd).context("initializing .agenda directory")?;
    println!("Initialized agenda at {}", location.events.display());
    Ok(())
}

pub fn window(mode: ViewMode, date: Option<String>) -> Result<()> {
    let anchor = parse_anchor(date.as_deref())?;
    let range = window_for(mode, anchor);
    println!("{} {}", mode, range);
    Ok(())
}

pub fn month(file: Option<PathBuf>, args: ViewArgs) -> Result<()> {
    let (snapshot, location) = load_snapshot(file, ViewMode::Month, &args.filter)?;
    let cells = snapshot.month_cells();
    if args.yaml {
        return print_yaml(&snapshot, cells);
    }
    print_source(&location, &snapshot);
    print_month_grid(&snapshot, &cells);
    for cell in cells.iter().filter(|c| c.total > 0) {
        print_month_cell(cell);
    }
    print_skipped(&snapshot);
    Ok(())
}

pub fn week(file: Option<PathBuf>, args: ViewArgs) -> Result<()> {
    let (snapshot, location) = load_snapshot(file, ViewMode::Week, &args.filter)?;
    let cells = snapshot.week_cells();
    if args.yaml {
        return print_yaml(&snapshot, cells);
    }
    print_source(&location, &snapshot);
    for cell in &cells {
        print_week_cell(cell);
    }
    print_skipped(&snapshot);
    Ok(())
}

pub fn day(file: Option<PathBuf>, args: ViewArgs) -> Result<()> {
    let (snapshot, location) = load_snapshot(file, ViewMode::Day, &args.filter)?;
    let layout = snapshot.day_layout(snapshot.anchor);
    if args.yaml {
        return print_yaml(&snapshot, layout);
    }
    print_source(&location, &snapshot);
    print_day(&layout);
    print_skipped(&snapshot);
    Ok(())
}

pub fn tui(file: Option<PathBuf>, args: FilterArgs) -> Result<()> {
    let location = current_location(file)?;
    let config = location
        .load_config()
        .with_context(|| format!("loading {}", location.config.display()))?;
    let anchor = parse_anchor(args.date.as_deref())?;
    ui::run(location, config, anchor, filter_from(&args))
}

fn load_snapshot(
    file: Option<PathBuf>,
    mode: ViewMode,
    args: &FilterArgs,
) -> Result<(AgendaSnapshot, SourceLocation)> {
    let location = current_location(file)?;
    let config = location
        .load_config()
        .with_context(|| format!("loading {}", location.config.display()))?;
    let anchor = parse_anchor(args.date.as_deref())?;
    let source = YamlFileSource::new(&location.events);
    let snapshot = AgendaSnapshot::fetch(&source, mode, anchor, &filter_from(args), &config)
        .with_context(|| format!("reading events from {}", location.events.display()))?;
    Ok((snapshot, location))
}

fn current_location(file: Option<PathBuf>) -> Result<SourceLocation> {
    match file {
        Some(path) => Ok(explicit(path)),
        None => {
            let cwd = env::current_dir()?;
            locate(&cwd).context("locating events file")
        }
    }
}

fn filter_from(args: &FilterArgs) -> EventFilter {
    EventFilter {
        types: args.types.iter().map(|t| EventType::from_tag(t)).collect(),
        patient_id: args.patient.clone(),
    }
}

pub fn parse_anchor(input: Option<&str>) -> Result<NaiveDate> {
    let raw = match input.map(str::trim) {
        Some(r) if !r.is_empty() => r,
        _ => return Ok(Local::now().date_naive()),
    };
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| anyhow!("invalid date format (use YYYY-MM-DD): {}", raw))
}

fn print_yaml<T: Serialize>(snapshot: &AgendaSnapshot, view: T) -> Result<()> {
    let output = ViewOutput {
        window: snapshot.window,
        view,
        skipped: snapshot
            .skipped
            .iter()
            .map(|s| format!("{}: {}", s.record_id, s.error))
            .collect(),
    };
    print!("{}", serde_yaml::to_string(&output).context("serializing view")?);
    Ok(())
}

fn print_source(location: &SourceLocation, snapshot: &AgendaSnapshot) {
    println!(
        "{} view {} ({} {})",
        snapshot.mode.label(),
        snapshot.window,
        location.scope_label(),
        location.events.display()
    );
    println!();
}

fn print_skipped(snapshot: &AgendaSnapshot) {
    if snapshot.skipped.is_empty() {
        return;
    }
    println!();
    println!(
        "! {} record(s) could not be read and are not shown:",
        snapshot.skipped.len()
    );
    for skipped in &snapshot.skipped {
        println!("  - {}: {}", skipped.record_id, skipped.error);
    }
}

fn print_month_grid(snapshot: &AgendaSnapshot, cells: &[MonthCell]) {
    let month_start = snapshot.window.start;
    println!("{} {}", month_start.format("%B"), month_start.year());
    println!(" Mo     Tu     We     Th     Fr     Sa     Su");
    let offset = month_start.weekday().num_days_from_monday() as usize;
    let mut line = "       ".repeat(offset);
    for (idx, cell) in cells.iter().enumerate() {
        let flag = if cell.has_urgent() {
            '!'
        } else if cell.warning {
            '~'
        } else {
            ' '
        };
        let text = if cell.total > 0 {
            format!("{:>2}({:>2}){}", cell.date.day(), cell.total, flag)
        } else {
            format!("{:>2}     ", cell.date.day())
        };
        line.push_str(&text);
        if (offset + idx + 1) % 7 == 0 {
            println!("{}", line.trim_end());
            line.clear();
        }
    }
    if !line.is_empty() {
        println!("{}", line.trim_end());
    }
    println!();
}

fn print_month_cell(cell: &MonthCell) {
    let mut text = format!(
        "{}  {} event(s)  {}",
        cell.date.format("%a %Y-%m-%d"),
        cell.total,
        cell.dots.join(" ")
    );
    if cell.overflow > 0 {
        text.push_str(&format!(" +{}", cell.overflow));
    }
    if cell.has_urgent() {
        text.push_str(&format!("  URGENT x{}", cell.urgent));
    } else if cell.warning {
        text.push_str("  warning");
    }
    println!("{}", text);
}

fn print_week_cell(cell: &WeekCell) {
    println!("{}", cell.date.format("%a %Y-%m-%d"));
    if cell.events.is_empty() {
        println!("  (empty)");
    }
    for event in &cell.events {
        println!("  {}", event_line(event));
    }
    if cell.overflow > 0 {
        println!("  +{} more", cell.overflow);
    }
}

fn print_day(layout: &DayLayout) {
    println!("All day");
    if layout.all_day.is_empty() {
        println!("  (none)");
    }
    for event in &layout.all_day {
        println!("  {}", event_line(event));
    }
    println!();
    println!("Timed");
    if layout.timed.is_empty() {
        println!("  (none)");
    }
    for placed in &layout.timed {
        println!(
            "  [{}/{}] {}",
            placed.column + 1,
            placed.total_columns,
            event_line(&placed.event)
        );
    }
}

pub fn event_line(event: &NormalizedEvent) -> String {
    let when = if event.is_all_day() {
        "all day    ".to_string()
    } else {
        match event.end {
            Some(end) => format!("{}-{}", event.start.format("%H:%M"), end.format("%H:%M")),
            None => format!("{}      ", event.start.format("%H:%M")),
        }
    };
    let mut text = format!("{}  {}: {}", when, event.label, event.title);
    if let Some(patient) = &event.patient {
        text.push_str(&format!("  ({})", patient.name));
    }
    if let Some(status) = &event.status {
        text.push_str(&format!("  [{}]", status));
    }
    text
}
