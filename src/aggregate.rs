use crate::group::DayBuckets;
use crate::model::{NormalizedEvent, Severity};
use chrono::NaiveDate;
use serde::Serialize;

pub const MONTH_DOT_LIMIT: usize = 5;
pub const WEEK_EVENT_LIMIT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCell {
    pub date: NaiveDate,
    pub total: usize,
    /// Distinct event colours, earliest first.
    pub dots: Vec<String>,
    /// Distinct colours that did not fit in `dots`.
    pub overflow: usize,
    pub urgent: usize,
    /// Only set when there is no urgent alert that day.
    pub warning: bool,
}

impl MonthCell {
    pub fn has_urgent(&self) -> bool {
        self.urgent > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekCell {
    pub date: NaiveDate,
    pub events: Vec<NormalizedEvent>,
    pub overflow: usize,
}

pub fn month_cell(date: NaiveDate, events: &[NormalizedEvent], dot_limit: usize) -> MonthCell {
    let mut colors: Vec<&str> = Vec::new();
    for event in chronological(events) {
        if !colors.contains(&event.color.as_str()) {
            colors.push(&event.color);
        }
    }
    let overflow = colors.len().saturating_sub(dot_limit);
    colors.truncate(dot_limit);

    let urgent = events
        .iter()
        .filter(|e| e.severity == Some(Severity::Critical))
        .count();
    let warning = urgent == 0 && events.iter().any(|e| e.severity == Some(Severity::Warning));

    MonthCell {
        date,
        total: events.len(),
        dots: colors.into_iter().map(str::to_string).collect(),
        overflow,
        urgent,
        warning,
    }
}

pub fn week_cell(date: NaiveDate, events: &[NormalizedEvent], limit: usize) -> WeekCell {
    let sorted = chronological(events);
    let overflow = sorted.len().saturating_sub(limit);
    WeekCell {
        date,
        events: sorted.into_iter().take(limit).cloned().collect(),
        overflow,
    }
}

pub fn month_cells(buckets: &DayBuckets, dot_limit: usize) -> Vec<MonthCell> {
    buckets
        .iter()
        .map(|(date, events)| month_cell(*date, events, dot_limit))
        .collect()
}

pub fn week_cells(buckets: &DayBuckets, limit: usize) -> Vec<WeekCell> {
    buckets
        .iter()
        .map(|(date, events)| week_cell(*date, events, limit))
        .collect()
}

fn chronological(events: &[NormalizedEvent]) -> Vec<&NormalizedEvent> {
    let mut sorted: Vec<&NormalizedEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.start);
    sorted
}
