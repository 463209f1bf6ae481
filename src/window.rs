use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Month,
    Week,
    Day,
}

impl ViewMode {
    pub fn label(&self) -> &'static str {
        match self {
            ViewMode::Month => "Month",
            ViewMode::Week => "Week",
            ViewMode::Day => "Day",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label().to_lowercase())
    }
}

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

pub fn window_for(mode: ViewMode, anchor: NaiveDate) -> DateWindow {
    match mode {
        ViewMode::Month => {
            let start = anchor.with_day(1).unwrap_or(anchor);
            let days = days_in_month(anchor.year(), anchor.month());
            let end = start
                .checked_add_days(Days::new(u64::from(days) - 1))
                .unwrap_or(start);
            DateWindow { start, end }
        }
        ViewMode::Week => {
            let start = week_start(anchor);
            let end = start.checked_add_days(Days::new(6)).unwrap_or(start);
            DateWindow { start, end }
        }
        ViewMode::Day => DateWindow {
            start: anchor,
            end: anchor,
        },
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

/// Moves the anchor by whole periods of the view (months, weeks or days).
/// The day of month is clamped when the target month is shorter.
pub fn shift(mode: ViewMode, anchor: NaiveDate, steps: i32) -> NaiveDate {
    let magnitude = steps.unsigned_abs();
    let moved = match mode {
        ViewMode::Month => {
            let months = Months::new(magnitude);
            if steps >= 0 {
                anchor.checked_add_months(months)
            } else {
                anchor.checked_sub_months(months)
            }
        }
        ViewMode::Week | ViewMode::Day => {
            let per_step = if mode == ViewMode::Week { 7 } else { 1 };
            let days = Days::new(u64::from(magnitude) * per_step);
            if steps >= 0 {
                anchor.checked_add_days(days)
            } else {
                anchor.checked_sub_days(days)
            }
        }
    };
    moved.unwrap_or(anchor)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}
