use crate::aggregate::{month_cells, week_cells, MonthCell, WeekCell};
use crate::config::AgendaConfig;
use crate::group::{group_by_day, DayBuckets};
use crate::layout::layout_day;
use crate::model::{DayLayout, EventType, NormalizedEvent};
use crate::normalize::{normalize, SkippedRecord};
use crate::source::{EventQuery, EventSource, SourceError};
use crate::window::{window_for, DateWindow, ViewMode};
use chrono::NaiveDate;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub types: Vec<EventType>,
    pub patient_id: Option<String>,
}

/// Everything one view needs, computed from a single fetch. Nothing is kept
/// between snapshots; a new anchor or filter means a new snapshot.
#[derive(Debug, Clone)]
pub struct AgendaSnapshot {
    pub mode: ViewMode,
    pub anchor: NaiveDate,
    pub window: DateWindow,
    pub days: DayBuckets,
    pub skipped: Vec<SkippedRecord>,
    pub config: AgendaConfig,
}

impl AgendaSnapshot {
    pub fn fetch<S>(
        source: &S,
        mode: ViewMode,
        anchor: NaiveDate,
        filter: &EventFilter,
        config: &AgendaConfig,
    ) -> Result<Self, SourceError>
    where
        S: EventSource + ?Sized,
    {
        let window = window_for(mode, anchor);
        let query = EventQuery::new(window)
            .with_types(filter.types.iter().cloned())
            .with_patient(filter.patient_id.clone());
        let fetched = source.fetch(&query)?;
        let normalized = normalize(fetched.records);
        let days = group_by_day(&normalized.events, window);
        let mut skipped = fetched.rejected;
        skipped.extend(normalized.skipped);
        if !skipped.is_empty() {
            info!(
                skipped = skipped.len(),
                %window,
                "some records could not be shown"
            );
        }
        Ok(AgendaSnapshot {
            mode,
            anchor,
            window,
            days,
            skipped,
            config: config.clone(),
        })
    }

    pub fn events_on(&self, date: NaiveDate) -> &[NormalizedEvent] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_events(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    pub fn month_cells(&self) -> Vec<MonthCell> {
        month_cells(&self.days, self.config.month_dot_limit)
    }

    pub fn week_cells(&self) -> Vec<WeekCell> {
        week_cells(&self.days, self.config.week_event_limit)
    }

    pub fn day_layout(&self, date: NaiveDate) -> DayLayout {
        layout_day(self.events_on(date), self.config.default_duration())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::RawRecord;
    use crate::source::MemorySource;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn generic(id: &str, event_type: &str, start: &str, end: Option<&str>) -> RawRecord {
        RawRecord::Generic {
            id: id.into(),
            event_type: event_type.into(),
            title: None,
            start: start.into(),
            end: end.map(Into::into),
            severity: None,
            patient: None,
            status: None,
        }
    }

    fn source() -> MemorySource {
        MemorySource {
            records: vec![
                generic("a", "appointment", "2024-03-06T09:00", Some("2024-03-06T10:00")),
                generic("b", "consultation", "2024-03-06T09:30", Some("2024-03-06T10:30")),
                generic("u", "urgent-alert", "2024-03-07", None),
                generic("x", "appointment", "someday", None),
                generic("next-month", "appointment", "2024-04-02T09:00", None),
            ],
        }
    }

    #[test]
    fn month_snapshot_groups_and_reports_skips() {
        let snap = AgendaSnapshot::fetch(
            &source(),
            ViewMode::Month,
            date(15),
            &EventFilter::default(),
            &AgendaConfig::default(),
        )
        .unwrap();
        assert_eq!(snap.days.len(), 31);
        assert_eq!(snap.total_events(), 3);
        assert_eq!(snap.skipped.len(), 1);
        assert_eq!(snap.skipped[0].record_id, "x");

        let cells = snap.month_cells();
        let seventh = cells.iter().find(|c| c.date == date(7)).unwrap();
        assert!(seventh.has_urgent());
    }

    #[test]
    fn day_layout_uses_configured_duration() {
        let snap = AgendaSnapshot::fetch(
            &source(),
            ViewMode::Day,
            date(6),
            &EventFilter::default(),
            &AgendaConfig::default(),
        )
        .unwrap();
        let day = snap.day_layout(date(6));
        let columns: Vec<_> = day.timed.iter().map(|l| (l.column, l.total_columns)).collect();
        assert_eq!(columns, [(0, 2), (1, 2)]);
        assert!(snap.day_layout(date(7)).timed.is_empty());
    }

    #[test]
    fn type_filter_narrows_the_fetch() {
        let filter = EventFilter {
            types: vec![EventType::Consultation],
            patient_id: None,
        };
        let snap = AgendaSnapshot::fetch(
            &source(),
            ViewMode::Week,
            date(6),
            &filter,
            &AgendaConfig::default(),
        )
        .unwrap();
        assert_eq!(snap.total_events(), 1);
        assert_eq!(snap.events_on(date(6))[0].id, "b");
    }
}
