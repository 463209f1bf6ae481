use crate::model::NormalizedEvent;
use crate::window::DateWindow;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

pub type DayBuckets = BTreeMap<NaiveDate, Vec<NormalizedEvent>>;

/// `YYYY-MM-DD` key of a local calendar date.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Buckets events by the local date of their start. Every day of `window`
/// gets a bucket, possibly empty. An event that ends on a later day stays in
/// its start day only; events starting outside the window are dropped.
pub fn group_by_day<'a, I>(events: I, window: DateWindow) -> DayBuckets
where
    I: IntoIterator<Item = &'a NormalizedEvent>,
{
    let mut buckets: DayBuckets = window.days().map(|d| (d, Vec::new())).collect();
    let mut dropped = 0usize;
    for event in events {
        match buckets.get_mut(&event.date()) {
            Some(bucket) => bucket.push(event.clone()),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!(dropped, %window, "events outside window");
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventType;
    use crate::window::{window_for, ViewMode};
    use chrono::NaiveDateTime;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn event(id: &str, start: &str, end: Option<&str>) -> NormalizedEvent {
        NormalizedEvent::new(id, EventType::Appointment, id, dt(start), end.map(dt))
    }

    #[test]
    fn every_day_in_window_has_a_bucket() {
        let window = window_for(ViewMode::Week, dt("2024-03-06 00:00").date());
        let buckets = group_by_day(&Vec::<NormalizedEvent>::new(), window);
        assert_eq!(buckets.len(), 7);
        assert!(buckets.values().all(Vec::is_empty));
    }

    #[test]
    fn event_lands_on_its_start_date_only() {
        let window = window_for(ViewMode::Week, dt("2024-03-06 00:00").date());
        let events = vec![
            event("late", "2024-03-05 23:30", Some("2024-03-06 01:00")),
            event("early", "2024-03-06 00:00", Some("2024-03-06 00:30")),
        ];
        let buckets = group_by_day(&events, window);
        let tue = &buckets[&dt("2024-03-05 00:00").date()];
        let wed = &buckets[&dt("2024-03-06 00:00").date()];
        assert_eq!(tue.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), ["late"]);
        assert_eq!(wed.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), ["early"]);
        let total: usize = buckets.values().map(Vec::len).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn events_outside_window_are_dropped() {
        let window = window_for(ViewMode::Day, dt("2024-03-06 00:00").date());
        let events = vec![
            event("before", "2024-03-05 10:00", None),
            event("inside", "2024-03-06 10:00", None),
            event("after", "2024-03-07 10:00", None),
        ];
        let buckets = group_by_day(&events, window);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets.values().next().map(Vec::len), Some(1));
    }

    #[test]
    fn date_key_is_zero_padded() {
        assert_eq!(date_key(dt("2024-03-06 15:00").date()), "2024-03-06");
    }
}
