//! Column assignment for the day view.
//!
//! Timed events are placed left to right in start order. Each one takes the
//! lowest column no overlapping event still holds, and every event of an
//! overlap cluster ends up as wide as the cluster's peak concurrency.

use crate::model::{DayLayout, LayoutEvent, NormalizedEvent};
use chrono::{Duration, NaiveDateTime};
use tracing::debug;

struct Placement {
    /// Index into the output vector.
    slot: usize,
    effective_end: NaiveDateTime,
    column: usize,
}

/// End used for overlap tests only. An absent, zero-length or inverted end
/// is replaced by `start + min_duration`; the event itself is untouched.
pub fn effective_end(event: &NormalizedEvent, min_duration: Duration) -> NaiveDateTime {
    match event.end {
        Some(end) if end > event.start => end,
        Some(end) if end < event.start => {
            debug!(id = %event.id, %end, start = %event.start, "clamping inverted event");
            event.start + min_duration
        }
        _ => event.start + min_duration,
    }
}

pub fn layout_day(events: &[NormalizedEvent], min_duration: Duration) -> DayLayout {
    let (all_day, mut timed): (Vec<&NormalizedEvent>, Vec<&NormalizedEvent>) =
        events.iter().partition(|e| e.is_all_day());
    // stable: equal starts keep input order
    timed.sort_by_key(|e| e.start);

    let mut placed: Vec<LayoutEvent> = Vec::with_capacity(timed.len());
    let mut active: Vec<Placement> = Vec::new();
    let mut cluster_start = 0usize;
    let mut cluster_peak = 0usize;

    for event in timed {
        active.retain(|p| p.effective_end > event.start);
        if active.is_empty() {
            widen(&mut placed[cluster_start..], cluster_peak);
            cluster_start = placed.len();
            cluster_peak = 0;
        }

        let column = lowest_free_column(&active);
        let total_columns = active
            .iter()
            .map(|p| placed[p.slot].total_columns)
            .fold(column + 1, usize::max);
        for p in &active {
            placed[p.slot].total_columns = total_columns;
        }
        cluster_peak = cluster_peak.max(total_columns);

        active.push(Placement {
            slot: placed.len(),
            effective_end: effective_end(event, min_duration),
            column,
        });
        placed.push(LayoutEvent {
            event: event.clone(),
            column,
            total_columns,
        });
    }
    widen(&mut placed[cluster_start..], cluster_peak);

    DayLayout {
        all_day: all_day.into_iter().cloned().collect(),
        timed: placed,
    }
}

fn lowest_free_column(active: &[Placement]) -> usize {
    let mut taken: Vec<usize> = active.iter().map(|p| p.column).collect();
    taken.sort_unstable();
    let mut candidate = 0;
    for column in taken {
        if column == candidate {
            candidate += 1;
        } else if column > candidate {
            break;
        }
    }
    candidate
}

/// A closed cluster is as wide as the most columns it ever needed at once.
fn widen(cluster: &mut [LayoutEvent], peak: usize) {
    for placed in cluster {
        placed.total_columns = placed.total_columns.max(peak);
    }
}
