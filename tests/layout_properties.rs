use agenda::layout::{effective_end, layout_day};
use agenda::model::{EventType, LayoutEvent, NormalizedEvent};
use chrono::{Duration, NaiveDate, NaiveDateTime};

fn min_duration() -> Duration {
    Duration::minutes(30)
}

fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 6)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

fn event(id: usize, start_min: i64, length: Option<i64>) -> NormalizedEvent {
    let start = base() + Duration::minutes(start_min);
    let end = length.map(|l| start + Duration::minutes(l));
    NormalizedEvent::new(format!("e{id}"), EventType::Appointment, "x", start, end)
}

fn interval(e: &LayoutEvent) -> (NaiveDateTime, NaiveDateTime) {
    (e.event.start, effective_end(&e.event, min_duration()))
}

fn overlaps(a: &LayoutEvent, b: &LayoutEvent) -> bool {
    let (a_start, a_end) = interval(a);
    let (b_start, b_end) = interval(b);
    a_start < b_end && b_start < a_end
}

/// Peak number of events covering one instant, per event, over its cluster.
fn cluster_peaks(out: &[LayoutEvent]) -> Vec<usize> {
    let mut peaks = vec![0; out.len()];
    let mut start = 0;
    while start < out.len() {
        let mut end = start + 1;
        let mut reach = interval(&out[start]).1;
        while end < out.len() && interval(&out[end]).0 < reach {
            reach = reach.max(interval(&out[end]).1);
            end += 1;
        }
        let cluster = &out[start..end];
        let peak = cluster
            .iter()
            .map(|probe| {
                let t = probe.event.start;
                cluster
                    .iter()
                    .filter(|e| {
                        let (s, en) = interval(e);
                        s <= t && t < en
                    })
                    .count()
            })
            .max()
            .unwrap_or(0);
        for p in &mut peaks[start..end] {
            *p = peak;
        }
        start = end;
    }
    peaks
}

fn check(events: &[NormalizedEvent]) {
    let day = layout_day(events, min_duration());
    let out = &day.timed;
    assert_eq!(out.len(), events.len());
    assert!(out.windows(2).all(|w| w[0].event.start <= w[1].event.start));

    for (i, a) in out.iter().enumerate() {
        assert!(a.total_columns >= a.column + 1, "{:?}", a);
        for b in &out[i + 1..] {
            if overlaps(a, b) {
                assert_ne!(a.column, b.column, "{} and {} collide", a.event.id, b.event.id);
            }
        }
    }

    for (placed, peak) in out.iter().zip(cluster_peaks(out)) {
        assert_eq!(placed.total_columns, peak, "{} in {:?}", placed.event.id, events);
    }

    assert_eq!(layout_day(events, min_duration()), day);
}

#[test]
fn exhaustive_three_event_days() {
    let starts = [0, 15, 30, 45, 60];
    let lengths = [None, Some(0), Some(15), Some(30), Some(60)];
    let mut shapes = Vec::new();
    for s in starts {
        for l in lengths {
            shapes.push((s, l));
        }
    }
    for a in &shapes {
        for b in &shapes {
            for c in &shapes {
                let events = vec![
                    event(0, a.0, a.1),
                    event(1, b.0, b.1),
                    event(2, c.0, c.1),
                ];
                check(&events);
            }
        }
    }
}

/// Small deterministic generator so failures reproduce.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

#[test]
fn generated_busy_days() {
    let mut rng = Lcg(42);
    for _ in 0..300 {
        let count = 1 + rng.next(16) as usize;
        let events: Vec<_> = (0..count)
            .map(|id| {
                let start = rng.next(48) as i64 * 15;
                let length = match rng.next(5) {
                    0 => None,
                    n => Some(rng.next(12) as i64 * 15 * n as i64 / 2),
                };
                event(id, start, length)
            })
            .collect();
        check(&events);
    }
}

#[test]
fn disjoint_events_all_get_one_column() {
    let events: Vec<_> = (0..10).map(|i| event(i, i as i64 * 60, Some(45))).collect();
    let day = layout_day(&events, min_duration());
    assert!(day
        .timed
        .iter()
        .all(|l| l.column == 0 && l.total_columns == 1));
}

#[test]
fn deep_stack_uses_one_column_per_event() {
    let events: Vec<_> = (0..25).map(|i| event(i, i as i64, Some(120))).collect();
    let day = layout_day(&events, min_duration());
    for (i, placed) in day.timed.iter().enumerate() {
        assert_eq!(placed.column, i);
        assert_eq!(placed.total_columns, 25);
    }
}
