use agenda::config::AgendaConfig;
use agenda::model::{EventType, Severity};
use agenda::normalize::NormalizeError;
use agenda::snapshot::{AgendaSnapshot, EventFilter};
use agenda::source::{explicit, YamlFileSource};
use agenda::window::ViewMode;
use chrono::NaiveDate;
use std::fs;

const EVENTS: &str = r#"
- source: appointment
  id: appt-1
  patient: { id: p1, name: Jane Doe }
  start: 2024-02-12T09:00
  end: 2024-02-12T10:00
  status: confirmed
- source: appointment
  id: appt-2
  patient: { id: p2, name: Ana Silva }
  start: 2024-02-12T09:30
  end: 2024-02-12T10:30
  category: consultation
- source: appointment
  id: appt-3
  patient: { id: p1, name: Jane Doe }
  start: 2024-02-12T10:00
  end: 2024-02-12T11:00
  category: re-education
- source: alert
  id: alert-1
  patient: { id: p1, name: Jane Doe }
  date: 2024-02-12
  level: warning
  message: Glucose test overdue
- source: alert
  id: alert-2
  patient: { id: p2, name: Ana Silva }
  date: 2024-02-14
  time: "08:15"
  level: urgent
  message: Reduced fetal movement reported
- source: prenatal-exam
  id: exam-1
  patient: { id: p2, name: Ana Silva }
  scheduled_for: 2024-02-29
  exam: Third trimester ultrasound
- source: due-date
  id: due-1
  patient: { id: p2, name: Ana Silva }
  date: 2024-05-20
- source: generic
  id: broken
  type: appointment
  start: 2024-02-31T09:00
"#;

fn write_events() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.yml");
    fs::write(&path, EVENTS).unwrap();
    (dir, path)
}

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

#[test]
fn month_view_from_file() {
    let (_dir, path) = write_events();
    let location = explicit(path);
    let config = location.load_config().unwrap();
    let source = YamlFileSource::new(&location.events);
    let snap = AgendaSnapshot::fetch(
        &source,
        ViewMode::Month,
        date(2, 15),
        &EventFilter::default(),
        &config,
    )
    .unwrap();

    assert_eq!(snap.window.end, date(2, 29));
    assert_eq!(snap.total_events(), 6);
    // 2024-02-31 does not exist
    assert_eq!(snap.skipped.len(), 1);
    assert_eq!(snap.skipped[0].record_id, "broken");

    let cells = snap.month_cells();
    let twelfth = cells.iter().find(|c| c.date == date(2, 12)).unwrap();
    assert_eq!(twelfth.total, 4);
    assert!(twelfth.warning);
    assert!(!twelfth.has_urgent());
    let fourteenth = cells.iter().find(|c| c.date == date(2, 14)).unwrap();
    assert_eq!(fourteenth.urgent, 1);
    let leap_day = cells.iter().find(|c| c.date == date(2, 29)).unwrap();
    assert_eq!(leap_day.total, 1);
}

#[test]
fn day_view_lays_out_overlaps() {
    let (_dir, path) = write_events();
    let source = YamlFileSource::new(&path);
    let snap = AgendaSnapshot::fetch(
        &source,
        ViewMode::Day,
        date(2, 12),
        &EventFilter::default(),
        &AgendaConfig::default(),
    )
    .unwrap();
    let day = snap.day_layout(date(2, 12));

    assert_eq!(day.all_day.len(), 1);
    assert_eq!(day.all_day[0].severity, Some(Severity::Warning));

    let placed: Vec<_> = day
        .timed
        .iter()
        .map(|l| (l.event.id.as_str(), l.column, l.total_columns))
        .collect();
    assert_eq!(
        placed,
        [("appt-1", 0, 2), ("appt-2", 1, 2), ("appt-3", 0, 2)]
    );
}

#[test]
fn week_view_with_patient_filter() {
    let (_dir, path) = write_events();
    let source = YamlFileSource::new(&path);
    let filter = EventFilter {
        types: Vec::new(),
        patient_id: Some("p2".into()),
    };
    let snap = AgendaSnapshot::fetch(
        &source,
        ViewMode::Week,
        date(2, 14),
        &filter,
        &AgendaConfig::default(),
    )
    .unwrap();
    assert_eq!(snap.window.start, date(2, 12));
    let ids: Vec<_> = snap
        .days
        .values()
        .flatten()
        .map(|e| e.id.as_str())
        .collect();
    assert_eq!(ids, ["appt-2", "alert-2"]);

    let cells = snap.week_cells();
    assert_eq!(cells.len(), 7);
    assert_eq!(cells[2].events[0].event_type, EventType::UrgentAlert);
}

#[test]
fn malformed_entries_do_not_blank_the_view() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.yml");
    fs::write(
        &path,
        r#"
- source: appointment
  id: good
  start: 2024-02-12T09:00
  end: 2024-02-12T09:30
- source: appointment
  id: no-start
  end: 2024-02-12T11:00
- source: lab-result
  id: lab-7
  date: 2024-02-12
  value: 5.4
"#,
    )
    .unwrap();
    let snap = AgendaSnapshot::fetch(
        &YamlFileSource::new(&path),
        ViewMode::Day,
        date(2, 12),
        &EventFilter::default(),
        &AgendaConfig::default(),
    )
    .unwrap();

    assert_eq!(snap.total_events(), 1);
    assert_eq!(snap.events_on(date(2, 12))[0].id, "good");
    let skipped: Vec<_> = snap.skipped.iter().map(|s| s.record_id.as_str()).collect();
    assert_eq!(skipped, ["no-start", "lab-7"]);
    assert!(matches!(
        snap.skipped[0].error,
        NormalizeError::Malformed(ref msg) if msg.contains("start")
    ));
}
