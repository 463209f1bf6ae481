use crate::config::AgendaConfig;
use crate::model::EventType;
use crate::normalize::{parse_date, NormalizeError, RawRecord, SkippedRecord};
use crate::window::DateWindow;
use directories::ProjectDirs;
use serde_yaml::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const PROJECT_DIR: &str = ".agenda";
const EVENTS_FILE: &str = "events.yml";
const CONFIG_FILE: &str = "config.yml";

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("could not locate a data directory")]
    NoDataDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceScope {
    Project,
    Global,
    Explicit,
}

#[derive(Debug, Clone)]
pub struct SourceLocation {
    pub events: PathBuf,
    pub config: PathBuf,
    pub scope: SourceScope,
}

impl SourceLocation {
    pub fn scope_label(&self) -> &'static str {
        match self.scope {
            SourceScope::Project => "project",
            SourceScope::Global => "global",
            SourceScope::Explicit => "file",
        }
    }

    pub fn load_config(&self) -> Result<AgendaConfig, crate::config::ConfigError> {
        AgendaConfig::load(&self.config)
    }
}

/// What to ask the data layer for.
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    pub window: DateWindow,
    pub types: Option<BTreeSet<EventType>>,
    pub patient_id: Option<String>,
}

impl EventQuery {
    pub fn new(window: DateWindow) -> Self {
        EventQuery {
            window,
            types: None,
            patient_id: None,
        }
    }

    pub fn with_types(mut self, types: impl IntoIterator<Item = EventType>) -> Self {
        let types: BTreeSet<EventType> = types.into_iter().collect();
        self.types = if types.is_empty() { None } else { Some(types) };
        self
    }

    pub fn with_patient(mut self, patient_id: Option<String>) -> Self {
        self.patient_id = patient_id;
        self
    }

    /// Records whose start or type cannot be read are kept so that
    /// normalization can report them.
    pub fn matches(&self, record: &RawRecord) -> bool {
        if let Some(date) = parse_date(&record.start_text()) {
            if !self.window.contains(date) {
                return false;
            }
        }
        if let (Some(types), Ok(event_type)) = (&self.types, record.event_type()) {
            if !types.contains(&event_type) {
                return false;
            }
        }
        if let Some(patient_id) = &self.patient_id {
            if record.patient().map(|p| &p.id) != Some(patient_id) {
                return false;
            }
        }
        true
    }
}

/// Records handed back by a source, plus entries it could not turn into a
/// record at all. Rejects are reported alongside the view, not fatal.
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    pub records: Vec<RawRecord>,
    pub rejected: Vec<SkippedRecord>,
}

/// The data layer the agenda reads from.
pub trait EventSource {
    fn fetch(&self, query: &EventQuery) -> Result<Fetched, SourceError>;
}

/// In-memory records, filtered the same way as the file source.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub records: Vec<RawRecord>,
}

impl EventSource for MemorySource {
    fn fetch(&self, query: &EventQuery) -> Result<Fetched, SourceError> {
        Ok(Fetched {
            records: self
                .records
                .iter()
                .filter(|r| query.matches(r))
                .cloned()
                .collect(),
            rejected: Vec::new(),
        })
    }
}

/// An entry that failed to deserialize. Kept for a query unless its date or
/// patient can be read and falls outside it.
#[derive(Debug, Clone)]
struct RejectedEntry {
    entry: Value,
    skipped: SkippedRecord,
}

impl RejectedEntry {
    fn new(index: usize, entry: Value, error: serde_yaml::Error) -> Self {
        let record_id = match entry.get("id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => format!("#{}", index + 1),
        };
        RejectedEntry {
            entry,
            skipped: SkippedRecord {
                record_id,
                error: NormalizeError::Malformed(error.to_string()),
            },
        }
    }

    fn matches(&self, query: &EventQuery) -> bool {
        let date = ["start", "scheduled_for", "date"]
            .iter()
            .filter_map(|key| self.entry.get(*key).and_then(Value::as_str))
            .find_map(parse_date);
        if let Some(date) = date {
            if !query.window.contains(date) {
                return false;
            }
        }
        if let Some(patient_id) = &query.patient_id {
            let entry_patient = self
                .entry
                .get("patient")
                .and_then(|p| p.get("id"))
                .and_then(Value::as_str);
            if entry_patient.is_some_and(|id| id != patient_id.as_str()) {
                return false;
            }
        }
        true
    }
}

/// A YAML list of raw records on disk.
#[derive(Debug, Clone)]
pub struct YamlFileSource {
    path: PathBuf,
}

impl YamlFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        YamlFileSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record in the file. A file that is not a YAML list fails as a
    /// whole; a single entry that does not fit any record shape is rejected
    /// on its own.
    pub fn load_all(&self) -> Result<Fetched, SourceError> {
        let (records, rejected) = self.load_entries()?;
        Ok(Fetched {
            records,
            rejected: rejected.into_iter().map(|r| r.skipped).collect(),
        })
    }

    fn load_entries(&self) -> Result<(Vec<RawRecord>, Vec<RejectedEntry>), SourceError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "events file missing, treating as empty");
            return Ok((Vec::new(), Vec::new()));
        }
        let data = fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        if data.trim().is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        let entries: Vec<Value> =
            serde_yaml::from_str(&data).map_err(|source| SourceError::Parse {
                path: self.path.display().to_string(),
                source,
            })?;

        let mut records = Vec::with_capacity(entries.len());
        let mut rejected = Vec::new();
        for (index, entry) in entries.into_iter().enumerate() {
            match serde_yaml::from_value::<RawRecord>(entry.clone()) {
                Ok(record) => records.push(record),
                Err(error) => {
                    let reject = RejectedEntry::new(index, entry, error);
                    warn!(
                        path = %self.path.display(),
                        record_id = %reject.skipped.record_id,
                        error = %reject.skipped.error,
                        "skipping malformed entry"
                    );
                    rejected.push(reject);
                }
            }
        }
        Ok((records, rejected))
    }
}

impl EventSource for YamlFileSource {
    fn fetch(&self, query: &EventQuery) -> Result<Fetched, SourceError> {
        let (all, rejected) = self.load_entries()?;
        let total = all.len() + rejected.len();
        let records: Vec<RawRecord> = all.into_iter().filter(|r| query.matches(r)).collect();
        let rejected: Vec<SkippedRecord> = rejected
            .into_iter()
            .filter(|r| r.matches(query))
            .map(|r| r.skipped)
            .collect();
        debug!(
            path = %self.path.display(),
            total,
            matched = records.len(),
            rejected = rejected.len(),
            window = %query.window,
            "fetched records"
        );
        Ok(Fetched { records, rejected })
    }
}

pub fn init_project(dir: &Path) -> Result<SourceLocation, SourceError> {
    let root = dir.join(PROJECT_DIR);
    fs::create_dir_all(&root).map_err(|source| SourceError::Io {
        path: root.display().to_string(),
        source,
    })?;
    let location = SourceLocation {
        events: root.join(EVENTS_FILE),
        config: root.join(CONFIG_FILE),
        scope: SourceScope::Project,
    };
    if !location.events.exists() {
        write_file(&location.events, "[]\n")?;
    }
    if !location.config.exists() {
        let defaults = serde_yaml::to_string(&AgendaConfig::default()).map_err(|source| {
            SourceError::Parse {
                path: location.config.display().to_string(),
                source,
            }
        })?;
        write_file(&location.config, &defaults)?;
    }
    Ok(location)
}

/// Nearest `.agenda/events.yml` at or above `start`, else the per-user file.
pub fn locate(start: &Path) -> Result<SourceLocation, SourceError> {
    if let Some(events) = find_project_events(start) {
        let config = events.with_file_name(CONFIG_FILE);
        return Ok(SourceLocation {
            events,
            config,
            scope: SourceScope::Project,
        });
    }
    let dirs = ProjectDirs::from("", "", "agenda").ok_or(SourceError::NoDataDir)?;
    Ok(SourceLocation {
        events: dirs.data_dir().join(EVENTS_FILE),
        config: dirs.config_dir().join(CONFIG_FILE),
        scope: SourceScope::Global,
    })
}

/// A caller-chosen events file; its config sits next to it.
pub fn explicit(events: PathBuf) -> SourceLocation {
    let config = events.with_file_name(CONFIG_FILE);
    SourceLocation {
        events,
        config,
        scope: SourceScope::Explicit,
    }
}

fn find_project_events(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(PROJECT_DIR).join(EVENTS_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

fn write_file(path: &Path, contents: &str) -> Result<(), SourceError> {
    fs::write(path, contents).map_err(|source| SourceError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PatientRef;
    use crate::window::{window_for, ViewMode};
    use chrono::NaiveDate;

    fn appointment(id: &str, start: &str, patient: &str, category: Option<&str>) -> RawRecord {
        RawRecord::Appointment {
            id: id.into(),
            patient: Some(PatientRef {
                id: patient.into(),
                name: patient.to_uppercase(),
            }),
            start: start.into(),
            end: None,
            category: category.map(Into::into),
            reason: None,
            status: None,
        }
    }

    fn march_week() -> DateWindow {
        window_for(ViewMode::Week, NaiveDate::from_ymd_opt(2024, 3, 6).unwrap())
    }

    #[test]
    fn query_filters_by_window_type_and_patient() {
        let source = MemorySource {
            records: vec![
                appointment("in", "2024-03-05T10:00", "p1", None),
                appointment("out", "2024-03-12T10:00", "p1", None),
                appointment("consult", "2024-03-05T11:00", "p1", Some("consultation")),
                appointment("other", "2024-03-05T12:00", "p2", None),
                appointment("garbled", "tomorrow", "p1", None),
            ],
        };
        let query = EventQuery::new(march_week())
            .with_types([EventType::Appointment])
            .with_patient(Some("p1".into()));
        let ids: Vec<_> = source
            .fetch(&query)
            .unwrap()
            .records
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, ["in", "garbled"]);
    }

    #[test]
    fn empty_type_list_means_no_filter() {
        let query = EventQuery::new(march_week()).with_types(Vec::new());
        assert_eq!(query.types, None);
    }

    #[test]
    fn init_then_locate_from_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        let created = init_project(dir.path()).unwrap();
        assert!(created.events.exists());
        assert!(created.config.exists());

        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        let found = locate(&nested).unwrap();
        assert_eq!(found.scope, SourceScope::Project);
        assert_eq!(found.events, created.events);
        assert_eq!(found.load_config().unwrap(), AgendaConfig::default());

        let source = YamlFileSource::new(&found.events);
        let fetched = source.fetch(&EventQuery::new(march_week())).unwrap();
        assert!(fetched.records.is_empty());
        assert!(fetched.rejected.is_empty());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.yml");
        fs::write(&path, "- source: appointment\n  id: [oops\n").unwrap();
        let err = YamlFileSource::new(&path).load_all().unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
    }

    #[test]
    fn entries_that_fit_no_shape_are_rejected_one_by_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.yml");
        fs::write(
            &path,
            r#"
- source: appointment
  id: ok
  start: 2024-03-05T10:00
- source: appointment
  id: no-start
  patient: { id: p1, name: Jane Doe }
- source: lab-result
  id: lab-1
  date: 2024-03-06
- source: appointment
  start: 2024-03-07T10:00
- source: lab-result
  id: lab-old
  date: 2023-01-01
"#,
        )
        .unwrap();
        let source = YamlFileSource::new(&path);

        let all = source.load_all().unwrap();
        assert_eq!(all.records.len(), 1);
        assert_eq!(all.rejected.len(), 4);

        let fetched = source.fetch(&EventQuery::new(march_week())).unwrap();
        assert_eq!(fetched.records.len(), 1);
        let ids: Vec<_> = fetched
            .rejected
            .iter()
            .map(|r| r.record_id.as_str())
            .collect();
        assert_eq!(ids, ["no-start", "lab-1", "#4"]);
        assert!(fetched
            .rejected
            .iter()
            .all(|r| matches!(r.error, NormalizeError::Malformed(_))));

        let other_patient = EventQuery::new(march_week()).with_patient(Some("p2".into()));
        let ids: Vec<_> = source
            .fetch(&other_patient)
            .unwrap()
            .rejected
            .into_iter()
            .map(|r| r.record_id)
            .collect();
        assert_eq!(ids, ["lab-1", "#4"]);
    }
}
