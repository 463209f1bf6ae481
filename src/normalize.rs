use crate::model::{EventType, NormalizedEvent, PatientRef, Severity};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One record as supplied by the data layer, shaped by the table it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum RawRecord {
    Appointment {
        id: String,
        patient: Option<PatientRef>,
        start: String,
        end: Option<String>,
        /// consultation, re-education, postpartum-follow-up, ...
        category: Option<String>,
        reason: Option<String>,
        status: Option<String>,
    },
    Alert {
        id: String,
        patient: Option<PatientRef>,
        date: String,
        time: Option<String>,
        level: String,
        message: String,
        status: Option<String>,
    },
    PrenatalExam {
        id: String,
        patient: Option<PatientRef>,
        scheduled_for: String,
        exam: String,
        #[serde(default)]
        done: bool,
    },
    PregnancyMilestone {
        id: String,
        patient: Option<PatientRef>,
        date: String,
        label: String,
    },
    DueDate {
        id: String,
        patient: Option<PatientRef>,
        date: String,
    },
    Generic {
        id: String,
        #[serde(rename = "type")]
        event_type: String,
        title: Option<String>,
        start: String,
        end: Option<String>,
        severity: Option<String>,
        patient: Option<PatientRef>,
        status: Option<String>,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("invalid {field} timestamp: {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("end {end} is before start {start}")]
    EndBeforeStart {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("malformed record: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    pub record_id: String,
    pub error: NormalizeError,
}

#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub events: Vec<NormalizedEvent>,
    pub skipped: Vec<SkippedRecord>,
}

impl RawRecord {
    pub fn id(&self) -> &str {
        match self {
            RawRecord::Appointment { id, .. }
            | RawRecord::Alert { id, .. }
            | RawRecord::PrenatalExam { id, .. }
            | RawRecord::PregnancyMilestone { id, .. }
            | RawRecord::DueDate { id, .. }
            | RawRecord::Generic { id, .. } => id,
        }
    }

    pub fn patient(&self) -> Option<&PatientRef> {
        match self {
            RawRecord::Appointment { patient, .. }
            | RawRecord::Alert { patient, .. }
            | RawRecord::PrenatalExam { patient, .. }
            | RawRecord::PregnancyMilestone { patient, .. }
            | RawRecord::DueDate { patient, .. }
            | RawRecord::Generic { patient, .. } => patient.as_ref(),
        }
    }

    /// The raw text the start instant is parsed from.
    pub fn start_text(&self) -> String {
        match self {
            RawRecord::Appointment { start, .. } | RawRecord::Generic { start, .. } => {
                start.clone()
            }
            RawRecord::Alert { date, time, .. } => match time {
                Some(time) => format!("{}T{}", date.trim(), time.trim()),
                None => date.clone(),
            },
            RawRecord::PrenatalExam { scheduled_for, .. } => scheduled_for.clone(),
            RawRecord::PregnancyMilestone { date, .. } | RawRecord::DueDate { date, .. } => {
                date.clone()
            }
        }
    }

    /// Type this record normalizes to, if its shape alone decides it.
    pub fn event_type(&self) -> Result<EventType, NormalizeError> {
        match self {
            RawRecord::Appointment { category, .. } => Ok(category
                .as_deref()
                .map(EventType::from_tag)
                .unwrap_or(EventType::Appointment)),
            RawRecord::Alert { level, .. } => match Severity::from_tag(level) {
                Some(Severity::Info) => Ok(EventType::InfoAlert),
                Some(Severity::Warning) => Ok(EventType::WarningAlert),
                Some(Severity::Critical) => Ok(EventType::UrgentAlert),
                None => Err(NormalizeError::InvalidField {
                    field: "level",
                    value: level.clone(),
                }),
            },
            RawRecord::PrenatalExam { .. } => Ok(EventType::PrenatalExam),
            RawRecord::PregnancyMilestone { .. } => Ok(EventType::PregnancyMilestone),
            RawRecord::DueDate { .. } => Ok(EventType::DueDateMarker),
            RawRecord::Generic { event_type, .. } => Ok(EventType::from_tag(event_type)),
        }
    }
}

/// Converts raw records into events. A record that fails to parse is left
/// out of `events` and reported in `skipped`; the rest of the batch carries on.
pub fn normalize<I>(records: I) -> Normalized
where
    I: IntoIterator<Item = RawRecord>,
{
    let mut out = Normalized::default();
    for record in records {
        let record_id = record.id().to_string();
        match normalize_record(record) {
            Ok(event) => out.events.push(event),
            Err(error) => {
                warn!(record_id = %record_id, %error, "skipping unparsable record");
                out.skipped.push(SkippedRecord { record_id, error });
            }
        }
    }
    debug!(
        events = out.events.len(),
        skipped = out.skipped.len(),
        "normalized records"
    );
    out
}

pub fn normalize_record(record: RawRecord) -> Result<NormalizedEvent, NormalizeError> {
    if record.id().trim().is_empty() {
        return Err(NormalizeError::MissingField("id"));
    }
    let event_type = record.event_type()?;
    let (start, time_given) = parse_field("start", &record.start_text())?;
    let end = match &record {
        RawRecord::Appointment { end, .. } | RawRecord::Generic { end, .. } => end
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_field("end", s).map(|(at, _)| at))
            .transpose()?,
        _ => None,
    };
    if let Some(end) = end {
        if end < start {
            return Err(NormalizeError::EndBeforeStart { start, end });
        }
    }

    let event = match record {
        RawRecord::Appointment {
            id,
            patient,
            reason,
            status,
            ..
        } => {
            let title = reason.unwrap_or_else(|| event_type.style().label.to_string());
            NormalizedEvent::new(id, event_type, title, start, end)
                .with_patient(patient)
                .with_status(status)
        }
        RawRecord::Alert {
            id,
            patient,
            level,
            message,
            status,
            ..
        } => NormalizedEvent::new(id, event_type, message, start, end)
            .with_severity(Severity::from_tag(&level))
            .with_patient(patient)
            .with_status(status),
        RawRecord::PrenatalExam {
            id,
            patient,
            exam,
            done,
            ..
        } => {
            let status = if done { "done" } else { "planned" };
            NormalizedEvent::new(id, event_type, exam, start, end)
                .with_patient(patient)
                .with_status(Some(status.to_string()))
        }
        RawRecord::PregnancyMilestone {
            id, patient, label, ..
        } => NormalizedEvent::new(id, event_type, label, start, end).with_patient(patient),
        RawRecord::DueDate { id, patient, .. } => {
            NormalizedEvent::new(id, event_type, "Expected due date", start, end)
                .with_patient(patient)
        }
        RawRecord::Generic {
            id,
            title,
            severity,
            patient,
            status,
            ..
        } => {
            let title = title.unwrap_or_else(|| event_type.style().label.to_string());
            let severity = severity.as_deref().and_then(Severity::from_tag);
            NormalizedEvent::new(id, event_type, title, start, end)
                .with_severity(severity)
                .with_patient(patient)
                .with_status(status)
        }
    };
    Ok(event.with_time_given(time_given))
}

fn parse_field(field: &'static str, raw: &str) -> Result<(NaiveDateTime, bool), NormalizeError> {
    parse_timestamp_parts(raw).ok_or_else(|| NormalizeError::InvalidTimestamp {
        field,
        value: raw.to_string(),
    })
}

/// Accepts RFC 3339 (shifted to local time), `YYYY-MM-DD[ T]HH:MM[:SS]`
/// and bare `YYYY-MM-DD`, which lands on midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    parse_timestamp_parts(raw).map(|(at, _)| at)
}

/// Like [`parse_timestamp`], also telling whether the text carried a time of day.
pub fn parse_timestamp_parts(raw: &str) -> Option<(NaiveDateTime, bool)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some((dt.with_timezone(&Local).naive_local(), true));
    }
    const FORMATS: [&str; 5] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some((dt, true));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|at| (at, false))
}

/// Calendar date of a raw timestamp, without building a full event.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_timestamp(raw).map(|dt| dt.date())
}
