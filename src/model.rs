use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

pub type EventId = String;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    Appointment,
    Consultation,
    InfoAlert,
    WarningAlert,
    UrgentAlert,
    PrenatalExam,
    PregnancyMilestone,
    ReEducation,
    PostpartumFollowUp,
    GynecoFollowUp,
    DueDateMarker,
    /// A type tag this build does not know about yet.
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRef {
    pub id: String,
    pub name: String,
}

/// Presentation hints attached to every event of a given type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeStyle {
    pub color: &'static str,
    pub icon: &'static str,
    pub label: &'static str,
}

pub const DEFAULT_STYLE: TypeStyle = TypeStyle {
    color: "#64748b",
    icon: "calendar",
    label: "Event",
};

static KNOWN_TYPES: [EventType; 11] = [
    EventType::Appointment,
    EventType::Consultation,
    EventType::InfoAlert,
    EventType::WarningAlert,
    EventType::UrgentAlert,
    EventType::PrenatalExam,
    EventType::PregnancyMilestone,
    EventType::ReEducation,
    EventType::PostpartumFollowUp,
    EventType::GynecoFollowUp,
    EventType::DueDateMarker,
];

impl EventType {
    pub fn known() -> &'static [EventType] {
        &KNOWN_TYPES
    }

    /// Parses a kebab-case tag. Unrecognised tags become `Other`.
    pub fn from_tag(tag: &str) -> EventType {
        let tag = tag.trim().to_ascii_lowercase();
        KNOWN_TYPES
            .iter()
            .find(|t| t.tag() == tag)
            .cloned()
            .unwrap_or(EventType::Other(tag))
    }

    pub fn tag(&self) -> &str {
        match self {
            EventType::Appointment => "appointment",
            EventType::Consultation => "consultation",
            EventType::InfoAlert => "info-alert",
            EventType::WarningAlert => "warning-alert",
            EventType::UrgentAlert => "urgent-alert",
            EventType::PrenatalExam => "prenatal-exam",
            EventType::PregnancyMilestone => "pregnancy-milestone",
            EventType::ReEducation => "re-education",
            EventType::PostpartumFollowUp => "postpartum-follow-up",
            EventType::GynecoFollowUp => "gyneco-follow-up",
            EventType::DueDateMarker => "due-date-marker",
            EventType::Other(tag) => tag,
        }
    }

    pub fn is_alert(&self) -> bool {
        matches!(
            self,
            EventType::InfoAlert | EventType::WarningAlert | EventType::UrgentAlert
        )
    }

    /// Severity implied by the alert type itself.
    pub fn alert_severity(&self) -> Option<Severity> {
        match self {
            EventType::InfoAlert => Some(Severity::Info),
            EventType::WarningAlert => Some(Severity::Warning),
            EventType::UrgentAlert => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn style(&self) -> TypeStyle {
        let (color, icon, label) = match self {
            EventType::Appointment => ("#3b82f6", "calendar-clock", "Appointment"),
            EventType::Consultation => ("#6366f1", "stethoscope", "Consultation"),
            EventType::InfoAlert => ("#0ea5e9", "info", "Information"),
            EventType::WarningAlert => ("#f59e0b", "alert-triangle", "Warning"),
            EventType::UrgentAlert => ("#ef4444", "alert-octagon", "Urgent"),
            EventType::PrenatalExam => ("#ec4899", "clipboard-check", "Prenatal exam"),
            EventType::PregnancyMilestone => ("#a855f7", "flag", "Pregnancy milestone"),
            EventType::ReEducation => ("#14b8a6", "activity", "Re-education"),
            EventType::PostpartumFollowUp => ("#f472b6", "baby", "Postpartum follow-up"),
            EventType::GynecoFollowUp => ("#8b5cf6", "heart-pulse", "Gynecological follow-up"),
            EventType::DueDateMarker => ("#22c55e", "star", "Due date"),
            EventType::Other(_) => return DEFAULT_STYLE,
        };
        TypeStyle { color, icon, label }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Severity {
    pub fn from_tag(tag: &str) -> Option<Severity> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "info" => Some(Severity::Info),
            "warning" => Some(Severity::Warning),
            "critical" | "urgent" => Some(Severity::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub id: EventId,
    pub event_type: EventType,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    /// The source gave a time of day, so a midnight start is a real
    /// midnight rather than a bare date.
    pub time_given: bool,
    pub severity: Option<Severity>,
    pub patient: Option<PatientRef>,
    pub color: String,
    pub icon: String,
    pub label: String,
    pub status: Option<String>,
}

impl NormalizedEvent {
    /// Builds an event with its type's style applied. Severity is only kept
    /// for alert types; for those it falls back to the type's own severity.
    pub fn new(
        id: impl Into<EventId>,
        event_type: EventType,
        title: impl Into<String>,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
    ) -> Self {
        let style = event_type.style();
        let severity = event_type.alert_severity();
        NormalizedEvent {
            id: id.into(),
            title: title.into(),
            start,
            end,
            time_given: false,
            severity,
            patient: None,
            color: style.color.to_string(),
            icon: style.icon.to_string(),
            label: style.label.to_string(),
            status: None,
            event_type,
        }
    }

    pub fn with_severity(mut self, severity: Option<Severity>) -> Self {
        if self.event_type.is_alert() {
            self.severity = severity.or_else(|| self.event_type.alert_severity());
        }
        self
    }

    pub fn with_patient(mut self, patient: Option<PatientRef>) -> Self {
        self.patient = patient;
        self
    }

    pub fn with_status(mut self, status: Option<String>) -> Self {
        self.status = status;
        self
    }

    pub fn with_time_given(mut self, time_given: bool) -> Self {
        self.time_given = time_given;
        self
    }

    pub fn is_all_day(&self) -> bool {
        all_day(self.start, self.end, self.time_given)
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }
}

/// An event carries no time of day when it starts at midnight, has no end and
/// its source did not spell out a time.
pub fn all_day(start: NaiveDateTime, end: Option<NaiveDateTime>, time_given: bool) -> bool {
    end.is_none()
        && !time_given
        && start.num_seconds_from_midnight() == 0
        && start.nanosecond() == 0
}

impl Serialize for NormalizedEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("NormalizedEvent", 12)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("event_type", &self.event_type)?;
        s.serialize_field("title", &self.title)?;
        s.serialize_field("start", &self.start)?;
        s.serialize_field("end", &self.end)?;
        s.serialize_field("is_all_day", &self.is_all_day())?;
        s.serialize_field("severity", &self.severity)?;
        s.serialize_field("patient", &self.patient)?;
        s.serialize_field("color", &self.color)?;
        s.serialize_field("icon", &self.icon)?;
        s.serialize_field("label", &self.label)?;
        s.serialize_field("status", &self.status)?;
        s.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutEvent {
    pub event: NormalizedEvent,
    pub column: usize,
    pub total_columns: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DayLayout {
    pub all_day: Vec<NormalizedEvent>,
    pub timed: Vec<LayoutEvent>,
}
