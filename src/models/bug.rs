use crate::models::validation::ValidationError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant { kind: "severity", value: s.to_string() })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for Priority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant { kind: "priority", value: s.to_string() })
    }
}

/// Workflow state of a bug. Legal moves live in `rules::lifecycle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BugStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
}

impl BugStatus {
    pub const ALL: [BugStatus; 3] = [Self::Open, Self::InProgress, Self::Resolved];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in-progress",
            Self::Resolved => "resolved",
        }
    }
}

impl FromStr for BugStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant { kind: "status", value: s.to_string() })
    }
}

impl fmt::Display for BugStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator-facing workflow actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusAction {
    StartProgress,
    Resolve,
    Reopen,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub priority: Priority,
    pub status: BugStatus,
    pub reported_by: String,
    pub assigned_to: Option<String>,
    pub tags: Vec<String>,
    pub created_at: i64, // unix millis
    pub updated_at: i64, // unix millis
}

/// Candidate bug report as submitted by a client. Enumerated fields stay
/// raw strings so that bad values can be reported instead of rejected by
/// the deserializer; fields of the wrong JSON type land in `malformed`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BugPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub severity: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub reported_by: Option<String>,
    pub assigned_to: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip)]
    pub malformed: Vec<ValidationError>,
}

impl<'de> Deserialize<'de> for BugPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = JsonFields::from_deserializer(deserializer)?;
        Ok(Self {
            title: fields.string("title", "Title"),
            description: fields.string("description", "Description"),
            severity: fields.string("severity", "Severity"),
            priority: fields.string("priority", "Priority"),
            status: fields.string("status", "Status"),
            reported_by: fields.string("reportedBy", "Reporter"),
            assigned_to: fields.string("assignedTo", "Assigned to"),
            tags: fields.tags().unwrap_or_default(),
            malformed: fields.errors,
        })
    }
}

impl BugPayload {
    /// Payload describing an existing record, used as the base of a merge.
    pub fn from_record(record: &BugRecord) -> Self {
        Self {
            title: Some(record.title.clone()),
            description: Some(record.description.clone()),
            severity: Some(record.severity.as_str().to_string()),
            priority: Some(record.priority.as_str().to_string()),
            status: Some(record.status.as_str().to_string()),
            reported_by: Some(record.reported_by.clone()),
            assigned_to: record.assigned_to.clone(),
            tags: record.tags.clone(),
            malformed: Vec::new(),
        }
    }

    /// Overlay the fields present in `patch`.
    pub fn merge(mut self, patch: BugPatch) -> Self {
        if let Some(title) = patch.title {
            self.title = Some(title);
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(severity) = patch.severity {
            self.severity = Some(severity);
        }
        if let Some(priority) = patch.priority {
            self.priority = Some(priority);
        }
        if let Some(status) = patch.status {
            self.status = Some(status);
        }
        if let Some(reported_by) = patch.reported_by {
            self.reported_by = Some(reported_by);
        }
        if let Some(assigned_to) = patch.assigned_to {
            self.assigned_to = Some(assigned_to);
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        self.malformed.extend(patch.malformed);
        self
    }
}

/// Partial update. Absent fields keep their stored value; an empty
/// `assignedTo` clears the assignee.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BugPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub severity: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub reported_by: Option<String>,
    pub assigned_to: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(skip)]
    pub malformed: Vec<ValidationError>,
}

impl<'de> Deserialize<'de> for BugPatch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = JsonFields::from_deserializer(deserializer)?;
        Ok(Self {
            title: fields.string("title", "Title"),
            description: fields.string("description", "Description"),
            severity: fields.string("severity", "Severity"),
            priority: fields.string("priority", "Priority"),
            status: fields.string("status", "Status"),
            reported_by: fields.string("reportedBy", "Reporter"),
            assigned_to: fields.string("assignedTo", "Assigned to"),
            tags: fields.tags(),
            malformed: fields.errors,
        })
    }
}

/// JSON object read field by field. A field of the wrong type is recorded
/// as a validation error and treated as absent; `null` means absent.
struct JsonFields {
    map: Map<String, Value>,
    errors: Vec<ValidationError>,
}

impl JsonFields {
    fn from_deserializer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Object(map) => Ok(Self { map, errors: Vec::new() }),
            other => Err(D::Error::custom(format!("expected a JSON object, found {other}"))),
        }
    }

    fn string(&mut self, key: &str, label: &str) -> Option<String> {
        match self.map.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.errors
                    .push(ValidationError::new(key, format!("{label} must be a string")));
                None
            }
        }
    }

    fn tags(&mut self) -> Option<Vec<String>> {
        let tags = match self.map.get("tags") {
            None | Some(Value::Null) => return None,
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>(),
            Some(_) => None,
        };
        if tags.is_none() {
            self.errors
                .push(ValidationError::new("tags", "Tags must be a list of strings"));
        }
        tags
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BugFilter {
    pub status: Option<BugStatus>,
    pub severity: Option<Severity>,
    pub priority: Option<Priority>,
    pub search: Option<String>,
}

impl BugFilter {
    pub fn matches(&self, bug: &BugRecord) -> bool {
        if self.status.is_some_and(|s| s != bug.status)
            || self.severity.is_some_and(|s| s != bug.severity)
            || self.priority.is_some_and(|p| p != bug.priority)
        {
            return false;
        }

        let Some(needle) = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return true;
        };

        let needle = needle.to_lowercase();
        bug.title.to_lowercase().contains(&needle)
            || bug.description.to_lowercase().contains(&needle)
            || bug.tags.iter().any(|t| t.to_lowercase().contains(&needle))
    }
}
