use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique instance identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_str(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The authenticated party asking for a process change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub user_id: String,
    #[serde(default)]
    pub party_id: Option<i64>,
    #[serde(default)]
    pub authentication_level: u8,
}

impl Subject {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            party_id: None,
            authentication_level: 0,
        }
    }
}

/// A single case whose lifecycle is tracked by a `ProcessState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    /// `org/app` the instance belongs to.
    pub app_id: String,
    #[serde(default)]
    pub instance_owner_party_id: Option<i64>,
    /// Persisted revision, used by stores for optimistic concurrency.
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub process: Option<ProcessState>,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub last_changed: Option<DateTime<Utc>>,
}

impl Instance {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            id: InstanceId::new(),
            app_id: app_id.into(),
            instance_owner_party_id: None,
            version: 0,
            process: None,
            created: Utc::now(),
            last_changed: None,
        }
    }

    pub fn with_id(mut self, id: InstanceId) -> Self {
        self.id = id;
        self
    }

    pub fn phase(&self) -> ProcessPhase {
        match &self.process {
            None => ProcessPhase::NotStarted,
            Some(state) if state.is_ended() => ProcessPhase::Ended,
            Some(_) => ProcessPhase::Running,
        }
    }
}

/// Coarse lifecycle of an instance's process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessPhase {
    NotStarted,
    Running,
    Ended,
}

/// Process state attached to an instance.
///
/// `current_task` is `None` both before the first transition out of the
/// start event and after an end event has been reached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessState {
    #[serde(default)]
    pub started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub start_event: Option<String>,
    #[serde(default)]
    pub current_task: Option<CurrentTask>,
    #[serde(default)]
    pub ended: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_event: Option<String>,
}

impl ProcessState {
    pub fn is_ended(&self) -> bool {
        self.ended.is_some()
    }

    pub fn current_element(&self) -> Option<&str> {
        self.current_task.as_ref().map(|t| t.element_id.as_str())
    }
}

/// The process element an instance is currently parked on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentTask {
    /// 1-based count of transitions taken to reach this element.
    pub flow: u32,
    pub element_id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Task type tag, e.g. `data`.
    #[serde(default)]
    pub task_type: Option<String>,
    pub started: DateTime<Utc>,
    /// Outcome of the last data validation for this task. The engine only
    /// reads it: the validation collaborator records it on the stored
    /// instance when it validates, and a task already marked completable
    /// is closed without being validated again.
    #[serde(default)]
    pub validated: Option<Validated>,
}

impl CurrentTask {
    /// Whether completion criteria were already recorded as satisfied.
    pub fn can_complete(&self) -> bool {
        self.validated
            .as_ref()
            .is_some_and(|v| v.can_complete_task)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validated {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub can_complete_task: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Informational,
    Fixed,
}

/// A single problem reported by data validation for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub severity: Severity,
    #[serde(default)]
    pub code: Option<String>,
    pub description: String,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub data_element_id: Option<String>,
}

impl ValidationIssue {
    pub fn error(description: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: None,
            description: description.into(),
            field: None,
            data_element_id: None,
        }
    }

    pub fn warning(description: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(description)
        }
    }
}

/// Lifecycle notification kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "process:StartEvent")]
    StartEvent,
    #[serde(rename = "process:StartTask")]
    StartTask,
    #[serde(rename = "process:EndTask")]
    EndTask,
    #[serde(rename = "process:EndEvent")]
    EndEvent,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::StartEvent => "process:StartEvent",
            EventType::StartTask => "process:StartTask",
            EventType::EndTask => "process:EndTask",
            EventType::EndEvent => "process:EndEvent",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Element ids relevant to a transition, captured when it happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    #[serde(default)]
    pub start_event: Option<String>,
    #[serde(default)]
    pub current_task: Option<String>,
    #[serde(default)]
    pub end_event: Option<String>,
}

/// A lifecycle event produced by a single transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceEvent {
    pub id: String,
    pub instance_id: InstanceId,
    pub event_type: EventType,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub performed_by: Option<String>,
    pub process_info: ProcessInfo,
}

impl InstanceEvent {
    pub fn new(
        instance_id: InstanceId,
        event_type: EventType,
        process_info: ProcessInfo,
        performed_by: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            instance_id,
            event_type,
            created: Utc::now(),
            performed_by,
            process_info,
        }
    }

    /// The element this event is about.
    pub fn element_id(&self) -> Option<&str> {
        let id = match self.event_type {
            EventType::StartEvent => &self.process_info.start_event,
            EventType::StartTask | EventType::EndTask => &self.process_info.current_task,
            EventType::EndEvent => &self.process_info.end_event,
        };
        id.as_deref()
    }
}
