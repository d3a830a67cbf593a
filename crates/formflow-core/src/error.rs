use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    // Request conflicts
    #[error("Process is already started. Use next.")]
    AlreadyStarted,

    #[error("Process is not started. Use start!")]
    NotStarted,

    #[error("Process is ended. It cannot be advanced or restarted.")]
    AlreadyEnded,

    #[error("Requested element id {0} is not found in process definition")]
    UnknownElement(String),

    #[error("Requested process element {0} is same as instance's current task. Cannot change process.")]
    NoOpTransition(String),

    #[error("Process has more than one start event, one must be chosen among {0:?}")]
    AmbiguousStart(Vec<String>),

    #[error("Requested start event {0} is not a start event of the process")]
    InvalidStart(String),

    #[error("Multiple outgoing sequence flows from {current}, one must be chosen among {candidates:?}")]
    AmbiguousNext {
        current: String,
        candidates: Vec<String>,
    },

    #[error("Element {requested} cannot be reached from {current}")]
    InvalidNext { current: String, requested: String },

    #[error("No process element can be reached from {0}")]
    NoValidNext(String),

    #[error("Instance does not have current task information")]
    NoCurrentTask,

    #[error("Cannot complete/close current task {0}. The data element(s) assigned to the task are not valid")]
    TaskNotCloseable(String),

    #[error("Not authorized to advance the process")]
    Forbidden,

    // Definition errors
    #[error("Malformed process definition: {0}")]
    MalformedDefinition(String),

    // Internal errors
    #[error("More than {0} iterations detected in process. Possible loop in process definition")]
    IterationLimitExceeded(usize),

    #[error("External hook failed: {0}")]
    ExternalHookFailure(String),

    // Collaborator errors
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Instance {id} was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict { id: String, expected: u64, found: u64 },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Hook failed: {hook}: {message}")]
    Hook { hook: String, message: String },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// How an error should be surfaced to whoever called the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Recoverable request conflict, reported verbatim.
    Conflict,
    /// The process definition itself is broken.
    Definition,
    NotFound,
    /// Bug or runaway definition; surfaced as a generic server error.
    Internal,
}

impl FlowError {
    pub fn class(&self) -> ErrorClass {
        match self {
            FlowError::AlreadyStarted
            | FlowError::NotStarted
            | FlowError::AlreadyEnded
            | FlowError::UnknownElement(_)
            | FlowError::NoOpTransition(_)
            | FlowError::AmbiguousStart(_)
            | FlowError::InvalidStart(_)
            | FlowError::AmbiguousNext { .. }
            | FlowError::InvalidNext { .. }
            | FlowError::NoValidNext(_)
            | FlowError::NoCurrentTask
            | FlowError::TaskNotCloseable(_)
            | FlowError::Forbidden
            | FlowError::VersionConflict { .. } => ErrorClass::Conflict,
            FlowError::MalformedDefinition(_) => ErrorClass::Definition,
            FlowError::InstanceNotFound(_) => ErrorClass::NotFound,
            FlowError::IterationLimitExceeded(_)
            | FlowError::ExternalHookFailure(_)
            | FlowError::Store(_)
            | FlowError::Validation(_)
            | FlowError::Hook { .. }
            | FlowError::Config(_)
            | FlowError::ConfigNotFound(_)
            | FlowError::Io(_)
            | FlowError::Json(_) => ErrorClass::Internal,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.class() == ErrorClass::Internal
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
