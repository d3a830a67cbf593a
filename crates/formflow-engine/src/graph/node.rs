use serde::{Deserialize, Serialize};

/// Kind of a process element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    StartEvent,
    Task,
    Gateway,
    EndEvent,
}

/// A node in the process graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within the graph.
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub kind: NodeKind,
    /// Task type tag (only meaningful for tasks), e.g. `data`.
    #[serde(default)]
    pub task_type: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind,
            task_type: None,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_task_type(mut self, task_type: Option<String>) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn is_task(&self) -> bool {
        self.kind == NodeKind::Task
    }

    pub fn is_end_event(&self) -> bool {
        self.kind == NodeKind::EndEvent
    }
}
