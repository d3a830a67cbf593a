use serde::{Deserialize, Serialize};

/// Serialized process definition, BPMN-shaped.
///
/// ```json
/// {
///   "id": "form-process",
///   "start_events": [{ "id": "StartEvent_1" }],
///   "tasks": [{ "id": "Task_1", "task_type": "data" }],
///   "end_events": [{ "id": "EndEvent_1" }],
///   "sequence_flows": [
///     { "id": "Flow_1", "source_ref": "StartEvent_1", "target_ref": "Task_1" },
///     { "id": "Flow_2", "source_ref": "Task_1", "target_ref": "EndEvent_1" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start_events: Vec<ElementDef>,
    #[serde(default)]
    pub tasks: Vec<TaskDef>,
    #[serde(default)]
    pub gateways: Vec<ElementDef>,
    #[serde(default)]
    pub end_events: Vec<ElementDef>,
    /// Outgoing order per source is the authored order of this list.
    #[serde(default)]
    pub sequence_flows: Vec<SequenceFlow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub task_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceFlow {
    #[serde(default)]
    pub id: Option<String>,
    pub source_ref: String,
    pub target_ref: String,
}

impl ProcessDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn start_event(mut self, id: impl Into<String>) -> Self {
        self.start_events.push(ElementDef {
            id: id.into(),
            name: None,
        });
        self
    }

    /// Add a task tagged with the `data` task type.
    pub fn data_task(self, id: impl Into<String>) -> Self {
        self.task(id, Some("data"))
    }

    pub fn task(mut self, id: impl Into<String>, task_type: Option<&str>) -> Self {
        self.tasks.push(TaskDef {
            id: id.into(),
            name: None,
            task_type: task_type.map(str::to_string),
        });
        self
    }

    pub fn gateway(mut self, id: impl Into<String>) -> Self {
        self.gateways.push(ElementDef {
            id: id.into(),
            name: None,
        });
        self
    }

    pub fn end_event(mut self, id: impl Into<String>) -> Self {
        self.end_events.push(ElementDef {
            id: id.into(),
            name: None,
        });
        self
    }

    pub fn flow(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        let id = format!("Flow_{}", self.sequence_flows.len() + 1);
        self.sequence_flows.push(SequenceFlow {
            id: Some(id),
            source_ref: from.into(),
            target_ref: to.into(),
        });
        self
    }
}
