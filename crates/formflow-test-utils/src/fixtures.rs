//! Process definitions in their JSON form, for `ProcessGraph::load`.

/// `Start -> Task_1 (data) -> End`
pub const LINEAR: &str = r#"{
  "id": "linear",
  "start_events": [{ "id": "StartEvent_1" }],
  "tasks": [{ "id": "Task_1", "name": "Fill in form", "task_type": "data" }],
  "end_events": [{ "id": "EndEvent_1" }],
  "sequence_flows": [
    { "id": "Flow_1", "source_ref": "StartEvent_1", "target_ref": "Task_1" },
    { "id": "Flow_2", "source_ref": "Task_1", "target_ref": "EndEvent_1" }
  ]
}"#;

/// `Start -> Task_1 (confirmation) -> Task_2 (data) -> End`
pub const SEQUENTIAL: &str = r#"{
  "id": "sequential",
  "start_events": [{ "id": "StartEvent_1" }],
  "tasks": [
    { "id": "Task_1", "task_type": "confirmation" },
    { "id": "Task_2", "task_type": "data" }
  ],
  "end_events": [{ "id": "EndEvent_1" }],
  "sequence_flows": [
    { "id": "Flow_1", "source_ref": "StartEvent_1", "target_ref": "Task_1" },
    { "id": "Flow_2", "source_ref": "Task_1", "target_ref": "Task_2" },
    { "id": "Flow_3", "source_ref": "Task_2", "target_ref": "EndEvent_1" }
  ]
}"#;

/// `Task_1` forks to `Task_2` or straight to the end.
pub const BRANCHING: &str = r#"{
  "id": "branching",
  "start_events": [{ "id": "StartEvent_1" }],
  "tasks": [
    { "id": "Task_1", "task_type": "data" },
    { "id": "Task_2", "task_type": "confirmation" }
  ],
  "end_events": [{ "id": "EndEvent_1" }],
  "sequence_flows": [
    { "id": "Flow_1", "source_ref": "StartEvent_1", "target_ref": "Task_1" },
    { "id": "Flow_2", "source_ref": "Task_1", "target_ref": "Task_2" },
    { "id": "Flow_3", "source_ref": "Task_1", "target_ref": "EndEvent_1" },
    { "id": "Flow_4", "source_ref": "Task_2", "target_ref": "EndEvent_1" }
  ]
}"#;

/// Two tasks handing back and forth with no way out.
pub const CYCLIC: &str = r#"{
  "id": "cyclic",
  "start_events": [{ "id": "StartEvent_1" }],
  "tasks": [
    { "id": "Review", "task_type": "data" },
    { "id": "Revise", "task_type": "data" }
  ],
  "sequence_flows": [
    { "id": "Flow_1", "source_ref": "StartEvent_1", "target_ref": "Review" },
    { "id": "Flow_2", "source_ref": "Review", "target_ref": "Revise" },
    { "id": "Flow_3", "source_ref": "Revise", "target_ref": "Review" }
  ]
}"#;

/// Two start events leading to different tasks.
pub const TWO_STARTS: &str = r#"{
  "id": "two-starts",
  "start_events": [{ "id": "Start_Web" }, { "id": "Start_Api" }],
  "tasks": [
    { "id": "Task_Web", "task_type": "data" },
    { "id": "Task_Api", "task_type": "data" }
  ],
  "end_events": [{ "id": "EndEvent_1" }],
  "sequence_flows": [
    { "source_ref": "Start_Web", "target_ref": "Task_Web" },
    { "source_ref": "Start_Api", "target_ref": "Task_Api" },
    { "source_ref": "Task_Web", "target_ref": "EndEvent_1" },
    { "source_ref": "Task_Api", "target_ref": "EndEvent_1" }
  ]
}"#;
