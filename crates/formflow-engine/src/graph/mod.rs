//! Process graph: the immutable, validated form of a process definition.
//!
//! A `ProcessGraph` is built once from a `ProcessDefinition` (JSON or TOML
//! bytes) and then only queried. It is `Send + Sync` and meant to be shared
//! as `Arc<ProcessGraph>` by every request that uses the same definition.

pub mod definition;
pub mod node;

pub use definition::{ElementDef, ProcessDefinition, SequenceFlow, TaskDef};
pub use node::{Node, NodeKind};

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use formflow_core::config::FlowConfig;
use formflow_core::error::{FlowError, Result};

#[derive(Debug, Clone)]
pub struct ProcessGraph {
    id: String,
    name: Option<String>,
    nodes: HashMap<String, Node>,
    start_events: Vec<String>,
    end_events: Vec<String>,
    /// Targets per source, in authored flow order.
    outgoing: HashMap<String, Vec<String>>,
}

impl ProcessGraph {
    /// Parse a JSON process definition from a byte stream.
    pub fn load(reader: impl Read) -> Result<Self> {
        let definition: ProcessDefinition = serde_json::from_reader(reader)
            .map_err(|e| malformed(format!("invalid JSON definition: {}", e)))?;
        Self::from_definition(definition)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let definition: ProcessDefinition = toml::from_str(content)
            .map_err(|e| malformed(format!("invalid TOML definition: {}", e)))?;
        Self::from_definition(definition)
    }

    /// Load a definition file, choosing the format by extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&std::fs::read_to_string(path)?),
            _ => Self::load(std::fs::File::open(path)?),
        }
    }

    /// Load the definition named by `[process] definition`.
    pub fn from_config(config: &FlowConfig) -> Result<Self> {
        let path = config
            .definition_path()
            .ok_or_else(|| FlowError::Config("no process definition configured".to_string()))?;
        Self::from_path(&path)
    }

    /// Validate a definition and build the graph.
    ///
    /// Rejects duplicate ids, a missing start event, flows referencing
    /// unknown elements, flows into start events or out of end events, and
    /// elements unreachable from every start event.
    pub fn from_definition(definition: ProcessDefinition) -> Result<Self> {
        let ProcessDefinition {
            id,
            name,
            start_events,
            tasks,
            gateways,
            end_events,
            sequence_flows,
        } = definition;

        if start_events.is_empty() {
            return Err(malformed(format!("process {} has no start event", id)));
        }

        let mut nodes = HashMap::new();
        let mut order = Vec::new();
        let all = start_events
            .into_iter()
            .map(|e| Node::new(e.id, NodeKind::StartEvent).with_name(e.name))
            .chain(tasks.into_iter().map(|t| {
                Node::new(t.id, NodeKind::Task)
                    .with_name(t.name)
                    .with_task_type(t.task_type)
            }))
            .chain(
                gateways
                    .into_iter()
                    .map(|g| Node::new(g.id, NodeKind::Gateway).with_name(g.name)),
            )
            .chain(
                end_events
                    .into_iter()
                    .map(|e| Node::new(e.id, NodeKind::EndEvent).with_name(e.name)),
            );

        for node in all {
            if nodes.contains_key(&node.id) {
                return Err(malformed(format!("duplicate element id {}", node.id)));
            }
            order.push((node.id.clone(), node.kind));
            nodes.insert(node.id.clone(), node);
        }

        let mut outgoing: HashMap<String, Vec<String>> = HashMap::new();
        for flow in sequence_flows {
            let flow_name = flow.id.as_deref().unwrap_or("<unnamed>");
            let source = nodes.get(&flow.source_ref).ok_or_else(|| {
                malformed(format!(
                    "sequence flow {} references unknown source {}",
                    flow_name, flow.source_ref
                ))
            })?;
            let target = nodes.get(&flow.target_ref).ok_or_else(|| {
                malformed(format!(
                    "sequence flow {} references unknown target {}",
                    flow_name, flow.target_ref
                ))
            })?;
            if source.kind == NodeKind::EndEvent {
                return Err(malformed(format!(
                    "sequence flow {} leaves end event {}",
                    flow_name, source.id
                )));
            }
            if target.kind == NodeKind::StartEvent {
                return Err(malformed(format!(
                    "sequence flow {} enters start event {}",
                    flow_name, target.id
                )));
            }
            outgoing
                .entry(flow.source_ref)
                .or_default()
                .push(flow.target_ref);
        }

        let start_ids: Vec<String> = order
            .iter()
            .filter(|(_, kind)| *kind == NodeKind::StartEvent)
            .map(|(id, _)| id.clone())
            .collect();
        let end_ids: Vec<String> = order
            .iter()
            .filter(|(_, kind)| *kind == NodeKind::EndEvent)
            .map(|(id, _)| id.clone())
            .collect();

        let reachable = reachable_from(&start_ids, &outgoing);
        let unreachable: Vec<&str> = order
            .iter()
            .map(|(id, _)| id.as_str())
            .filter(|id| !reachable.contains(*id))
            .collect();
        if !unreachable.is_empty() {
            return Err(malformed(format!(
                "elements not reachable from any start event: {}",
                unreachable.join(", ")
            )));
        }

        debug!(
            process_id = %id,
            nodes = nodes.len(),
            start_events = start_ids.len(),
            "Process graph loaded"
        );

        Ok(Self {
            id,
            name,
            nodes,
            start_events: start_ids,
            end_events: end_ids,
            outgoing,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Start event ids in authored order.
    pub fn start_events(&self) -> &[String] {
        &self.start_events
    }

    pub fn end_events(&self) -> &[String] {
        &self.end_events
    }

    /// Targets of the flows leaving `node_id`, in authored order.
    /// Empty for unknown or terminal nodes.
    pub fn outgoing(&self, node_id: &str) -> &[String] {
        self.outgoing
            .get(node_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn is_start_event(&self, node_id: &str) -> bool {
        self.start_events.iter().any(|s| s == node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn reachable_from(
    starts: &[String],
    outgoing: &HashMap<String, Vec<String>>,
) -> HashSet<String> {
    let mut seen: HashSet<String> = starts.iter().cloned().collect();
    let mut queue: VecDeque<&str> = starts.iter().map(String::as_str).collect();
    while let Some(id) = queue.pop_front() {
        for next in outgoing.get(id).into_iter().flatten() {
            if seen.insert(next.clone()) {
                queue.push_back(next);
            }
        }
    }
    seen
}

fn malformed(message: String) -> FlowError {
    warn!(reason = %message, "Rejected process definition");
    FlowError::MalformedDefinition(message)
}
