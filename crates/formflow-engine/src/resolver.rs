use tracing::debug;

use formflow_core::error::{FlowError, Result};

use crate::graph::ProcessGraph;

/// Works out where a process may go next. Pure queries over the graph.
///
/// Ambiguity is never resolved by heuristic: when more than one element is
/// reachable the caller must name the target explicitly.
#[derive(Debug, Clone, Copy)]
pub struct TransitionResolver<'g> {
    graph: &'g ProcessGraph,
}

impl<'g> TransitionResolver<'g> {
    pub fn new(graph: &'g ProcessGraph) -> Self {
        Self { graph }
    }

    /// Pick the start event to use.
    pub fn resolve_start(&self, requested: Option<&str>) -> Result<String> {
        let starts = self.graph.start_events();
        match requested {
            Some(id) if self.graph.is_start_event(id) => Ok(id.to_string()),
            Some(id) => Err(FlowError::InvalidStart(id.to_string())),
            None => match starts {
                [only] => Ok(only.clone()),
                [] => Err(FlowError::MalformedDefinition(format!(
                    "process {} has no start event",
                    self.graph.id()
                ))),
                _ => Err(FlowError::AmbiguousStart(starts.to_vec())),
            },
        }
    }

    /// Pick the element to move to from `current`.
    pub fn resolve_next(&self, current: &str, requested: Option<&str>) -> Result<String> {
        if requested == Some(current) {
            return Err(FlowError::NoOpTransition(current.to_string()));
        }

        let candidates = self.graph.outgoing(current);
        debug!(current, ?candidates, ?requested, "Resolving next element");

        match (requested, candidates) {
            (_, []) => Err(FlowError::NoValidNext(current.to_string())),
            (None, [only]) => Ok(only.clone()),
            (None, _) => Err(FlowError::AmbiguousNext {
                current: current.to_string(),
                candidates: candidates.to_vec(),
            }),
            (Some(target), _) if candidates.iter().any(|c| c == target) => Ok(target.to_string()),
            (Some(target), _) => Err(FlowError::InvalidNext {
                current: current.to_string(),
                requested: target.to_string(),
            }),
        }
    }

    /// Elements reachable in one step from `current`, in authored order.
    pub fn list_next(&self, current: &str) -> Vec<String> {
        self.graph.outgoing(current).to_vec()
    }
}
