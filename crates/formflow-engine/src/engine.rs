use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use formflow_core::error::{FlowError, Result};
use formflow_core::security::Decision;
use formflow_core::types::{
    CurrentTask, EventType, Instance, InstanceEvent, ProcessInfo, ProcessPhase, ProcessState,
    Subject,
};

use crate::gate::TaskGate;
use crate::graph::{NodeKind, ProcessGraph};
use crate::resolver::TransitionResolver;

/// Hard cap on automatic steps taken by `run_to_completion`.
pub const MAX_ITERATIONS: usize = 1000;

/// Result of a successful engine operation: the new process state and the
/// events emitted while producing it, in emission order.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: ProcessState,
    pub events: Vec<InstanceEvent>,
}

/// Outcome of `run_to_completion`: every step that succeeded, and the
/// error that ended the run early, if any.
#[derive(Debug)]
pub struct Completion {
    /// State after the last successful step, with the events of all
    /// successful steps in emission order.
    pub progress: Transition,
    pub stopped: Option<FlowError>,
}

impl Completion {
    pub fn made_progress(&self) -> bool {
        !self.progress.events.is_empty()
    }

    /// The progress if the run reached an end event, else the stopping error.
    pub fn into_result(self) -> Result<Transition> {
        match self.stopped {
            Some(e) => Err(e),
            None => Ok(self.progress),
        }
    }
}

/// ProcessEngine drives an instance's process state through the graph.
///
/// The engine never mutates the instance it is given. Every operation works
/// on a copy and either returns the complete new state or an error, so a
/// failed step leaves the caller's snapshot untouched. Persisting the
/// returned state is the caller's job.
pub struct ProcessEngine {
    graph: Arc<ProcessGraph>,
    gate: TaskGate,
}

impl ProcessEngine {
    pub fn new(graph: Arc<ProcessGraph>, gate: TaskGate) -> Self {
        Self { graph, gate }
    }

    pub fn graph(&self) -> &ProcessGraph {
        &self.graph
    }

    fn resolver(&self) -> TransitionResolver<'_> {
        TransitionResolver::new(&self.graph)
    }

    /// Elements the instance may move to next.
    ///
    /// Before the process has started these are the graph's start events.
    pub fn list_next(&self, instance: &Instance) -> Result<Vec<String>> {
        match &instance.process {
            None => Ok(self.graph.start_events().to_vec()),
            Some(state) if state.is_ended() => Err(FlowError::AlreadyEnded),
            Some(state) => Ok(self.resolver().list_next(position(state)?)),
        }
    }

    /// Start the process and advance out of the start event.
    pub async fn start(
        &self,
        instance: &Instance,
        start_event: Option<&str>,
        actor: Option<&Subject>,
    ) -> Result<Transition> {
        if instance.process.is_some() {
            return Err(FlowError::AlreadyStarted);
        }

        let start_id = self.resolver().resolve_start(start_event)?;
        let mut state = ProcessState {
            started: Some(Utc::now()),
            start_event: Some(start_id.clone()),
            ..Default::default()
        };
        let mut events = vec![InstanceEvent::new(
            instance.id.clone(),
            EventType::StartEvent,
            snapshot(&state),
            performed_by(actor),
        )];

        let first = self.resolver().resolve_next(&start_id, None)?;
        self.apply(instance, &mut state, &first, actor, &mut events)?;

        info!(
            instance_id = %instance.id,
            start_event = %start_id,
            to = %first,
            "Process started"
        );
        Ok(Transition { state, events })
    }

    /// Advance one step from the current task.
    ///
    /// `decision` is the policy decision for closing the current task; it is
    /// obtained by the caller and checked before any resolution or gate work.
    pub async fn next(
        &self,
        instance: &Instance,
        requested: Option<&str>,
        decision: Decision,
        actor: Option<&Subject>,
    ) -> Result<Transition> {
        let state = running_state(instance)?;

        if let Some(target) = requested {
            if !self.graph.contains(target) {
                return Err(FlowError::UnknownElement(target.to_string()));
            }
        }

        if !decision.is_allowed() {
            return Err(FlowError::Forbidden);
        }

        let current = state
            .current_task
            .as_ref()
            .ok_or(FlowError::NoCurrentTask)?;

        self.step(instance, &current.element_id, requested, actor)
            .await
    }

    /// Keep taking unambiguous steps until an end event is reached.
    ///
    /// Each successful step is kept. The run stops at the first gate
    /// refusal, branching point or other step error, or with
    /// `IterationLimitExceeded` once `MAX_ITERATIONS` steps have been taken
    /// without ending; the step that would exceed the cap is never
    /// attempted. Precondition failures (`NotStarted`, `AlreadyEnded`,
    /// `Forbidden`) are returned as errors before any step runs.
    pub async fn run_to_completion(
        &self,
        instance: &Instance,
        decision: Decision,
        actor: Option<&Subject>,
    ) -> Result<Completion> {
        let initial = running_state(instance)?.clone();
        if !decision.is_allowed() {
            return Err(FlowError::Forbidden);
        }

        let mut working = instance.clone();
        let mut state = initial;
        let mut events = Vec::new();
        let mut stopped = None;

        for _ in 0..MAX_ITERATIONS {
            if state.is_ended() {
                break;
            }

            match self.advance(&working, &state, actor).await {
                Ok(step) => {
                    state = step.state;
                    working.process = Some(state.clone());
                    events.extend(step.events);
                }
                Err(e) => {
                    stopped = Some(e);
                    break;
                }
            }
        }

        if stopped.is_none() && !state.is_ended() {
            error!(
                instance_id = %instance.id,
                process_id = %self.graph.id(),
                limit = MAX_ITERATIONS,
                "Iteration limit reached, possible loop in process definition"
            );
            stopped = Some(FlowError::IterationLimitExceeded(MAX_ITERATIONS));
        }

        Ok(Completion {
            progress: Transition { state, events },
            stopped,
        })
    }

    /// One automatic step from where `state` sits. Never guesses a branch.
    async fn advance(
        &self,
        working: &Instance,
        state: &ProcessState,
        actor: Option<&Subject>,
    ) -> Result<Transition> {
        let from = position(state)?;
        let candidates = self.resolver().list_next(from);
        if candidates.len() > 1 {
            return Err(FlowError::AmbiguousNext {
                current: from.to_string(),
                candidates,
            });
        }
        self.step(working, from, None, actor).await
    }

    /// Resolve, gate and apply a single transition out of `from`.
    async fn step(
        &self,
        instance: &Instance,
        from: &str,
        requested: Option<&str>,
        actor: Option<&Subject>,
    ) -> Result<Transition> {
        let to = self.resolver().resolve_next(from, requested)?;

        let mut state = running_state(instance)?.clone();
        // Only tasks are gated; start events and gateways are passed through.
        let closing_task = state.current_task.is_some()
            && self.graph.node(from).is_some_and(|n| n.is_task());
        if closing_task && !self.gate.can_close(from, instance).await? {
            return Err(FlowError::TaskNotCloseable(from.to_string()));
        }

        let mut events = Vec::new();
        self.apply(instance, &mut state, &to, actor, &mut events)?;

        info!(instance_id = %instance.id, from, to = %to, "Process advanced");
        Ok(Transition { state, events })
    }

    /// Move `state` onto `to`, recording the events this produces.
    fn apply(
        &self,
        instance: &Instance,
        state: &mut ProcessState,
        to: &str,
        actor: Option<&Subject>,
        events: &mut Vec<InstanceEvent>,
    ) -> Result<()> {
        let node = self
            .graph
            .node(to)
            .ok_or_else(|| FlowError::UnknownElement(to.to_string()))?;

        let flow = match state.current_task.take() {
            Some(previous) => {
                if self.graph.node(&previous.element_id).is_some_and(|n| n.is_task()) {
                    let info = ProcessInfo {
                        current_task: Some(previous.element_id.clone()),
                        ..snapshot(state)
                    };
                    events.push(InstanceEvent::new(
                        instance.id.clone(),
                        EventType::EndTask,
                        info,
                        performed_by(actor),
                    ));
                }
                previous.flow + 1
            }
            None => 1,
        };

        match node.kind {
            NodeKind::Task | NodeKind::Gateway => {
                state.current_task = Some(CurrentTask {
                    flow,
                    element_id: node.id.clone(),
                    name: node.name.clone(),
                    task_type: node.task_type.clone(),
                    started: Utc::now(),
                    validated: None,
                });
                if node.is_task() {
                    events.push(InstanceEvent::new(
                        instance.id.clone(),
                        EventType::StartTask,
                        snapshot(state),
                        performed_by(actor),
                    ));
                }
            }
            NodeKind::EndEvent => {
                state.ended = Some(Utc::now());
                state.end_event = Some(node.id.clone());
                events.push(InstanceEvent::new(
                    instance.id.clone(),
                    EventType::EndEvent,
                    snapshot(state),
                    performed_by(actor),
                ));
            }
            NodeKind::StartEvent => {
                return Err(FlowError::MalformedDefinition(format!(
                    "sequence flow enters start event {}",
                    node.id
                )));
            }
        }
        Ok(())
    }
}

/// The started, not yet ended, process state of `instance`.
fn running_state(instance: &Instance) -> Result<&ProcessState> {
    match (instance.phase(), &instance.process) {
        (ProcessPhase::Running, Some(state)) => Ok(state),
        (ProcessPhase::Ended, _) => Err(FlowError::AlreadyEnded),
        _ => Err(FlowError::NotStarted),
    }
}

/// Where a running process currently sits: its current task, or the start
/// event if it was started but never advanced.
fn position(state: &ProcessState) -> Result<&str> {
    match (&state.current_task, &state.start_event) {
        (Some(task), _) => Ok(task.element_id.as_str()),
        (None, Some(start)) => Ok(start.as_str()),
        (None, None) => Err(FlowError::NoCurrentTask),
    }
}

fn snapshot(state: &ProcessState) -> ProcessInfo {
    ProcessInfo {
        start_event: state.start_event.clone(),
        current_task: state.current_element().map(str::to_string),
        end_event: state.end_event.clone(),
    }
}

fn performed_by(actor: Option<&Subject>) -> Option<String> {
    actor.map(|s| s.user_id.clone())
}
