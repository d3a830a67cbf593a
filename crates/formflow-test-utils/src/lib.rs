//! In-memory fakes for the engine's collaborators, plus graph fixtures.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;

use formflow_core::error::{FlowError, Result};
use formflow_core::security::{AuthorizationRequest, Decision};
use formflow_core::traits::{AppHooks, DecisionPoint, InstanceStore, Validator};
use formflow_core::types::{EventType, Instance, InstanceId, Severity, ValidationIssue};

pub mod fixtures;

/// Instance store backed by a `HashMap`, with the same version semantics
/// as the SQLite store.
#[derive(Default)]
pub struct MemoryStore {
    instances: Mutex<HashMap<InstanceId, Instance>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, instance: Instance) {
        self.instances
            .lock()
            .unwrap()
            .insert(instance.id.clone(), instance);
    }

    pub fn get(&self, id: &InstanceId) -> Option<Instance> {
        self.instances.lock().unwrap().get(id).cloned()
    }
}

impl InstanceStore for MemoryStore {
    fn get_instance(&self, id: &InstanceId) -> BoxFuture<'_, Result<Instance>> {
        let found = self
            .get(id)
            .ok_or_else(|| FlowError::InstanceNotFound(id.to_string()));
        Box::pin(async move { found })
    }

    fn update_instance(&self, mut instance: Instance) -> BoxFuture<'_, Result<Instance>> {
        let result = {
            let mut instances = self.instances.lock().unwrap();
            match instances.get(&instance.id) {
                None => Err(FlowError::InstanceNotFound(instance.id.to_string())),
                Some(stored) if stored.version != instance.version => {
                    Err(FlowError::VersionConflict {
                        id: instance.id.to_string(),
                        expected: instance.version,
                        found: stored.version,
                    })
                }
                Some(_) => {
                    instance.version += 1;
                    instances.insert(instance.id.clone(), instance.clone());
                    Ok(instance)
                }
            }
        };
        Box::pin(async move { result })
    }
}

/// Validator that reports fixed issues, optionally for a single task, or
/// always fails.
pub struct StaticValidator {
    issues: Vec<ValidationIssue>,
    only_task: Option<String>,
    failing: bool,
    calls: AtomicUsize,
}

impl StaticValidator {
    pub fn clean() -> Self {
        Self::with_issues(Vec::new())
    }

    pub fn with_issues(issues: Vec<ValidationIssue>) -> Self {
        Self {
            issues,
            only_task: None,
            failing: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Report `issues` for `task_id` only; every other task is clean.
    pub fn with_issues_for(task_id: &str, issues: Vec<ValidationIssue>) -> Self {
        Self {
            only_task: Some(task_id.to_string()),
            ..Self::with_issues(issues)
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::clean()
        }
    }

    /// How many times `validate_task` ran.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Validator for StaticValidator {
    fn validate_task<'a>(
        &'a self,
        _instance: &'a Instance,
        task_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ValidationIssue>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if self.failing {
                Err(FlowError::Validation(format!(
                    "validation service unavailable for {}",
                    task_id
                )))
            } else if self.only_task.as_deref().is_some_and(|t| t != task_id) {
                Ok(Vec::new())
            } else {
                Ok(self.issues.clone())
            }
        })
    }
}

/// Decision point with a fixed answer that records every request.
pub struct FixedDecision {
    decision: Decision,
    requests: Mutex<Vec<AuthorizationRequest>>,
}

impl FixedDecision {
    pub fn allow() -> Self {
        Self::new(Decision::Allow)
    }

    pub fn deny() -> Self {
        Self::new(Decision::Deny)
    }

    fn new(decision: Decision) -> Self {
        Self {
            decision,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<AuthorizationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl DecisionPoint for FixedDecision {
    fn decide<'a>(&'a self, request: &'a AuthorizationRequest) -> BoxFuture<'a, Result<Decision>> {
        self.requests.lock().unwrap().push(request.clone());
        let decision = self.decision;
        Box::pin(async move { Ok(decision) })
    }
}

/// Hooks that record every call and fail on demand.
#[derive(Default)]
pub struct RecordingHooks {
    veto: bool,
    can_end_failure: Option<bool>,
    failing_on: HashSet<EventType>,
    lifecycle: Mutex<Vec<(EventType, String)>>,
    can_end: Mutex<Vec<(String, usize)>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every `can_end_task`, whatever the issues.
    pub fn veto_tasks(mut self) -> Self {
        self.veto = true;
        self
    }

    /// Make `can_end_task` error. `fatal` selects `ExternalHookFailure`
    /// over an ordinary hook error.
    pub fn failing_can_end(mut self, fatal: bool) -> Self {
        self.can_end_failure = Some(fatal);
        self
    }

    /// Make the lifecycle hook for `event_type` error.
    pub fn failing_on(mut self, event_type: EventType) -> Self {
        self.failing_on.insert(event_type);
        self
    }

    pub fn lifecycle_calls(&self) -> Vec<(EventType, String)> {
        self.lifecycle.lock().unwrap().clone()
    }

    /// `(task_id, issue count)` per `can_end_task` call.
    pub fn can_end_calls(&self) -> Vec<(String, usize)> {
        self.can_end.lock().unwrap().clone()
    }

    fn record(&self, event_type: EventType, element_id: &str) -> BoxFuture<'static, Result<()>> {
        self.lifecycle
            .lock()
            .unwrap()
            .push((event_type, element_id.to_string()));
        let result = if self.failing_on.contains(&event_type) {
            Err(FlowError::Hook {
                hook: event_type.to_string(),
                message: format!("hook failed for {}", element_id),
            })
        } else {
            Ok(())
        };
        Box::pin(async move { result })
    }
}

impl AppHooks for RecordingHooks {
    fn on_start_process<'a>(
        &'a self,
        start_event: &'a str,
        _instance: &'a Instance,
    ) -> BoxFuture<'a, Result<()>> {
        self.record(EventType::StartEvent, start_event)
    }

    fn on_start_task<'a>(&'a self, task_id: &'a str, _instance: &'a Instance) -> BoxFuture<'a, Result<()>> {
        self.record(EventType::StartTask, task_id)
    }

    fn on_end_task<'a>(&'a self, task_id: &'a str, _instance: &'a Instance) -> BoxFuture<'a, Result<()>> {
        self.record(EventType::EndTask, task_id)
    }

    fn on_end_process<'a>(
        &'a self,
        end_event: &'a str,
        _instance: &'a Instance,
    ) -> BoxFuture<'a, Result<()>> {
        self.record(EventType::EndEvent, end_event)
    }

    fn can_end_task<'a>(
        &'a self,
        task_id: &'a str,
        _instance: &'a Instance,
        issues: &'a [ValidationIssue],
    ) -> BoxFuture<'a, Result<bool>> {
        self.can_end
            .lock()
            .unwrap()
            .push((task_id.to_string(), issues.len()));

        let result = match self.can_end_failure {
            Some(true) => Err(FlowError::ExternalHookFailure(format!(
                "can_end_task crashed for {}",
                task_id
            ))),
            Some(false) => Err(FlowError::Hook {
                hook: "can_end_task".to_string(),
                message: format!("could not evaluate {}", task_id),
            }),
            None if self.veto => Ok(false),
            None => Ok(!issues.iter().any(|i| i.severity == Severity::Error)),
        };
        Box::pin(async move { result })
    }
}
