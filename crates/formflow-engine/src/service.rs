use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use formflow_core::error::{ErrorClass, FlowError, Result};
use formflow_core::event::EventBus;
use formflow_core::security::{ActionPolicy, Decision};
use formflow_core::traits::{AppHooks, DecisionPoint, InstanceStore, Validator};
use formflow_core::types::{
    Instance, InstanceEvent, InstanceId, ProcessPhase, ProcessState, Subject,
};

use crate::engine::{Completion, ProcessEngine, Transition};
use crate::gate::TaskGate;
use crate::graph::ProcessGraph;
use crate::locks::InstanceLocks;
use crate::notifier::{EventNotifier, HookWarning};

/// What a successful mutating service call hands back.
#[derive(Debug, Clone)]
pub struct ServiceOutcome {
    /// Process state as persisted.
    pub state: ProcessState,
    pub events: Vec<InstanceEvent>,
    /// Hooks that failed after the state was persisted.
    pub warnings: Vec<HookWarning>,
}

/// ProcessService loads an instance, authorizes, runs the engine,
/// persists the result and notifies the application, one instance at a time.
pub struct ProcessService {
    engine: ProcessEngine,
    store: Arc<dyn InstanceStore>,
    decisions: Arc<dyn DecisionPoint>,
    notifier: EventNotifier,
    policy: ActionPolicy,
    locks: InstanceLocks,
}

impl ProcessService {
    pub fn new(
        graph: Arc<ProcessGraph>,
        store: Arc<dyn InstanceStore>,
        validator: Arc<dyn Validator>,
        decisions: Arc<dyn DecisionPoint>,
        hooks: Arc<dyn AppHooks>,
    ) -> Self {
        let gate = TaskGate::new(validator, hooks.clone());
        Self {
            engine: ProcessEngine::new(graph, gate),
            store,
            decisions,
            notifier: EventNotifier::new(hooks),
            policy: ActionPolicy::default(),
            locks: InstanceLocks::new(),
        }
    }

    /// Use a custom task-type → action mapping.
    pub fn with_policy(mut self, policy: ActionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Also publish every emitted event on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.notifier = self.notifier.with_event_bus(event_bus);
        self
    }

    pub fn engine(&self) -> &ProcessEngine {
        &self.engine
    }

    /// Current process state, `None` if the process has not started.
    pub async fn get_state(&self, id: &InstanceId) -> Result<Option<ProcessState>> {
        let instance = self.store.get_instance(id).await?;
        Ok(instance.process)
    }

    /// Elements reachable from where the instance is now; the start events
    /// if the process has not started.
    pub async fn list_next(&self, id: &InstanceId) -> Result<Vec<String>> {
        let instance = self.store.get_instance(id).await?;
        let next = self
            .engine
            .list_next(&instance)
            .inspect_err(|e| log_failure("list_next", id, e))?;

        if next.is_empty() {
            let at = instance
                .process
                .as_ref()
                .and_then(|p| p.current_element().or(p.start_event.as_deref()))
                .unwrap_or_default()
                .to_string();
            let err = FlowError::NoValidNext(at);
            log_failure("list_next", id, &err);
            return Err(err);
        }
        Ok(next)
    }

    pub async fn start(
        &self,
        id: &InstanceId,
        subject: &Subject,
        start_event: Option<&str>,
    ) -> Result<ServiceOutcome> {
        let _guard = self.locks.acquire(id).await;
        let instance = self.store.get_instance(id).await?;

        let transition = self
            .engine
            .start(&instance, start_event, Some(subject))
            .await
            .inspect_err(|e| log_failure("start", id, e))?;

        self.commit(instance, transition).await
    }

    pub async fn next(
        &self,
        id: &InstanceId,
        subject: &Subject,
        element_id: Option<&str>,
    ) -> Result<ServiceOutcome> {
        let _guard = self.locks.acquire(id).await;
        let instance = self.store.get_instance(id).await?;
        ensure_running(&instance).inspect_err(|e| log_failure("next", id, e))?;
        let decision = self.authorize(subject, &instance).await?;

        let transition = self
            .engine
            .next(&instance, element_id, decision, Some(subject))
            .await
            .inspect_err(|e| log_failure("next", id, e))?;

        self.commit(instance, transition).await
    }

    /// Drive the instance to an end event without naming targets.
    ///
    /// Steps that succeed are persisted and notified even when a later step
    /// stops the run; the stopping error is returned after that.
    pub async fn complete(&self, id: &InstanceId, subject: &Subject) -> Result<ServiceOutcome> {
        let _guard = self.locks.acquire(id).await;
        let instance = self.store.get_instance(id).await?;
        ensure_running(&instance).inspect_err(|e| log_failure("complete", id, e))?;
        let decision = self.authorize(subject, &instance).await?;

        let completion = self
            .engine
            .run_to_completion(&instance, decision, Some(subject))
            .await
            .inspect_err(|e| log_failure("complete", id, e))?;

        if completion.made_progress() {
            let Completion { progress, stopped } = completion;
            let outcome = self.commit(instance, progress).await?;
            match stopped {
                None => Ok(outcome),
                Some(err) => {
                    info!(
                        instance_id = %id,
                        current = outcome.state.current_element().unwrap_or("-"),
                        events = outcome.events.len(),
                        "Completion stopped after partial progress"
                    );
                    log_failure("complete", id, &err);
                    Err(err)
                }
            }
        } else {
            // Nothing moved; an error here left the instance untouched.
            let transition = completion
                .into_result()
                .inspect_err(|e| log_failure("complete", id, e))?;
            self.commit(instance, transition).await
        }
    }

    async fn authorize(&self, subject: &Subject, instance: &Instance) -> Result<Decision> {
        let request = self.policy.request_for(subject, instance);
        let decision = self.decisions.decide(&request).await?;
        debug!(
            instance_id = %instance.id,
            user_id = %subject.user_id,
            action = request.action.as_deref().unwrap_or("none"),
            ?decision,
            "Authorization decided"
        );
        Ok(decision)
    }

    /// Persist the new state, then notify hooks about what happened.
    async fn commit(&self, mut instance: Instance, transition: Transition) -> Result<ServiceOutcome> {
        let Transition { state, events } = transition;
        instance.process = Some(state);
        instance.last_changed = Some(Utc::now());

        let stored = self.store.update_instance(instance).await.inspect_err(|e| {
            error!(error = %e, "Failed to persist process state");
        })?;

        let warnings = self.notifier.notify(&events, &stored).await;
        let state = stored.process.clone().ok_or_else(|| {
            FlowError::Store(format!("instance {} lost its process state on update", stored.id))
        })?;

        info!(
            instance_id = %stored.id,
            events = events.len(),
            warnings = warnings.len(),
            current = state.current_element().unwrap_or("-"),
            ended = state.is_ended(),
            "Process state committed"
        );

        Ok(ServiceOutcome {
            state,
            events,
            warnings,
        })
    }
}

/// Refuse up front, before the decision point is asked, when there is no
/// running process to act on.
fn ensure_running(instance: &Instance) -> Result<()> {
    match instance.phase() {
        ProcessPhase::NotStarted => Err(FlowError::NotStarted),
        ProcessPhase::Ended => Err(FlowError::AlreadyEnded),
        ProcessPhase::Running => Ok(()),
    }
}

fn log_failure(operation: &str, id: &InstanceId, err: &FlowError) {
    match err.class() {
        ErrorClass::Conflict | ErrorClass::NotFound => {
            debug!(operation, instance_id = %id, error = %err, "Process request rejected")
        }
        ErrorClass::Definition => {
            warn!(operation, instance_id = %id, error = %err, "Process definition problem")
        }
        ErrorClass::Internal => {
            error!(operation, instance_id = %id, error = %err, "Process engine failure")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ProcessDefinition;
    use formflow_core::types::{EventType, Validated, ValidationIssue};
    use formflow_test_utils::{FixedDecision, MemoryStore, RecordingHooks, StaticValidator};

    struct Fixture {
        service: ProcessService,
        store: Arc<MemoryStore>,
        hooks: Arc<RecordingHooks>,
        decisions: Arc<FixedDecision>,
        id: InstanceId,
    }

    fn fixture(
        def: ProcessDefinition,
        validator: StaticValidator,
        hooks: RecordingHooks,
        decisions: FixedDecision,
    ) -> Fixture {
        let graph = Arc::new(ProcessGraph::from_definition(def).unwrap());
        let store = Arc::new(MemoryStore::new());
        let hooks = Arc::new(hooks);
        let decisions = Arc::new(decisions);
        let instance = Instance::new("ttd/forms");
        let id = instance.id.clone();
        store.insert(instance);

        let service = ProcessService::new(
            graph,
            store.clone(),
            Arc::new(validator),
            decisions.clone(),
            hooks.clone(),
        );
        Fixture {
            service,
            store,
            hooks,
            decisions,
            id,
        }
    }

    fn linear() -> ProcessDefinition {
        ProcessDefinition::new("p")
            .start_event("S")
            .data_task("T1")
            .end_event("End")
            .flow("S", "T1")
            .flow("T1", "End")
    }

    fn default_fixture() -> Fixture {
        fixture(
            linear(),
            StaticValidator::clean(),
            RecordingHooks::new(),
            FixedDecision::allow(),
        )
    }

    #[tokio::test]
    async fn start_persists_and_notifies() {
        let f = default_fixture();
        let user = Subject::user("1337");

        let out = f.service.start(&f.id, &user, None).await.unwrap();
        assert_eq!(out.state.current_element(), Some("T1"));
        assert!(out.warnings.is_empty());

        let stored = f.store.get(&f.id).unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.process.unwrap().current_element(), Some("T1"));
        assert_eq!(
            f.hooks.lifecycle_calls(),
            vec![
                (EventType::StartEvent, "S".to_string()),
                (EventType::StartTask, "T1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn next_asks_for_write_on_data_task() {
        let f = default_fixture();
        let user = Subject::user("1337");
        f.service.start(&f.id, &user, None).await.unwrap();

        let out = f.service.next(&f.id, &user, None).await.unwrap();
        assert!(out.state.is_ended());

        let requests = f.decisions.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].action.as_deref(), Some("write"));
        assert_eq!(requests[0].task_id.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn denied_next_changes_nothing() {
        let f = fixture(
            linear(),
            StaticValidator::clean(),
            RecordingHooks::new(),
            FixedDecision::deny(),
        );
        let user = Subject::user("1337");
        f.service.start(&f.id, &user, None).await.unwrap();
        let before = f.store.get(&f.id).unwrap();

        let err = f.service.next(&f.id, &user, None).await.unwrap_err();
        assert!(matches!(err, FlowError::Forbidden));

        let after = f.store.get(&f.id).unwrap();
        assert_eq!(after.version, before.version);
        assert_eq!(after.process, before.process);
        assert!(f.hooks.can_end_calls().is_empty());
    }

    #[tokio::test]
    async fn hook_failures_surface_as_warnings() {
        let f = fixture(
            linear(),
            StaticValidator::clean(),
            RecordingHooks::new().failing_on(EventType::EndEvent),
            FixedDecision::allow(),
        );
        let user = Subject::user("1337");
        f.service.start(&f.id, &user, None).await.unwrap();

        let out = f.service.next(&f.id, &user, None).await.unwrap();
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].event_type, EventType::EndEvent);
        // The mutation stands.
        assert!(f.store.get(&f.id).unwrap().process.unwrap().is_ended());
    }

    #[tokio::test]
    async fn complete_runs_to_end() {
        let f = default_fixture();
        let user = Subject::user("1337");
        f.service.start(&f.id, &user, None).await.unwrap();

        let out = f.service.complete(&f.id, &user).await.unwrap();
        assert_eq!(out.state.end_event.as_deref(), Some("End"));
        assert_eq!(
            f.service.get_state(&f.id).await.unwrap().unwrap().end_event.as_deref(),
            Some("End")
        );
    }

    #[tokio::test]
    async fn invalid_task_blocks_complete() {
        let f = fixture(
            linear(),
            StaticValidator::with_issues(vec![ValidationIssue::error("missing field")]),
            RecordingHooks::new(),
            FixedDecision::allow(),
        );
        let user = Subject::user("1337");
        f.service.start(&f.id, &user, None).await.unwrap();

        let err = f.service.complete(&f.id, &user).await.unwrap_err();
        assert!(matches!(err, FlowError::TaskNotCloseable(_)));
        assert_eq!(f.store.get(&f.id).unwrap().version, 1);
    }

    #[tokio::test]
    async fn list_next_before_and_after_start() {
        let f = default_fixture();
        assert_eq!(f.service.list_next(&f.id).await.unwrap(), ["S"]);
        assert!(f.service.get_state(&f.id).await.unwrap().is_none());

        f.service
            .start(&f.id, &Subject::user("1337"), None)
            .await
            .unwrap();
        assert_eq!(f.service.list_next(&f.id).await.unwrap(), ["End"]);
    }

    #[tokio::test]
    async fn list_next_from_dead_end_is_an_error() {
        let def = ProcessDefinition::new("p")
            .start_event("S")
            .data_task("T1")
            .flow("S", "T1");
        let f = fixture(
            def,
            StaticValidator::clean(),
            RecordingHooks::new(),
            FixedDecision::allow(),
        );
        f.service
            .start(&f.id, &Subject::user("1337"), None)
            .await
            .unwrap();
        assert!(matches!(
            f.service.list_next(&f.id).await,
            Err(FlowError::NoValidNext(ref at)) if at == "T1"
        ));
    }

    #[tokio::test]
    async fn unknown_instance() {
        let f = default_fixture();
        let ghost = InstanceId::from_str("ghost");
        assert!(matches!(
            f.service.start(&ghost, &Subject::user("1"), None).await,
            Err(FlowError::InstanceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_starts_only_one_wins() {
        let f = default_fixture();
        let service = Arc::new(f.service);
        let user = Subject::user("1337");

        let a = {
            let (service, id, user) = (service.clone(), f.id.clone(), user.clone());
            tokio::spawn(async move { service.start(&id, &user, None).await })
        };
        let b = {
            let (service, id, user) = (service.clone(), f.id.clone(), user.clone());
            tokio::spawn(async move { service.start(&id, &user, None).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let ok = results.iter().filter(|r| r.is_ok()).count();
        let already = results
            .iter()
            .filter(|r| matches!(r, Err(FlowError::AlreadyStarted)))
            .count();
        assert_eq!((ok, already), (1, 1));
        assert_eq!(f.store.get(&f.id).unwrap().version, 1);
    }

    #[tokio::test]
    async fn complete_keeps_steps_taken_before_a_refusal() {
        let def = ProcessDefinition::new("p")
            .start_event("S")
            .task("T1", Some("confirmation"))
            .data_task("T2")
            .end_event("End")
            .flow("S", "T1")
            .flow("T1", "T2")
            .flow("T2", "End");
        let f = fixture(
            def,
            StaticValidator::with_issues_for("T2", vec![ValidationIssue::error("missing name")]),
            RecordingHooks::new(),
            FixedDecision::allow(),
        );
        let user = Subject::user("1337");
        f.service.start(&f.id, &user, None).await.unwrap();

        let err = f.service.complete(&f.id, &user).await.unwrap_err();
        assert!(matches!(err, FlowError::TaskNotCloseable(ref t) if t == "T2"));

        let stored = f.store.get(&f.id).unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.process.unwrap().current_element(), Some("T2"));
        assert_eq!(
            f.hooks.lifecycle_calls(),
            vec![
                (EventType::StartEvent, "S".to_string()),
                (EventType::StartTask, "T1".to_string()),
                (EventType::EndTask, "T1".to_string()),
                (EventType::StartTask, "T2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn phase_is_checked_before_asking_for_a_decision() {
        let f = default_fixture();
        let user = Subject::user("1337");

        assert!(matches!(
            f.service.next(&f.id, &user, None).await,
            Err(FlowError::NotStarted)
        ));
        assert!(matches!(
            f.service.complete(&f.id, &user).await,
            Err(FlowError::NotStarted)
        ));

        f.service.start(&f.id, &user, None).await.unwrap();
        f.service.complete(&f.id, &user).await.unwrap();
        let asked = f.decisions.requests().len();

        assert!(matches!(
            f.service.next(&f.id, &user, None).await,
            Err(FlowError::AlreadyEnded)
        ));
        assert!(matches!(
            f.service.complete(&f.id, &user).await,
            Err(FlowError::AlreadyEnded)
        ));
        assert_eq!(asked, 1);
        assert_eq!(f.decisions.requests().len(), asked);
    }

    #[tokio::test]
    async fn recorded_validation_is_not_repeated() {
        let graph = Arc::new(ProcessGraph::from_definition(linear()).unwrap());
        let store = Arc::new(MemoryStore::new());
        let validator = Arc::new(StaticValidator::with_issues(vec![ValidationIssue::error(
            "stale issue",
        )]));
        let service = ProcessService::new(
            graph,
            store.clone(),
            validator.clone(),
            Arc::new(FixedDecision::allow()),
            Arc::new(RecordingHooks::new()),
        );
        let instance = Instance::new("ttd/forms");
        let id = instance.id.clone();
        store.insert(instance);
        let user = Subject::user("1337");
        service.start(&id, &user, None).await.unwrap();

        // The validation collaborator records a passing result on the instance.
        let mut stored = store.get(&id).unwrap();
        if let Some(task) = stored.process.as_mut().and_then(|p| p.current_task.as_mut()) {
            task.validated = Some(Validated {
                timestamp: Some(Utc::now()),
                can_complete_task: true,
            });
        }
        store.insert(stored);

        let out = service.next(&id, &user, None).await.unwrap();
        assert!(out.state.is_ended());
        assert_eq!(validator.calls(), 0);
    }
}
