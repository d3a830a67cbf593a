use std::sync::Arc;

use formflow::{
    AppHooks, DecisionPoint, EventBus, FlowError, Instance, InstanceId, InstanceStore,
    ProcessGraph, ProcessService, SqliteInstanceStore, Subject, Validator,
};
use formflow_core::types::{EventType, ValidationIssue};
use formflow_test_utils::{fixtures, FixedDecision, RecordingHooks, StaticValidator};

struct Harness {
    service: ProcessService,
    store: Arc<SqliteInstanceStore>,
    hooks: Arc<RecordingHooks>,
    id: InstanceId,
}

fn harness(
    definition: &str,
    validator: StaticValidator,
    hooks: RecordingHooks,
    decisions: FixedDecision,
) -> anyhow::Result<Harness> {
    let graph = Arc::new(ProcessGraph::load(definition.as_bytes())?);
    let store = Arc::new(SqliteInstanceStore::in_memory()?);
    let hooks = Arc::new(hooks);

    let instance = Instance::new("ttd/forms");
    store.insert(&instance)?;

    let validator: Arc<dyn Validator> = Arc::new(validator);
    let decisions: Arc<dyn DecisionPoint> = Arc::new(decisions);
    let app_hooks: Arc<dyn AppHooks> = hooks.clone();
    let service = ProcessService::new(graph, store.clone(), validator, decisions, app_hooks);

    Ok(Harness {
        service,
        store,
        hooks,
        id: instance.id,
    })
}

fn user() -> Subject {
    Subject::user("1337")
}

#[tokio::test]
async fn linear_process_runs_start_to_end() -> anyhow::Result<()> {
    let h = harness(
        fixtures::LINEAR,
        StaticValidator::clean(),
        RecordingHooks::new(),
        FixedDecision::allow(),
    )?;

    let started = h.service.start(&h.id, &user(), None).await?;
    assert_eq!(started.state.current_element(), Some("Task_1"));
    assert_eq!(started.state.start_event.as_deref(), Some("StartEvent_1"));

    let ended = h.service.next(&h.id, &user(), None).await?;
    assert!(ended.state.is_ended());
    assert_eq!(ended.state.end_event.as_deref(), Some("EndEvent_1"));
    assert!(ended.state.current_task.is_none());

    let kinds: Vec<EventType> = started
        .events
        .iter()
        .chain(ended.events.iter())
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        kinds,
        [
            EventType::StartEvent,
            EventType::StartTask,
            EventType::EndTask,
            EventType::EndEvent,
        ]
    );
    assert_eq!(h.hooks.lifecycle_calls().len(), 4);

    let stored = h.store.get_instance(&h.id).await?;
    assert_eq!(stored.version, 2);
    assert!(stored.process.is_some_and(|p| p.is_ended()));
    Ok(())
}

#[tokio::test]
async fn branching_needs_a_target() -> anyhow::Result<()> {
    let h = harness(
        fixtures::BRANCHING,
        StaticValidator::clean(),
        RecordingHooks::new(),
        FixedDecision::allow(),
    )?;
    h.service.start(&h.id, &user(), None).await?;

    let err = h.service.next(&h.id, &user(), None).await.unwrap_err();
    assert!(matches!(err, FlowError::AmbiguousNext { .. }));
    assert_eq!(h.store.get_instance(&h.id).await?.version, 1);

    let out = h.service.next(&h.id, &user(), Some("Task_2")).await?;
    assert_eq!(out.state.current_element(), Some("Task_2"));
    assert_eq!(out.state.current_task.as_ref().map(|t| t.flow), Some(2));
    Ok(())
}

#[tokio::test]
async fn refused_gate_keeps_current_task() -> anyhow::Result<()> {
    let h = harness(
        fixtures::LINEAR,
        StaticValidator::with_issues(vec![ValidationIssue::error("name is required")]),
        RecordingHooks::new().veto_tasks(),
        FixedDecision::allow(),
    )?;
    h.service.start(&h.id, &user(), None).await?;

    let err = h.service.next(&h.id, &user(), None).await.unwrap_err();
    assert!(matches!(err, FlowError::TaskNotCloseable(ref t) if t == "Task_1"));

    let state = h.service.get_state(&h.id).await?.expect("started");
    assert_eq!(state.current_element(), Some("Task_1"));
    assert!(!state.is_ended());
    Ok(())
}

#[tokio::test]
async fn denied_decision_is_forbidden() -> anyhow::Result<()> {
    let h = harness(
        fixtures::LINEAR,
        StaticValidator::clean(),
        RecordingHooks::new(),
        FixedDecision::deny(),
    )?;
    h.service.start(&h.id, &user(), None).await?;
    let before = h.store.get_instance(&h.id).await?;

    let err = h.service.next(&h.id, &user(), None).await.unwrap_err();
    assert!(matches!(err, FlowError::Forbidden));

    let after = h.store.get_instance(&h.id).await?;
    assert_eq!(after.version, before.version);
    assert_eq!(after.process, before.process);
    assert!(h.hooks.can_end_calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn double_start_and_advance_after_end() -> anyhow::Result<()> {
    let h = harness(
        fixtures::LINEAR,
        StaticValidator::clean(),
        RecordingHooks::new(),
        FixedDecision::allow(),
    )?;
    h.service.start(&h.id, &user(), None).await?;
    assert!(matches!(
        h.service.start(&h.id, &user(), None).await,
        Err(FlowError::AlreadyStarted)
    ));

    h.service.complete(&h.id, &user()).await?;
    assert!(matches!(
        h.service.next(&h.id, &user(), None).await,
        Err(FlowError::AlreadyEnded)
    ));
    assert!(matches!(
        h.service.list_next(&h.id).await,
        Err(FlowError::AlreadyEnded)
    ));
    Ok(())
}

#[tokio::test]
async fn cycle_hits_the_iteration_cap() -> anyhow::Result<()> {
    let h = harness(
        fixtures::CYCLIC,
        StaticValidator::clean(),
        RecordingHooks::new(),
        FixedDecision::allow(),
    )?;
    h.service.start(&h.id, &user(), None).await?;
    let before = h.store.get_instance(&h.id).await?;

    let err = h.service.complete(&h.id, &user()).await.unwrap_err();
    assert!(matches!(err, FlowError::IterationLimitExceeded(1000)));

    // The 1000 steps taken are persisted in one write; the 1001st never ran.
    let after = h.store.get_instance(&h.id).await?;
    assert_eq!(after.version, before.version + 1);
    let task = after.process.and_then(|p| p.current_task).expect("running");
    assert_eq!(task.element_id, "Review");
    assert_eq!(task.flow, 1001);
    // StartEvent and StartTask from start, then an EndTask and StartTask per step.
    assert_eq!(h.hooks.lifecycle_calls().len(), 2 + 2 * 1000);
    Ok(())
}

#[tokio::test]
async fn refused_task_midway_keeps_earlier_progress() -> anyhow::Result<()> {
    let h = harness(
        fixtures::SEQUENTIAL,
        StaticValidator::with_issues_for("Task_2", vec![ValidationIssue::error("sign first")]),
        RecordingHooks::new(),
        FixedDecision::allow(),
    )?;
    h.service.start(&h.id, &user(), None).await?;

    let err = h.service.complete(&h.id, &user()).await.unwrap_err();
    assert!(matches!(err, FlowError::TaskNotCloseable(ref t) if t == "Task_2"));

    let stored = h.store.get_instance(&h.id).await?;
    assert_eq!(stored.version, 2);
    assert_eq!(
        stored.process.as_ref().and_then(|p| p.current_element()),
        Some("Task_2")
    );
    let calls = h.hooks.lifecycle_calls();
    assert_eq!(
        calls[2..],
        [
            (EventType::EndTask, "Task_1".to_string()),
            (EventType::StartTask, "Task_2".to_string()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn start_event_must_be_chosen_when_several_exist() -> anyhow::Result<()> {
    let h = harness(
        fixtures::TWO_STARTS,
        StaticValidator::clean(),
        RecordingHooks::new(),
        FixedDecision::allow(),
    )?;
    assert_eq!(h.service.list_next(&h.id).await?, ["Start_Web", "Start_Api"]);
    assert!(matches!(
        h.service.start(&h.id, &user(), None).await,
        Err(FlowError::AmbiguousStart(_))
    ));
    assert!(matches!(
        h.service.start(&h.id, &user(), Some("Task_Web")).await,
        Err(FlowError::InvalidStart(_))
    ));

    let out = h.service.start(&h.id, &user(), Some("Start_Api")).await?;
    assert_eq!(out.state.current_element(), Some("Task_Api"));
    Ok(())
}

#[tokio::test]
async fn events_reach_bus_subscribers() -> anyhow::Result<()> {
    let h = harness(
        fixtures::LINEAR,
        StaticValidator::clean(),
        RecordingHooks::new(),
        FixedDecision::allow(),
    )?;
    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let service = h.service.with_event_bus(bus);

    service.start(&h.id, &user(), None).await?;
    let first = rx.recv().await?;
    assert_eq!(first.event_type, EventType::StartEvent);
    assert_eq!(first.instance_id, h.id);
    assert_eq!(first.performed_by.as_deref(), Some("1337"));
    assert_eq!(rx.recv().await?.event_type, EventType::StartTask);
    Ok(())
}

#[tokio::test]
async fn concurrent_next_calls_apply_once() -> anyhow::Result<()> {
    let h = harness(
        fixtures::LINEAR,
        StaticValidator::clean(),
        RecordingHooks::new(),
        FixedDecision::allow(),
    )?;
    h.service.start(&h.id, &user(), None).await?;
    let service = Arc::new(h.service);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let service = service.clone();
        let id = h.id.clone();
        handles.push(tokio::spawn(async move {
            service.next(&id, &user(), None).await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => ok += 1,
            Err(e) => assert!(matches!(e, FlowError::AlreadyEnded)),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(h.store.get_instance(&h.id).await?.version, 2);
    Ok(())
}
