//! formflow drives form-filling instances through a BPMN-like process graph.
//!
//! The pieces live in their own crates and are re-exported here;
//! [`Runtime`] wires them together from a [`FlowConfig`].

use std::sync::Arc;

use tracing::info;

pub use formflow_core::config::FlowConfig;
pub use formflow_core::security::{ActionPolicy, AuthorizationRequest, Decision};
pub use formflow_core::types::{Instance, InstanceId, ProcessState, Subject};
pub use formflow_core::error::{FlowError, Result};
pub use formflow_core::event::EventBus;
pub use formflow_core::hooks::CommandHooks;
pub use formflow_core::traits::{AppHooks, DecisionPoint, InstanceStore, Validator};
pub use formflow_engine::{ProcessDefinition, ProcessGraph, ProcessService, ServiceOutcome};
pub use formflow_store::SqliteInstanceStore;

/// A configured service together with its store and event bus.
pub struct Runtime {
    pub service: ProcessService,
    pub store: Arc<SqliteInstanceStore>,
    pub events: Arc<EventBus>,
}

impl Runtime {
    /// Build everything `config` describes: logging, the process graph,
    /// the SQLite store and shell-command hooks. Validation and
    /// authorization are supplied by the caller.
    pub fn from_config(
        config: &FlowConfig,
        validator: Arc<dyn Validator>,
        decisions: Arc<dyn DecisionPoint>,
    ) -> Result<Self> {
        formflow_core::logging::init(&config.log);

        let graph = Arc::new(ProcessGraph::from_config(config)?);
        let store = Arc::new(SqliteInstanceStore::open(&config.store_path())?);
        let events = Arc::new(EventBus::default());
        let hooks: Arc<dyn AppHooks> = Arc::new(CommandHooks::new(config.hooks.clone()));

        info!(
            process_id = graph.id(),
            elements = graph.len(),
            store = %config.store_path().display(),
            "Process runtime ready"
        );

        let service = ProcessService::new(graph, store.clone(), validator, decisions, hooks)
            .with_policy(config.authorization.clone())
            .with_event_bus(events.clone());

        Ok(Self {
            service,
            store,
            events,
        })
    }
}
