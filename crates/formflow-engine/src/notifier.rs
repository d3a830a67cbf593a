use std::sync::Arc;

use tracing::{debug, warn};

use formflow_core::error::{FlowError, Result};
use formflow_core::event::EventBus;
use formflow_core::traits::AppHooks;
use formflow_core::types::{EventType, Instance, InstanceEvent};

/// A hook that failed after the state change it reports on was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookWarning {
    pub event_type: EventType,
    pub element_id: Option<String>,
    pub message: String,
}

/// EventNotifier hands lifecycle events to the application hooks, in
/// emission order, and republishes them on the event bus.
///
/// Notification happens after the state change is final, so hook failures
/// are returned as warnings rather than errors.
pub struct EventNotifier {
    hooks: Arc<dyn AppHooks>,
    event_bus: Option<Arc<EventBus>>,
}

impl EventNotifier {
    pub fn new(hooks: Arc<dyn AppHooks>) -> Self {
        Self {
            hooks,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub async fn notify(&self, events: &[InstanceEvent], instance: &Instance) -> Vec<HookWarning> {
        let mut warnings = Vec::new();

        for event in events {
            if let Some(bus) = &self.event_bus {
                bus.publish(event.clone());
            }

            let element_id = event.element_id();
            if let Err(e) = self.dispatch(event.event_type, element_id, instance).await {
                warn!(
                    instance_id = %instance.id,
                    event_type = %event.event_type,
                    element_id = element_id.unwrap_or_default(),
                    error = %e,
                    "Process hook failed"
                );
                warnings.push(HookWarning {
                    event_type: event.event_type,
                    element_id: element_id.map(str::to_string),
                    message: e.to_string(),
                });
            } else {
                debug!(instance_id = %instance.id, event_type = %event.event_type, "Hook notified");
            }
        }

        warnings
    }

    async fn dispatch(
        &self,
        event_type: EventType,
        element_id: Option<&str>,
        instance: &Instance,
    ) -> Result<()> {
        let element_id = element_id.ok_or_else(|| FlowError::Hook {
            hook: event_type.to_string(),
            message: "event carries no element id".to_string(),
        })?;

        match event_type {
            EventType::StartEvent => self.hooks.on_start_process(element_id, instance).await,
            EventType::StartTask => self.hooks.on_start_task(element_id, instance).await,
            EventType::EndTask => self.hooks.on_end_task(element_id, instance).await,
            EventType::EndEvent => self.hooks.on_end_process(element_id, instance).await,
        }
    }
}
