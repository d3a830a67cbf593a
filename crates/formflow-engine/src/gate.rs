use std::sync::Arc;

use tracing::{debug, error, warn};

use formflow_core::error::{FlowError, Result};
use formflow_core::traits::{AppHooks, Validator};
use formflow_core::types::Instance;

/// TaskGate decides whether the current task may be closed.
///
/// Validation runs only when the task is not already marked as completable;
/// the application's `can_end_task` hook always has the final say.
pub struct TaskGate {
    validator: Arc<dyn Validator>,
    hooks: Arc<dyn AppHooks>,
}

impl TaskGate {
    pub fn new(validator: Arc<dyn Validator>, hooks: Arc<dyn AppHooks>) -> Self {
        Self { validator, hooks }
    }

    /// Returns `Ok(false)` on a veto or a failing collaborator. Only a hook
    /// returning `ExternalHookFailure` is propagated.
    pub async fn can_close(&self, task_id: &str, instance: &Instance) -> Result<bool> {
        let already_complete = instance
            .process
            .as_ref()
            .and_then(|p| p.current_task.as_ref())
            .is_some_and(|t| t.element_id == task_id && t.can_complete());

        let issues = if already_complete {
            Vec::new()
        } else {
            match self.validator.validate_task(instance, task_id).await {
                Ok(issues) => issues,
                Err(e) => {
                    warn!(
                        instance_id = %instance.id,
                        task_id,
                        error = %e,
                        "Validation failed, task cannot be closed"
                    );
                    return Ok(false);
                }
            }
        };

        match self.hooks.can_end_task(task_id, instance, &issues).await {
            Ok(allowed) => {
                debug!(
                    instance_id = %instance.id,
                    task_id,
                    issues = issues.len(),
                    allowed,
                    "Task gate decided"
                );
                Ok(allowed)
            }
            Err(FlowError::ExternalHookFailure(message)) => {
                error!(instance_id = %instance.id, task_id, error = %message, "can_end_task hook failed fatally");
                Err(FlowError::ExternalHookFailure(message))
            }
            Err(e) => {
                warn!(
                    instance_id = %instance.id,
                    task_id,
                    error = %e,
                    "can_end_task hook failed, task cannot be closed"
                );
                Ok(false)
            }
        }
    }
}
