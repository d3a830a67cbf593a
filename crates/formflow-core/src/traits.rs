use futures::future::BoxFuture;

use crate::error::Result;
use crate::security::{AuthorizationRequest, Decision};
use crate::types::{Instance, InstanceId, Severity, ValidationIssue};

/// Instance store, the persistence backend.
pub trait InstanceStore: Send + Sync + 'static {
    /// Load an instance, failing with `InstanceNotFound` if absent.
    fn get_instance(&self, id: &InstanceId) -> BoxFuture<'_, Result<Instance>>;

    /// Persist an updated instance and return what was stored.
    fn update_instance(&self, instance: Instance) -> BoxFuture<'_, Result<Instance>>;
}

/// Data validation of form content for a task.
pub trait Validator: Send + Sync + 'static {
    fn validate_task<'a>(
        &'a self,
        instance: &'a Instance,
        task_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ValidationIssue>>>;
}

/// Policy decision point.
pub trait DecisionPoint: Send + Sync + 'static {
    fn decide<'a>(&'a self, request: &'a AuthorizationRequest) -> BoxFuture<'a, Result<Decision>>;
}

/// Application-defined process hooks.
///
/// Lifecycle hooks default to no-ops. `can_end_task` defaults to allowing
/// the task to close when no issue has error severity.
pub trait AppHooks: Send + Sync + 'static {
    fn on_start_process<'a>(
        &'a self,
        start_event: &'a str,
        instance: &'a Instance,
    ) -> BoxFuture<'a, Result<()>> {
        let _ = (start_event, instance);
        Box::pin(async { Ok(()) })
    }

    fn on_start_task<'a>(&'a self, task_id: &'a str, instance: &'a Instance) -> BoxFuture<'a, Result<()>> {
        let _ = (task_id, instance);
        Box::pin(async { Ok(()) })
    }

    fn on_end_task<'a>(&'a self, task_id: &'a str, instance: &'a Instance) -> BoxFuture<'a, Result<()>> {
        let _ = (task_id, instance);
        Box::pin(async { Ok(()) })
    }

    fn on_end_process<'a>(
        &'a self,
        end_event: &'a str,
        instance: &'a Instance,
    ) -> BoxFuture<'a, Result<()>> {
        let _ = (end_event, instance);
        Box::pin(async { Ok(()) })
    }

    /// Veto point for closing a task. Returning
    /// `Err(FlowError::ExternalHookFailure(..))` is treated as fatal; any
    /// other error means the task cannot close.
    fn can_end_task<'a>(
        &'a self,
        task_id: &'a str,
        instance: &'a Instance,
        issues: &'a [ValidationIssue],
    ) -> BoxFuture<'a, Result<bool>> {
        let _ = (task_id, instance);
        let blocked = issues.iter().any(|i| i.severity == Severity::Error);
        Box::pin(async move { Ok(!blocked) })
    }
}
