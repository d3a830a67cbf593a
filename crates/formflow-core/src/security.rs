use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{Instance, InstanceId, Subject};

/// Outcome of a policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// What is sent to the policy decision point before a process change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub subject: Subject,
    /// Action derived from the current task type (`None` when the task
    /// type has no mapped action).
    pub action: Option<String>,
    pub app_id: String,
    pub instance_id: InstanceId,
    pub instance_owner_party_id: Option<i64>,
    pub task_id: Option<String>,
}

impl AuthorizationRequest {
    pub fn for_current_task(subject: &Subject, action: Option<String>, instance: &Instance) -> Self {
        Self {
            subject: subject.clone(),
            action,
            app_id: instance.app_id.clone(),
            instance_id: instance.id.clone(),
            instance_owner_party_id: instance.instance_owner_party_id,
            task_id: instance
                .process
                .as_ref()
                .and_then(|p| p.current_element())
                .map(str::to_string),
        }
    }
}

/// Maps task type tags to the action that must be authorized to close them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPolicy {
    #[serde(default = "default_task_actions")]
    pub task_actions: HashMap<String, String>,
}

fn default_task_actions() -> HashMap<String, String> {
    HashMap::from([("data".to_string(), "write".to_string())])
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self {
            task_actions: default_task_actions(),
        }
    }
}

impl ActionPolicy {
    pub fn action_for(&self, task_type: Option<&str>) -> Option<String> {
        task_type.and_then(|t| self.task_actions.get(t).cloned())
    }

    /// Build the request for closing the instance's current task.
    pub fn request_for(&self, subject: &Subject, instance: &Instance) -> AuthorizationRequest {
        let task_type = instance
            .process
            .as_ref()
            .and_then(|p| p.current_task.as_ref())
            .and_then(|t| t.task_type.as_deref());
        AuthorizationRequest::for_current_task(subject, self.action_for(task_type), instance)
    }
}
