use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::config::HooksConfig;
use crate::error::{FlowError, Result};
use crate::traits::AppHooks;
use crate::types::{EventType, Instance};

/// Execute hook commands with environment variables.
/// Stops at the first command that fails and reports it.
pub async fn run_hooks(commands: &[String], env_vars: &[(&str, &str)]) -> Result<()> {
    for cmd in commands {
        let mut command = tokio::process::Command::new("sh");
        command.args(["-c", cmd]);
        for (key, val) in env_vars {
            command.env(key, val);
        }
        command.stdout(std::process::Stdio::null());
        command.stderr(std::process::Stdio::null());
        match command.status().await {
            Ok(s) if s.success() => debug!(hook = %cmd, "Hook completed"),
            Ok(s) => {
                warn!(hook = %cmd, code = s.code(), "Hook exited non-zero");
                return Err(FlowError::Hook {
                    hook: cmd.clone(),
                    message: format!("exited with {}", s),
                });
            }
            Err(e) => {
                warn!(hook = %cmd, error = %e, "Hook failed to execute");
                return Err(FlowError::Hook {
                    hook: cmd.clone(),
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// `AppHooks` backed by shell commands from `[hooks]`.
///
/// Commands see `FORMFLOW_EVENT`, `FORMFLOW_INSTANCE_ID`,
/// `FORMFLOW_APP_ID` and `FORMFLOW_ELEMENT_ID`.
pub struct CommandHooks {
    config: HooksConfig,
}

impl CommandHooks {
    pub fn new(config: HooksConfig) -> Self {
        Self { config }
    }

    fn commands(&self, event: EventType) -> &[String] {
        match event {
            EventType::StartEvent => &self.config.on_start_process,
            EventType::StartTask => &self.config.on_start_task,
            EventType::EndTask => &self.config.on_end_task,
            EventType::EndEvent => &self.config.on_end_process,
        }
    }

    fn fire<'a>(
        &'a self,
        event: EventType,
        element_id: &'a str,
        instance: &'a Instance,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let instance_id = instance.id.to_string();
            let env = [
                ("FORMFLOW_EVENT", event.as_str()),
                ("FORMFLOW_INSTANCE_ID", instance_id.as_str()),
                ("FORMFLOW_APP_ID", instance.app_id.as_str()),
                ("FORMFLOW_ELEMENT_ID", element_id),
            ];
            run_hooks(self.commands(event), &env).await
        })
    }
}

impl AppHooks for CommandHooks {
    fn on_start_process<'a>(
        &'a self,
        start_event: &'a str,
        instance: &'a Instance,
    ) -> BoxFuture<'a, Result<()>> {
        self.fire(EventType::StartEvent, start_event, instance)
    }

    fn on_start_task<'a>(&'a self, task_id: &'a str, instance: &'a Instance) -> BoxFuture<'a, Result<()>> {
        self.fire(EventType::StartTask, task_id, instance)
    }

    fn on_end_task<'a>(&'a self, task_id: &'a str, instance: &'a Instance) -> BoxFuture<'a, Result<()>> {
        self.fire(EventType::EndTask, task_id, instance)
    }

    fn on_end_process<'a>(
        &'a self,
        end_event: &'a str,
        instance: &'a Instance,
    ) -> BoxFuture<'a, Result<()>> {
        self.fire(EventType::EndEvent, end_event, instance)
    }
}
