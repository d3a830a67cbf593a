pub mod engine;
pub mod gate;
pub mod graph;
pub mod locks;
pub mod notifier;
pub mod resolver;
pub mod service;

pub use engine::{Completion, ProcessEngine, Transition, MAX_ITERATIONS};
pub use gate::TaskGate;
pub use graph::{Node, NodeKind, ProcessDefinition, ProcessGraph};
pub use locks::InstanceLocks;
pub use notifier::{EventNotifier, HookWarning};
pub use resolver::TransitionResolver;
pub use service::{ProcessService, ServiceOutcome};
