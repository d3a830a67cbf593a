pub mod config;
pub mod error;
pub mod event;
pub mod hooks;
pub mod logging;
pub mod security;
pub mod traits;
pub mod types;

pub use config::FlowConfig;
pub use error::{ErrorClass, FlowError, Result};
pub use event::EventBus;
pub use types::*;
