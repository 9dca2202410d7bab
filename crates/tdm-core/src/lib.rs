pub mod config;
pub mod logging;

pub mod engine;
pub mod error;
pub mod locator;
pub mod retention;
pub mod scheduler;
pub mod status;
pub mod storage;
pub mod task;
pub mod url_model;

pub use error::{EngineStartError, TdmError};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use task::{TaskId, TaskStatus};
