//! Bookmark automation engine - background dispatch lanes and job runtime.

pub mod automation;
pub mod error;
pub mod runtime;
pub mod scheduler;
pub mod task;

pub use automation::AutomationService;
pub use error::EngineError;
pub use runtime::{JobHandler, JobQueueHandle, JobRuntime};
pub use scheduler::JobScheduler;
pub use task::{JobRecord, JobStatus, JobTask};
