//! Background render jobs: admission, execution, progress and results.

pub mod dispatcher;
pub mod progress;
pub mod registry;
pub mod results;

pub use dispatcher::JobDispatcher;
pub use registry::{JobRegistry, JobSnapshot};
pub use results::ResultStore;
