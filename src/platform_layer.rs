pub mod console_host;
pub mod error;
pub mod job_runner;
pub mod types;

pub use console_host::ConsoleHost;
pub use error::Result as PlatformResult;
pub use job_runner::JobServices;
pub use types::{
    AppEvent, BackgroundJob, MessageSeverity, PlatformCommand, PlatformEventHandler, ViewKind,
};
