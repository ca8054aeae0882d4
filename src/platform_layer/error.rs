use std::io;

// Represents errors that can occur within the host layer.
//
// Only host-level failures end up here (console I/O, a lost event channel);
// failures of the session core are contained where they happen.
#[derive(Debug)]
pub enum PlatformError {
    /// Reading input or writing output failed.
    Io(io::Error),
    /// Failure during the initialization of the host or its services.
    InitializationFailed(String),
    /// The event channel between workers and the event loop was closed unexpectedly.
    ChannelClosed,
    /// The application logic lock was poisoned by a panic on another thread.
    HandlerUnavailable,
}

impl From<io::Error> for PlatformError {
    fn from(err: io::Error) -> Self {
        PlatformError::Io(err)
    }
}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformError::Io(e) => write!(f, "Host I/O error: {e}"),
            PlatformError::InitializationFailed(s) => write!(f, "Initialization Failed: {s}"),
            PlatformError::ChannelClosed => write!(f, "Event channel closed"),
            PlatformError::HandlerUnavailable => write!(f, "Application logic is unavailable"),
        }
    }
}

impl std::error::Error for PlatformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlatformError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// A specialized `Result` type for host operations.
pub type Result<T> = std::result::Result<T, PlatformError>;
