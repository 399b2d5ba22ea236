use thiserror::Error;

/// Errors that can occur while sampling and displaying browser processes
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The process-info provider could not produce a snapshot
    #[error("Process info request failed: {0}")]
    ProviderFailed(String),

    /// A sample was paired with the sample of a different process
    #[error("Assertion failed: a process cannot change pid ({previous} -> {current})")]
    PidMismatch { current: i64, previous: i64 },

    /// Sort column key outside of the supported set
    #[error("Unsupported order: {0}")]
    UnsupportedSortColumn(String),

    /// A rendered memory amount could not be read back
    #[error("Invalid memory size string: {0:?}")]
    InvalidMemoryString(String),

    /// Mutex lock was poisoned (another thread panicked while holding the lock)
    #[error("Mutex lock was poisoned: {0}")]
    MutexPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for MonitorError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        MonitorError::MutexPoisoned(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
