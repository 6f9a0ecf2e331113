use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job '{0}' not found")]
    JobNotFound(String),

    #[error("schedule '{0}' not found")]
    ScheduleNotFound(String),

    #[error("schedule '{id}' already exists (conflict policy: reject)")]
    ScheduleConflict { id: String },

    #[error("schedule trigger must set exactly one of cron/interval/date")]
    InvalidTrigger,

    #[error("job '{id}' failed: {message}")]
    JobFailed { id: String, message: String },

    #[error("job '{id}' exceeded its {timeout_secs}s timeout")]
    Timeout { id: String, timeout_secs: f64 },

    #[error("backend '{0}' is not registered")]
    UnknownBackend(String),

    #[error("backend '{0}' is already registered")]
    BackendAlreadyRegistered(String),

    #[error("queue backend connection failure: {0}")]
    Connection(#[source] anyhow::Error),

    #[error("wire encoding error: {0}")]
    Encoding(#[source] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl QueueError {
    pub fn kind(&self) -> flowerpower_core::ErrorKind {
        match self {
            QueueError::Connection(_) => flowerpower_core::ErrorKind::Broker,
            QueueError::Io(_) => flowerpower_core::ErrorKind::Io,
            _ => flowerpower_core::ErrorKind::Other("queue".to_string()),
        }
    }
}

impl flowerpower_core::Classify for QueueError {
    fn kind(&self) -> flowerpower_core::ErrorKind {
        QueueError::kind(self)
    }
}
