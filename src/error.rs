use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("target `{0}` is not a valid IPv4 or IPv6 address")]
    InvalidTarget(String),
    #[error("port `{0}` is invalid")]
    InvalidPort(String),
    #[error("port range {0}-{1} is invalid (start must be at least 1 and not above end)")]
    InvalidPortRange(u16, u16),
    #[error("worker count `{0}` is invalid (expected an integer between 1 and 1000)")]
    InvalidWorkerCount(String),
    #[error("timeout `{0}` is invalid (expected a positive number of milliseconds)")]
    InvalidTimeout(String),
    #[error("failed to open log file `{0}`: {1}")]
    LogFileFailed(String, #[source] std::io::Error),
    #[error("failed to build worker pool: {0}")]
    WorkerPoolFailed(#[source] rayon::ThreadPoolBuildError),
}
