use prodclass_core::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type ScanResult<T> = Result<T, ScanError>;
