use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("detector error: {0}")]
    Detector(String),

    #[error("reload error: {0}")]
    Reload(String),
}
