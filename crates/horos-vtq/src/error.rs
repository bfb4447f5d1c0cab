use thiserror::Error;

#[derive(Debug, Error)]
pub enum VtqError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
