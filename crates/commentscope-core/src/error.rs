use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown analysis status: {0:?} (expected pending, completed or failed)")]
    UnknownStatus(String),
}
