use thiserror::Error;

use crate::db::error::DbError;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Watermark persistence failed: {0}")]
    Watermark(#[from] DbError),

    #[error("Merger has no sources to merge")]
    NoSources,
}

pub(crate) type Result<T> = std::result::Result<T, MergeError>;
