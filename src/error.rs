use thiserror::Error;

use crate::collector::CollectorError;
use crate::query::CompileError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid query: {0}")]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Collector(#[from] CollectorError),
    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
