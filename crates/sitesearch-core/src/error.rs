use std::io;

use thiserror::Error;

use crate::graph::GraphError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Query(#[from] query_parser::Error),
    #[error(transparent)]
    Postfix(#[from] query_parser::InvalidPostfix),
}
