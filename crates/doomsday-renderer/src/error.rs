// error.rs: recoverable bias lighting and editor errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BiasError {
    #[error("no more than {capacity} bias lights are allowed")]
    CapacityExceeded { capacity: usize },

    #[error("invalid light index {index} (there are {count} lights)")]
    InvalidIndex { index: usize, count: usize },

    #[error("no light to act upon")]
    NoSource,

    #[error("the bias light editor is not active")]
    NotActive,

    #[error("{0}")]
    BadArguments(String),

    #[error("can't write \"{path}\": {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
