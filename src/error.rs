use std::fmt;

#[derive(Debug, Clone)]
pub enum Error {
    /// Malformed input data or serialized model.
    InvalidData(String),
    /// Bad hyperparameter or layer-range configuration.
    InvalidConfig(String),
    /// Dimensionality contract violation. Messages always name the expected
    /// and the actual counts.
    InvalidShape(String),
    /// An operation was called before its prerequisite (e.g. `backward`
    /// without a preceding `forward`). Messages name the missing call.
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            Error::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Error::InvalidShape(msg) => write!(f, "invalid shape: {msg}"),
            Error::InvalidState(msg) => write!(f, "invalid state: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
