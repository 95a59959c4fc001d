use thiserror::Error;

/// Why a request could not be dispatched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("missing command")]
    MissingCommand,

    #[error("wrong number of arguments for {command}, expected {expected}, got {got}")]
    WrongArity {
        command: String,
        expected: usize,
        got: usize,
    },

    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    #[error("request exceeds {limit} bytes")]
    RequestTooLarge { limit: usize },
}
