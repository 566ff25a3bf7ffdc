use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineClientError {
    #[error("engine transport error: {0}")]
    Transport(String),
    #[error("engine rpc error: {0}")]
    Rpc(String),
    #[error("engine protocol error: {0}")]
    Protocol(String),
    #[error("engine thread not found: {0}")]
    ThreadNotFound(String),
    #[error("engine client internal error: {0}")]
    Internal(String),
}

pub type EngineClientResult<T> = Result<T, EngineClientError>;
