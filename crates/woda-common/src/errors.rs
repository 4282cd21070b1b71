use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures raised by the registry, dispatcher and outbound transport.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("object already registered: {0}")]
    DuplicateId(String),

    #[error("unknown object: {0}")]
    UnknownObject(String),

    #[error("unknown member: {object}.{member}")]
    UnknownMember { object: String, member: String },

    #[error("{object}.{member} is an event, not a method")]
    NotAMethod { object: String, member: String },

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("{member} expects {expected} argument(s) ({params}), got {got}")]
    ArityMismatch {
        member: String,
        expected: usize,
        params: String,
        got: usize,
    },

    #[error("transport closed")]
    TransportClosed,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Failures inside a capability object. These never cross the transport as
/// raw errors: capabilities turn them into events or inline error fields.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("path escapes sandbox: {0}")]
    PathTraversal(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("not a file: {0}")]
    NotAFile(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("empty path")]
    EmptyPath,

    #[error("decode error: {0}")]
    Decode(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("worker error: {0}")]
    Worker(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WodaError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
