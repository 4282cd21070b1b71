pub mod errors;

pub use errors::{BridgeError, CapabilityError, ConfigError, WodaError};

pub type Result<T> = std::result::Result<T, WodaError>;
