use std::backtrace::{Backtrace, BacktraceStatus};
use thiserror::Error;

/// The main error type for swapper operations.
///
/// This enum represents every failure a swap, a cache refresh or an
/// active-VM operation can surface, from malformed user input to
/// hypervisor transport failures.
#[derive(Error, Debug)]
pub enum SwapperError {
    /// The caller supplied a malformed argument (e.g. a non-numeric VM id)
    ///
    /// # Fields
    /// * `0` - A description of the rejected argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No participation-tagged VM carries the requested id
    #[error("No QM with id {0} found")]
    NotFound(u32),

    /// The swap target is already the active VM
    #[error("QM {0} is already online")]
    AlreadyOnline(u32),

    /// The operation requires an active VM but none is running
    #[error("No active QM found")]
    NoActiveVm,

    /// The configuration block embedded in a VM description could not be read
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Represents hypervisor transport or API failures
    ///
    /// # Fields
    /// * `0` - A description of what went wrong upstream
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// The hypervisor rejected the configured credentials
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// A guarded operation was attempted without the required opt-in or credentials
    #[error("Security: {0}")]
    SecurityDenied(String),

    /// Represents validation failures with detailed context
    ///
    /// # Fields
    /// * `source` - The underlying validation error
    /// * `trace` - Rendered stack trace where the error occurred, empty unless
    ///   `RUST_BACKTRACE` is set
    #[error("Validation error: {source}")]
    Validation {
        source: ValidationError,
        trace: String,
    },

    /// The cache store failed to read or write a key
    #[error("Store error: {0}")]
    Store(String),

    /// A job could not be handed to its queue worker
    #[error("Queue error: {0}")]
    Queue(String),

    /// The VM kept reporting `running` after the graceful wait and the forced halt
    #[error("QM {vmid} did not stop within {waited_secs}s")]
    ShutdownTimeout { vmid: u32, waited_secs: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ValidationError> for SwapperError {
    fn from(error: ValidationError) -> Self {
        SwapperError::Validation {
            source: error,
            trace: capture_trace(),
        }
    }
}

fn capture_trace() -> String {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => backtrace.to_string(),
        _ => String::new(),
    }
}

impl From<redb::DatabaseError> for SwapperError {
    fn from(err: redb::DatabaseError) -> Self {
        SwapperError::Store(format!("database: {}", err))
    }
}

impl From<redb::TransactionError> for SwapperError {
    fn from(err: redb::TransactionError) -> Self {
        SwapperError::Store(format!("transaction: {}", err))
    }
}

impl From<redb::TableError> for SwapperError {
    fn from(err: redb::TableError) -> Self {
        SwapperError::Store(format!("table: {}", err))
    }
}

impl From<redb::StorageError> for SwapperError {
    fn from(err: redb::StorageError) -> Self {
        SwapperError::Store(format!("storage: {}", err))
    }
}

impl From<redb::CommitError> for SwapperError {
    fn from(err: redb::CommitError) -> Self {
        SwapperError::Store(format!("commit: {}", err))
    }
}

/// Specialized error type for validation failures.
///
/// This enum provides detailed context about why a validation
/// failed, including field-specific errors and format violations.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Represents a validation failure for a specific field
    ///
    /// # Fields
    /// * `field` - The name of the field that failed validation
    /// * `message` - A detailed message about why validation failed
    #[error("Field '{field}' validation failed: {message}")]
    Field { field: String, message: String },

    /// Represents format/syntax validation failures
    #[error("Format error: {0}")]
    Format(String),

    /// Represents violations of domain constraints
    #[error("Domain constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Failure to extract the device-swap configuration from a VM description.
///
/// Both variants are non-fatal: the registry degrades the VM to an empty
/// device list and keeps going.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The description does not contain both sentinel markers in order
    ///
    /// # Fields
    /// * `description` - The untouched description text, kept for diagnostics
    #[error("Could not find start and end markers")]
    MissingMarkers { description: String },

    /// The text between the markers is not a valid swapper configuration
    ///
    /// # Fields
    /// * `message` - The parser's complaint
    /// * `block` - The text found between the markers
    #[error("Malformed swapper config: {message}")]
    MalformedConfig { message: String, block: String },
}

/// Type alias for Results that may fail with a SwapperError
pub type SwapperResult<T> = Result<T, SwapperError>;
