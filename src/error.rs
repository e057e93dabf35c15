use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty label in DNS name")]
    EmptyLabel,

    #[error("Invalid label length: {0}")]
    InvalidLabelLength(usize),

    #[error("DNS name too long")]
    NameTooLong,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid NSEC3 iteration limit: {0}")]
    InvalidIterationLimit(String),

    #[error("Invalid task limit: {0}")]
    InvalidTaskLimit(String),

    #[error("Invalid domain name: {0}")]
    InvalidName(String),

    #[error("Invalid trust anchor for {name}: {reason}")]
    InvalidTrustAnchor { name: String, reason: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Errors returned by the validator API. Validation verdicts are never
/// reported through this type; they arrive through the completion callback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidatorError {
    #[error("Invalid validation request: {0}")]
    InvalidRequest(&'static str),

    #[error("Too many active validation tasks (limit {0})")]
    TooManyTasks(usize),

    #[error("Unknown validation task {0}")]
    UnknownTask(u64),

    #[error("Validation task {0} was already started")]
    AlreadyStarted(u64),

    #[error("Validator has shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, DnsError>;
