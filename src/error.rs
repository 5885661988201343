//! Crate-wide error taxonomy.

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Space(#[from] SpaceError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {source}")]
    Load {
        path: String,
        source: std::sync::Arc<std::io::Error>,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing required config key: {0}")]
    MissingKey(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Encrypted store / capability-handle errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("incorrect password")]
    BadPassword,

    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    #[error("unsupported algorithm or KDF profile: {0}")]
    UnsupportedAlgorithm(String),

    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("operation not permitted on a read-only store")]
    ReadOnly,

    #[error("id or file name not in this handle's allow-list: {0}")]
    NotAllowed(String),

    #[error("one-time secret {0} has already been retrieved")]
    AlreadyRetrieved(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Space membership and registry errors.
#[derive(Debug, thiserror::Error)]
pub enum SpaceError {
    #[error("space not found: {0}")]
    NotFound(String),

    #[error("already joined")]
    AlreadyJoined,

    #[error("not joined")]
    NotJoined,

    #[error("server is banned from this space")]
    Banned,

    #[error("invite is invalid or expired")]
    InvalidInvite,

    #[error("an invite is required to join this space")]
    NoInvite,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Driver contract and registry errors.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("platform mismatch: entity is for {expected}, driver is for {actual}")]
    PlatformMismatch { expected: String, actual: String },

    #[error("driver for platform {0} does not support this operation")]
    Unsupported(String),

    #[error("no driver registered for platform {0}")]
    NotRegistered(String),

    #[error("platform {0} is not on the registry allow-list")]
    NotAllowed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Filter engine errors.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("no filter registered with id {0}")]
    NotFound(String),

    #[error("invalid config value for {filter}.{key}: {reason}")]
    InvalidConfig {
        filter: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Bridge Core eligibility and lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("bridge core has not finished loading")]
    NotInitialized,

    #[error("blocked: {0}")]
    Blocked(BlockedReason),

    #[error("age-gate mismatch between origin channel and space")]
    AgeGateMismatch,
}

/// Why a `send`/`can_send` call was blocked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockedReason {
    #[error("blocked by bridge-paused directive")]
    BridgePaused,

    #[error("blocked by filter {filter_id}: {message}")]
    FilterBlocked { filter_id: String, message: String },
}
