//! Error types for change tracking

use thiserror::Error;

/// Errors that can occur while recording or replaying changes
///
/// Usage mistakes such as undoing with an empty history are not errors; those
/// calls are no-ops. Every variant here signals a broken invariant in the code
/// driving the engine.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// A changeset was started while another one was still open
    #[error("Changeset already open: {0}")]
    ChangesetAlreadyOpen(String),

    /// A record was appended to a changeset that is already committed
    #[error("Changeset is sealed: {0}")]
    ChangesetSealed(String),

    /// The owner does not expose the requested property
    #[error("Unknown property '{property}' on {owner}")]
    UnknownProperty {
        /// Type name of the owner
        owner: String,
        /// Property key that failed to resolve
        property: String,
    },

    /// The owner refused the value written to a property
    #[error("Invalid value for '{property}': {reason}")]
    InvalidValue {
        /// Property key being written
        property: String,
        /// Why the value was rejected
        reason: String,
    },

    /// The object or collection a record points at no longer exists
    #[error("Change target dropped: {0}")]
    TargetDropped(String),

    /// A collection position was out of range
    #[error("Index {index} out of range for collection of length {len}")]
    InvalidIndex {
        /// Requested position
        index: usize,
        /// Collection length at the time of the request
        len: usize,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackingError {
    /// Create a new UnknownProperty error
    pub fn unknown_property(owner: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            owner: owner.into(),
            property: property.into(),
        }
    }

    /// Create a new InvalidValue error
    pub fn invalid_value(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            property: property.into(),
            reason: reason.into(),
        }
    }

    /// Create a new TargetDropped error
    pub fn target_dropped(what: impl Into<String>) -> Self {
        Self::TargetDropped(what.into())
    }

    /// Create a new Config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type used across the crate
pub type Result<T> = std::result::Result<T, TrackingError>;
