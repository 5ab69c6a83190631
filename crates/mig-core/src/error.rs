use chrono::{DateTime, Utc};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// Structural or temporal defect that makes an action untrustworthy.
///
/// Each variant maps to exactly one check run by `Action::validate`, so the
/// first failing check is always reported on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Action.Name is empty: expecting a non-empty string")]
    EmptyName,

    #[error("Action.Target is empty: expecting a non-empty string")]
    EmptyTarget,

    #[error("Action.SyntaxVersion is {0}: expecting an integer >= 1")]
    SyntaxVersion(i32),

    #[error("Action.ValidFrom is not set: expecting a timestamp")]
    MissingValidFrom,

    #[error("Action.ExpireAfter is not set: expecting a timestamp")]
    MissingExpireAfter,

    #[error("Action.ExpireAfter ({expire_after}) is set before Action.ValidFrom ({valid_from})")]
    InvertedWindow {
        valid_from: DateTime<Utc>,
        expire_after: DateTime<Utc>,
    },

    #[error("Action.ExpireAfter ({0}) has passed: action has expired")]
    Expired(DateTime<Utc>),

    #[error("Action.Operations is nil: expecting a list of operations")]
    MissingOperations,

    #[error("Action.PGPSignature is empty: expecting an armored signature")]
    EmptySignature,
}

impl ValidationError {
    /// Wire name of the field the check applies to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::EmptyName => "name",
            Self::EmptyTarget => "target",
            Self::SyntaxVersion(_) => "syntaxversion",
            Self::MissingValidFrom => "validfrom",
            Self::MissingExpireAfter | Self::InvertedWindow { .. } | Self::Expired(_) => {
                "expireafter"
            }
            Self::MissingOperations => "operations",
            Self::EmptySignature => "pgpsignature",
        }
    }
}

// ---------------------------------------------------------------------------
// VerificationError
// ---------------------------------------------------------------------------

/// Authentication failure. `InvalidSignature` is a definitive verdict from the
/// verification primitive; `Mechanism` means no verdict could be reached.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("failed to canonicalize action: {0}")]
    Canonicalize(#[source] serde_json::Error),

    #[error("invalid action signature")]
    InvalidSignature,

    #[error("signature verification failed: {0}")]
    Mechanism(String),
}

// ---------------------------------------------------------------------------
// ModuleError
// ---------------------------------------------------------------------------

/// Fatal module input error. A module returning one of these has not touched
/// any target.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("malformed module parameters: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("in '{name}', '{value}' {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("failed to encode module results: {0}")]
    Encode(#[source] serde_json::Error),
}

// ---------------------------------------------------------------------------
// TrackerError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("action {0} is already finalized")]
    Finalized(u64),

    #[error("command {0} was never dispatched for this action")]
    UnknownCommand(u64),

    #[error("command {0} already reported a result")]
    AlreadyResolved(u64),

    #[error("command {0} was already dispatched")]
    DuplicateCommand(u64),
}

// ---------------------------------------------------------------------------
// MigError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MigError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("invalid agent config: {0}")]
    Config(String),

    #[error("unsupported syntax version {version}: this node interprets up to {max}")]
    UnsupportedSyntax { version: i32, max: i32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MigError>;
