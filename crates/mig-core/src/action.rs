//! Action data model.
//!
//! An `Action` is the unit of investigative work: metadata, a validity
//! window, and an ordered list of module operations. It is signed once by the
//! investigator and is read-only from then on; any change requires a new
//! signature.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

use crate::error::{Result, ValidationError, VerificationError};
use crate::signature::{SignatureVerifier, Verification};

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Placeholder for a timestamp that was never set (`0001-01-01T00:00:00Z`).
pub fn unset_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn is_unset(ts: &DateTime<Utc>) -> bool {
    *ts <= unset_time()
}

/// Rendering used inside the canonical form. Frozen for syntax version 1.
pub fn canonical_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

// ---------------------------------------------------------------------------
// Description / Threat
// ---------------------------------------------------------------------------

/// Author and revision details. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Description {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub revision: i64,
}

/// How dangerous the compromise is if the indicators come back positive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Threat {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub family: String,
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// Module-specific arguments, carried through the action layer untouched.
///
/// The target module owns the schema; nothing here looks inside the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationParameters(serde_json::Value);

impl OperationParameters {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Raw bytes handed to the module's `run` entry point.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.0)?)
    }
}

/// One (module, parameters) pair inside an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub module: String,
    #[serde(default)]
    pub parameters: OperationParameters,
}

impl Operation {
    pub fn new(module: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            module: module.into(),
            parameters: OperationParameters::new(parameters),
        }
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// Fleet-selection expression, interpreted by the dispatch layer.
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub description: Description,
    #[serde(default)]
    pub threat: Threat,
    #[serde(rename = "validfrom", default = "unset_time")]
    pub valid_from: DateTime<Utc>,
    #[serde(rename = "expireafter", default = "unset_time")]
    pub expire_after: DateTime<Utc>,
    /// `None` encodes a missing/null list, which never validates.
    #[serde(default)]
    pub operations: Option<Vec<Operation>>,
    #[serde(rename = "pgpsignature", default)]
    pub pgp_signature: String,
    #[serde(rename = "pgpsignaturedate", default = "unset_time")]
    pub pgp_signature_date: DateTime<Utc>,
    #[serde(rename = "syntaxversion", default)]
    pub syntax_version: i32,
}

impl Action {
    /// Create an unsigned action at syntax version 1.
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        valid_from: DateTime<Utc>,
        expire_after: DateTime<Utc>,
        operations: Vec<Operation>,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            target: target.into(),
            description: Description::default(),
            threat: Threat::default(),
            valid_from,
            expire_after,
            operations: Some(operations),
            pgp_signature: String::new(),
            pgp_signature_date: unset_time(),
            syntax_version: 1,
        }
    }

    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Read and decode an action stored as JSON on the local filesystem.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_slice(&data)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Operations as a slice; empty when the list is missing.
    pub fn operations(&self) -> &[Operation] {
        self.operations.as_deref().unwrap_or(&[])
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Run every structural and temporal check against the current time.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        self.validate_at(Utc::now())
    }

    /// Same as [`Action::validate`] with an explicit clock.
    ///
    /// Checks run in a fixed order and the first failure is returned alone.
    pub fn validate_at(&self, now: DateTime<Utc>) -> std::result::Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.target.is_empty() {
            return Err(ValidationError::EmptyTarget);
        }
        if self.syntax_version < 1 {
            return Err(ValidationError::SyntaxVersion(self.syntax_version));
        }
        if is_unset(&self.valid_from) {
            return Err(ValidationError::MissingValidFrom);
        }
        if is_unset(&self.expire_after) {
            return Err(ValidationError::MissingExpireAfter);
        }
        if self.valid_from > self.expire_after {
            return Err(ValidationError::InvertedWindow {
                valid_from: self.valid_from,
                expire_after: self.expire_after,
            });
        }
        if now > self.expire_after {
            return Err(ValidationError::Expired(self.expire_after));
        }
        if self.operations.is_none() {
            return Err(ValidationError::MissingOperations);
        }
        if self.pgp_signature.is_empty() {
            return Err(ValidationError::EmptySignature);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Canonical form
    // -----------------------------------------------------------------------

    /// Deterministic string that investigators sign and nodes verify.
    ///
    /// Layout (syntax version 1):
    /// `name=<n>; target=<t>; validfrom=<ts>; expireafter=<ts>; operations=<json>;`
    ///
    /// Timestamps are RFC 3339 in UTC with nanosecond precision. Operations are
    /// compact JSON with object keys in sorted order.
    pub fn canonical_string(&self) -> std::result::Result<String, serde_json::Error> {
        let operations = serde_json::to_string(&self.operations)?;
        Ok(format!(
            "name={}; target={}; validfrom={}; expireafter={}; operations={};",
            self.name,
            self.target,
            canonical_time(&self.valid_from),
            canonical_time(&self.expire_after),
            operations
        ))
    }

    /// Check `pgp_signature` against the canonical form using keys read from
    /// `keyring`.
    pub fn verify_signature(
        &self,
        keyring: &mut dyn Read,
        verifier: &dyn SignatureVerifier,
    ) -> std::result::Result<Verification, VerificationError> {
        crate::signature::verify_action(self, keyring, verifier)
    }
}
