//! Shared contract for investigation modules.
//!
//! A module decodes untrusted parameters into its own typed schema, applies
//! its domain checks, then runs against every target and reports each
//! outcome in a [`ModuleResults`] envelope. Input errors are fatal to the
//! call and abort before any target is touched; per-target failures are
//! recorded in the envelope and only clear the `success` flag.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::ModuleError;

// ---------------------------------------------------------------------------
// ModuleResults
// ---------------------------------------------------------------------------

/// Self-describing result envelope returned by every module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleResults {
    pub success: bool,
    /// Logical name → target → status or error message.
    #[serde(default)]
    pub results: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModuleResults {
    /// Empty envelope. `success` starts true and is cleared by the first
    /// failed target.
    pub fn new() -> Self {
        Self {
            success: true,
            results: BTreeMap::new(),
            error: None,
        }
    }

    /// Envelope for a call that never reached its targets.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            results: BTreeMap::new(),
            error: Some(error.into()),
        }
    }

    /// Record the outcome for one target under a logical name.
    pub fn record(&mut self, name: &str, target: impl Into<String>, outcome: Result<String, String>) {
        let status = match outcome {
            Ok(status) => status,
            Err(e) => {
                self.success = false;
                e
            }
        };
        self.results
            .entry(name.to_string())
            .or_default()
            .insert(target.into(), status);
    }

    pub fn from_slice(raw: &[u8]) -> Result<Self, ModuleError> {
        serde_json::from_slice(raw).map_err(ModuleError::Decode)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, ModuleError> {
        serde_json::to_vec(self).map_err(ModuleError::Encode)
    }
}

impl Default for ModuleResults {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// Typed side of the contract, implemented by each module.
pub trait Module: Send + Sync {
    type Parameters: DeserializeOwned;

    /// Name used in `Operation::module`.
    fn name(&self) -> &'static str;

    /// Domain checks on decoded parameters.
    fn check(&self, params: &Self::Parameters) -> Result<(), ModuleError>;

    /// Act on every target. Never aborts early: each target's outcome is
    /// recorded in the returned envelope.
    fn execute(&self, params: Self::Parameters) -> ModuleResults;

    /// Decode raw bytes and run the domain checks.
    fn validate_parameters(&self, raw: &[u8]) -> Result<Self::Parameters, ModuleError> {
        let params: Self::Parameters = serde_json::from_slice(raw).map_err(ModuleError::Decode)?;
        self.check(&params)?;
        Ok(params)
    }
}

/// Object-safe entry point: raw parameter bytes in, serialized results out.
pub trait Runner: Send + Sync {
    fn run(&self, raw: &[u8]) -> Result<Vec<u8>, ModuleError>;
}

impl<M: Module> Runner for M {
    fn run(&self, raw: &[u8]) -> Result<Vec<u8>, ModuleError> {
        let params = self.validate_parameters(raw).map_err(|e| {
            warn!(module = self.name(), error = %e, "module input rejected");
            e
        })?;
        self.execute(params).to_vec()
    }
}

// ---------------------------------------------------------------------------
// ModuleRegistry
// ---------------------------------------------------------------------------

/// Name → module lookup, populated at process start.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Box<dyn Runner>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `module` under its own name, replacing any previous entry.
    pub fn register<M: Module + 'static>(&mut self, module: M) {
        self.modules
            .insert(module.name().to_string(), Box::new(module));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Runner> {
        self.modules.get(name).map(|m| m.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.modules.keys()).finish()
    }
}
