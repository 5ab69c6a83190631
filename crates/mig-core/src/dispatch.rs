//! Receiving-node pipeline.
//!
//! An action is executed only after it passes, in order: the syntax-version
//! gate, structural validation, and signature verification. Each operation is
//! then handed to the named module and its result envelope collected. A fatal
//! module error fails that operation only; the remaining operations still run.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::action::Action;
use crate::config::{AgentConfig, WarnLevel};
use crate::error::{MigError, Result};
use crate::module::{ModuleRegistry, ModuleResults};
use crate::signature::{Ed25519Verifier, SignatureVerifier, Verification};

/// Result of one operation inside an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationReport {
    pub module: String,
    #[serde(flatten)]
    pub results: ModuleResults,
}

pub struct Dispatcher {
    config: AgentConfig,
    registry: ModuleRegistry,
    verifier: Box<dyn SignatureVerifier>,
    keyring: Vec<u8>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        config: AgentConfig,
        registry: ModuleRegistry,
        verifier: Box<dyn SignatureVerifier>,
        keyring: Vec<u8>,
    ) -> Self {
        Self {
            config,
            registry,
            verifier,
            keyring,
        }
    }

    /// Build a dispatcher using the Ed25519 verifier and the keyring file
    /// named in `config`. Refuses a config with error-level warnings.
    pub fn from_config(config: AgentConfig, registry: ModuleRegistry) -> Result<Self> {
        let mut errors = Vec::new();
        for w in config.validate() {
            match w.level {
                WarnLevel::Warning => warn!(message = %w.message, "agent config warning"),
                WarnLevel::Error => errors.push(w.message),
            }
        }
        if !errors.is_empty() {
            return Err(MigError::Config(errors.join("; ")));
        }
        let keyring = std::fs::read(&config.keyring)?;
        Ok(Self::new(config, registry, Box::new(Ed25519Verifier), keyring))
    }

    /// Load the config file, then build the dispatcher from it.
    pub fn load(config_path: &Path, registry: ModuleRegistry) -> Result<Self> {
        Self::from_config(AgentConfig::load(config_path)?, registry)
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Decide whether `action` may be trusted.
    pub fn authenticate(&self, action: &Action) -> Result<Verification> {
        if action.syntax_version > self.config.max_syntax_version {
            warn!(
                action_id = action.id,
                version = action.syntax_version,
                "unsupported syntax version"
            );
            return Err(MigError::UnsupportedSyntax {
                version: action.syntax_version,
                max: self.config.max_syntax_version,
            });
        }
        if let Err(e) = action.validate() {
            warn!(action_id = action.id, field = e.field(), reason = %e, "action rejected");
            return Err(e.into());
        }
        let verification = action.verify_signature(&mut self.keyring.as_slice(), &*self.verifier)?;
        Ok(verification)
    }

    /// Authenticate `action`, then run each of its operations in order.
    pub fn execute(&self, action: &Action) -> Result<Vec<OperationReport>> {
        let verification = self.authenticate(action)?;
        info!(
            action_id = action.id,
            name = %action.name,
            signer = verification.signer.as_deref().unwrap_or("unknown"),
            operations = action.operations().len(),
            "executing action"
        );

        let reports = action
            .operations()
            .iter()
            .map(|op| {
                let results = self.run_operation(&op.module, || op.parameters.to_bytes());
                info!(
                    action_id = action.id,
                    module = %op.module,
                    success = results.success,
                    "operation finished"
                );
                OperationReport {
                    module: op.module.clone(),
                    results,
                }
            })
            .collect();
        Ok(reports)
    }

    fn run_operation(
        &self,
        module: &str,
        parameters: impl FnOnce() -> Result<Vec<u8>>,
    ) -> ModuleResults {
        if !self.config.allows(module) {
            return ModuleResults::failed(format!("module '{module}' is not enabled on this node"));
        }
        let Some(runner) = self.registry.get(module) else {
            return ModuleResults::failed(format!("unknown module '{module}'"));
        };
        let raw = match parameters() {
            Ok(raw) => raw,
            Err(e) => return ModuleResults::failed(e.to_string()),
        };
        match runner.run(&raw) {
            Ok(out) => ModuleResults::from_slice(&out)
                .unwrap_or_else(|e| ModuleResults::failed(e.to_string())),
            Err(e) => ModuleResults::failed(e.to_string()),
        }
    }
}
