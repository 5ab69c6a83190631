//! Trust and dispatch core for mig.
//!
//! An investigator builds an [`Action`], signs its canonical form and ships it
//! to the fleet. A receiving node validates it, verifies the signature, then
//! hands each [`Operation`] to the named module through the [`Module`]
//! contract. The dispatching side follows per-agent outcomes with an
//! [`ActionTracker`].

pub mod action;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod extended;
pub mod id;
pub mod io;
pub mod module;
pub mod signature;

pub use action::{Action, Description, Operation, OperationParameters, Threat};
pub use config::AgentConfig;
pub use dispatch::{Dispatcher, OperationReport};
pub use error::{MigError, ModuleError, Result, TrackerError, ValidationError, VerificationError};
pub use extended::{ActionTracker, CommandOutcome, Counters, ExtendedAction, TrackingStatus};
pub use id::IdGenerator;
pub use module::{Module, ModuleRegistry, ModuleResults, Runner};
pub use ed25519_dalek::SigningKey;
pub use signature::{Ed25519Verifier, Keyring, SignatureVerifier, Verification};
