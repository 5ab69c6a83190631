//! Investigation modules run by mig agents.
//!
//! Every module implements [`mig_core::Module`]. [`registry`] returns the
//! catalog an agent loads at start-up.

pub mod pidkill;

use mig_core::ModuleRegistry;

/// Registry holding every module built into this crate.
pub fn registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register(pidkill::PidKill::new());
    registry
}
