use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use mig_core::config::WarnLevel;
use mig_core::AgentConfig;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Check an agent config for common mistakes
    Validate {
        /// Agent configuration (YAML)
        #[arg(long, env = "MIG_CONFIG")]
        config: PathBuf,
    },
}

pub fn run(subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Validate { config } => validate(&config, json),
    }
}

fn validate(path: &Path, json: bool) -> anyhow::Result<()> {
    let config = AgentConfig::load(path)
        .with_context(|| format!("failed to load agent config {}", path.display()))?;
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("config is valid");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
