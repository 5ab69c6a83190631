use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// AgentConfig
// ---------------------------------------------------------------------------

/// Settings for a node that receives and executes actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Investigator public keys, one `<name> <base64 key>` per line.
    pub keyring: PathBuf,
    /// Highest `syntaxversion` this node knows how to interpret.
    #[serde(default = "default_max_syntax_version")]
    pub max_syntax_version: i32,
    /// When set, only these modules may run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<String>>,
}

fn default_max_syntax_version() -> i32 {
    1
}

impl AgentConfig {
    pub fn new(keyring: impl Into<PathBuf>) -> Self {
        Self {
            keyring: keyring.into(),
            max_syntax_version: default_max_syntax_version(),
            modules: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let mut cfg: AgentConfig = serde_yaml::from_str(&data)?;
        // Relative keyring paths are relative to the config file.
        if cfg.keyring.is_relative() {
            if let Some(dir) = path.parent() {
                cfg.keyring = dir.join(&cfg.keyring);
            }
        }
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    pub fn allows(&self, module: &str) -> bool {
        match &self.modules {
            Some(allowed) => allowed.iter().any(|m| m == module),
            None => true,
        }
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.max_syntax_version < 1 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "max_syntax_version is {}: no action can be accepted",
                    self.max_syntax_version
                ),
            });
        }

        if self.keyring.as_os_str().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "keyring path is empty".to_string(),
            });
        }

        if let Some(modules) = &self.modules {
            if modules.is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: "modules allow-list is empty: every operation will be refused"
                        .to_string(),
                });
            }
            let mut seen = HashSet::new();
            for m in modules {
                if !seen.insert(m.as_str()) {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!("module '{m}' is listed more than once"),
                    });
                }
            }
        }

        warnings
    }
}
