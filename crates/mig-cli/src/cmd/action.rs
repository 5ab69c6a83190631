use crate::output::print_json;
use anyhow::Context;
use chrono::{Duration, Utc};
use clap::Subcommand;
use mig_core::io::atomic_write;
use mig_core::signature::{decode_signing_key, sign_action};
use mig_core::{Action, Ed25519Verifier, IdGenerator, Operation};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ActionSubcommand {
    /// Write a new unsigned action with a single operation
    New {
        /// Destination file
        out: PathBuf,
        #[arg(long)]
        name: String,
        /// Fleet-selection expression
        #[arg(long)]
        target: String,
        /// Module the operation runs
        #[arg(long)]
        module: String,
        /// Module parameters as JSON
        #[arg(long, default_value = "{}")]
        parameters: String,
        /// Hours until the action expires
        #[arg(long, default_value = "1")]
        hours: i64,
    },

    /// Check an action's fields and validity window
    Validate { file: PathBuf },

    /// Print the canonical string that gets signed
    Canonical { file: PathBuf },

    /// Sign an action in place
    Sign {
        file: PathBuf,
        /// Secret key written by `mig keygen`
        #[arg(long)]
        key: PathBuf,
    },

    /// Validate an action and verify its signature
    Verify {
        file: PathBuf,
        /// Keyring of investigator public keys
        #[arg(long, env = "MIG_KEYRING")]
        keyring: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(subcmd: ActionSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ActionSubcommand::New {
            out,
            name,
            target,
            module,
            parameters,
            hours,
        } => new(&out, name, target, module, &parameters, hours, json),
        ActionSubcommand::Validate { file } => validate(&file, json),
        ActionSubcommand::Canonical { file } => canonical(&file),
        ActionSubcommand::Sign { file, key } => sign(&file, &key, json),
        ActionSubcommand::Verify { file, keyring } => verify(&file, &keyring, json),
    }
}

fn load(file: &Path) -> anyhow::Result<Action> {
    Action::from_file(file).with_context(|| format!("failed to load action {}", file.display()))
}

fn save(file: &Path, action: &Action) -> anyhow::Result<()> {
    atomic_write(file, action.to_json_pretty()?.as_bytes())
        .with_context(|| format!("failed to write {}", file.display()))
}

// ---------------------------------------------------------------------------
// new
// ---------------------------------------------------------------------------

fn new(
    out: &Path,
    name: String,
    target: String,
    module: String,
    parameters: &str,
    hours: i64,
    json: bool,
) -> anyhow::Result<()> {
    let parameters: serde_json::Value =
        serde_json::from_str(parameters).context("--parameters is not valid JSON")?;
    let now = Utc::now();
    let Some(expire_after) = Duration::try_hours(hours).and_then(|d| now.checked_add_signed(d))
    else {
        anyhow::bail!("--hours {hours} is out of range");
    };
    let mut action = Action::new(
        name,
        target,
        now,
        expire_after,
        vec![Operation::new(module, parameters)],
    );
    action.id = IdGenerator::new().generate();
    save(out, &action)?;

    if json {
        print_json(&serde_json::json!({ "id": action.id, "file": out.display().to_string() }))
    } else {
        println!("created action {} at {}", action.id, out.display());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// validate / canonical
// ---------------------------------------------------------------------------

fn validate(file: &Path, json: bool) -> anyhow::Result<()> {
    let action = load(file)?;
    let outcome = action.validate();
    if json {
        print_json(&serde_json::json!({
            "id": action.id,
            "valid": outcome.is_ok(),
            "field": outcome.as_ref().err().map(|e| e.field()),
            "reason": outcome.as_ref().err().map(|e| e.to_string()),
        }))?;
    }
    outcome.context("action is invalid")?;
    if !json {
        println!("action {} is valid", action.id);
    }
    Ok(())
}

fn canonical(file: &Path) -> anyhow::Result<()> {
    let action = load(file)?;
    println!("{}", action.canonical_string()?);
    Ok(())
}

// ---------------------------------------------------------------------------
// sign / verify
// ---------------------------------------------------------------------------

fn sign(file: &Path, key: &Path, json: bool) -> anyhow::Result<()> {
    let mut action = load(file)?;
    let encoded = std::fs::read_to_string(key)
        .with_context(|| format!("failed to read key {}", key.display()))?;
    let key = decode_signing_key(&encoded)?;
    sign_action(&mut action, &key)?;
    save(file, &action)?;

    if json {
        print_json(&serde_json::json!({
            "id": action.id,
            "pgpsignaturedate": action.pgp_signature_date,
        }))
    } else {
        println!("signed action {}", action.id);
        Ok(())
    }
}

fn verify(file: &Path, keyring: &Path, json: bool) -> anyhow::Result<()> {
    let action = load(file)?;
    action.validate().context("action is invalid")?;

    let mut reader = std::fs::File::open(keyring)
        .with_context(|| format!("failed to open keyring {}", keyring.display()))?;
    let verification = action
        .verify_signature(&mut reader, &Ed25519Verifier)
        .context("action is not authentic")?;
    let signer = verification.signer.unwrap_or_else(|| "unknown".to_string());

    if json {
        print_json(&serde_json::json!({ "id": action.id, "authentic": true, "signer": signer }))
    } else {
        println!("action {} is authentic (signed by {signer})", action.id);
        Ok(())
    }
}
