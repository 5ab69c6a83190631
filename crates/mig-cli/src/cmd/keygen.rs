use crate::output::print_json;
use anyhow::Context;
use mig_core::io::atomic_write;
use mig_core::signature::{encode_signing_key, generate_signing_key};
use mig_core::Keyring;
use std::path::Path;

pub fn run(out: &Path, name: &str, json: bool) -> anyhow::Result<()> {
    if name.split_whitespace().count() != 1 {
        anyhow::bail!("key name must be a single word, got '{name}'");
    }
    if out.exists() {
        anyhow::bail!("refusing to overwrite existing key at {}", out.display());
    }
    let key = generate_signing_key();
    atomic_write(out, encode_signing_key(&key).as_bytes())
        .with_context(|| format!("failed to write {}", out.display()))?;

    let entry = Keyring::entry(name, &key.verifying_key());
    if json {
        print_json(&serde_json::json!({
            "key": out.display().to_string(),
            "keyring_entry": entry,
        }))
    } else {
        println!("{entry}");
        Ok(())
    }
}
