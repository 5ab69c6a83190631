use crate::output::{print_json, print_reports};
use anyhow::Context;
use mig_core::{Action, Dispatcher};
use std::path::Path;

pub fn run(file: &Path, config: &Path, json: bool) -> anyhow::Result<()> {
    let action = Action::from_file(file)
        .with_context(|| format!("failed to load action {}", file.display()))?;
    let dispatcher = Dispatcher::load(config, mig_modules::registry())
        .with_context(|| format!("failed to load agent config {}", config.display()))?;

    let reports = dispatcher.execute(&action)?;
    if json {
        print_json(&reports)?;
    } else {
        print_reports(&reports);
    }

    if reports.iter().all(|r| r.results.success) {
        Ok(())
    } else {
        anyhow::bail!("one or more operations failed")
    }
}
