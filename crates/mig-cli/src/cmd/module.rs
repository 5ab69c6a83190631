use clap::Subcommand;

#[derive(Subcommand)]
pub enum ModuleSubcommand {
    /// List available modules
    List,

    /// Run a module and print its result envelope
    Run {
        /// Module name
        name: String,
        /// Parameters as JSON
        parameters: String,
    },
}

pub fn run(subcmd: ModuleSubcommand, json: bool) -> anyhow::Result<()> {
    let registry = mig_modules::registry();
    match subcmd {
        ModuleSubcommand::List => {
            let names: Vec<&str> = registry.names().collect();
            if json {
                crate::output::print_json(&names)?;
            } else {
                for name in names {
                    println!("{name}");
                }
            }
            Ok(())
        }
        ModuleSubcommand::Run { name, parameters } => {
            let runner = registry
                .get(&name)
                .ok_or_else(|| anyhow::anyhow!("unknown module '{name}'"))?;
            let out = runner.run(parameters.as_bytes())?;
            // The envelope is already JSON; print it verbatim either way.
            println!("{}", String::from_utf8_lossy(&out));
            Ok(())
        }
    }
}
