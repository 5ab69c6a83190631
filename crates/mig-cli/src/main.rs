mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::{action::ActionSubcommand, config::ConfigSubcommand, module::ModuleSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "mig",
    about = "Sign, verify and execute mig investigation actions",
    version,
    propagate_version = true
)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh action identifier
    Id {
        /// Render the identifier in radix 32
        #[arg(long)]
        base32: bool,
    },

    /// Generate an investigator signing key
    Keygen {
        /// Where to write the secret key
        #[arg(long)]
        out: PathBuf,
        /// Key name recorded in the keyring line
        #[arg(long)]
        name: String,
    },

    /// Validate, sign and verify action files
    Action {
        #[command(subcommand)]
        subcommand: ActionSubcommand,
    },

    /// Inspect agent configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Run a module directly against raw parameters
    Module {
        #[command(subcommand)]
        subcommand: ModuleSubcommand,
    },

    /// Authenticate an action and run all of its operations
    Exec {
        /// Action file (JSON)
        file: PathBuf,
        /// Agent configuration (YAML)
        #[arg(long, env = "MIG_CONFIG")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Id { base32 } => cmd::id::run(base32, cli.json),
        Commands::Keygen { out, name } => cmd::keygen::run(&out, &name, cli.json),
        Commands::Action { subcommand } => cmd::action::run(subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(subcommand, cli.json),
        Commands::Module { subcommand } => cmd::module::run(subcommand, cli.json),
        Commands::Exec { file, config } => cmd::exec::run(&file, &config, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
