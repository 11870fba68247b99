use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cmd;
mod config;

use config::Inventory;

#[derive(Parser)]
#[command(name = "anvil", version, about = "Unattended hypervisor installation over BMC virtual media")]
struct Cli {
    /// Inventory file
    #[arg(short, long, global = true, default_value = "anvil.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build per-host installer images only
    Build,
    /// Provision hosts from previously built images
    Provision,
    /// Build images, then provision every host
    Run,
    /// Report image and reachability status per host (no BMC calls)
    Status,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let directives = format!(
        "anvil={l},anvil_common={l},anvil_image={l},anvil_bmc={l},anvil_provision={l},reqwest=warn,hyper=warn,rustls=warn",
        l = level
    );
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let inventory = Inventory::load(&cli.config)?;

    match cli.command {
        Commands::Build => cmd::build::run(&inventory).await,
        Commands::Provision => cmd::provision::run(&inventory).await,
        Commands::Run => cmd::run::run(&inventory).await,
        Commands::Status => cmd::status::run(&inventory).await,
    }
}
