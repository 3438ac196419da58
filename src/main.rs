use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cli;

use cli::completions::CompletionsCommand;
use cli::config::ConfigCommand;
use cli::export_cgns::ExportCgnsCommand;
use cli::list::ListCommand;

#[derive(Parser)]
#[command(name = "cfdbox")]
#[command(about = "Tools for staging and exporting CFD simulation results", long_about = None)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    ExportCgns(ExportCgnsCommand),
    List(ListCommand),
    Config(ConfigCommand),
    Completions(CompletionsCommand),
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.target(),
                &record.level().as_str()[..1],
                record.args()
            )
        })
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Commands::ExportCgns(cmd) => cmd.execute(config_path.as_deref()),
        Commands::List(cmd) => cmd.execute(),
        Commands::Config(cmd) => cmd.execute(config_path.as_deref()),
        Commands::Completions(cmd) => cmd.execute(),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
