use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "small-ingest")]
#[command(about = "Fetch batch files, load them into a PostgreSQL table and archive them")]
#[command(version)]
pub struct CliArgs {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Log memory and CPU usage per phase")]
    pub monitor: bool,

    #[arg(long, help = "Validate the configuration and print the plan without running")]
    pub dry_run: bool,
}
