use std::path::PathBuf;

use clap::Parser;

/// Woda bridge host: serves the native capability objects to a page over
/// stdio, one JSON frame per line.
#[derive(Parser, Debug)]
#[command(name = "woda", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Sandbox base directory, overriding `[filesystem] base_path`.
    #[arg(long)]
    pub base_path: Option<PathBuf>,

    /// Log filter directive (e.g. `woda=debug`).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print the page bootstrap script and exit.
    #[arg(long)]
    pub print_init_script: bool,
}

pub fn parse() -> Args {
    Args::parse()
}
