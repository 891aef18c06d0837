mod config_file;
mod repl;
mod report;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

/// Interactive multi-core OS emulator: tick-driven scheduling, demand
/// paging, and a small process instruction language.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the key/value configuration file (generated if missing).
    #[arg(short, long, default_value = "config.txt")]
    config: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("{}", "csopesy — OS emulator".bold().blue());
    println!("Type 'initialize' to load the configuration, 'help' for commands.\n");

    repl::run(&args.config)
}
