// SPDX-License-Identifier: MIT

//! `svctl`: a thin command-line client for `supervisord`'s control socket.

mod client;
mod commands;
mod output;

use clap::Parser;
use commands::Command;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "svctl", about = "Control supervisord-managed apps")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    output: OutputFormat,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = commands::run(cli.command, cli.output).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
