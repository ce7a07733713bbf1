// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pulse_cli::commands::{inspect, verify};

#[derive(Parser)]
#[command(name = "pulse")]
#[command(about = "Pulse Forensic CLI - offline checks for persisted integrity ledgers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the hash chain of a ledger snapshot
    Verify {
        snapshot_path: PathBuf,

        /// Digest algorithm the ledger was written with (sha256, blake3)
        #[arg(long, short, default_value = "sha256")]
        algorithm: String,
    },
    /// List the entries of a ledger snapshot
    Inspect {
        snapshot_path: PathBuf,

        /// Digest algorithm the ledger was written with (sha256, blake3)
        #[arg(long, short, default_value = "sha256")]
        algorithm: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Verify { snapshot_path, algorithm } => verify::run(&snapshot_path, &algorithm),
        Commands::Inspect { snapshot_path, algorithm } => inspect::run(&snapshot_path, &algorithm),
    }
}
