//! CLI argument definitions using clap
//!
//! Commands:
//! - galaxydb init --config <path>
//! - galaxydb serve --config <path>
//! - galaxydb request --config <path> [--json <request>]
//! - galaxydb rebuild --config <path> [--index <name>]... [--concurrency <n>]
//! - galaxydb status --config <path>
//! - galaxydb generate --config <path> --count <n> [--seed <n>]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::index::IndexName;

/// galaxydb - order-statistics indexes and cursor browsing for a galaxy catalogue
#[derive(Parser, Debug)]
#[command(name = "galaxydb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the data directory and an empty dataset
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./galaxydb.json")]
        config: PathBuf,
    },

    /// Load the dataset and answer JSON requests from stdin, one per line
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./galaxydb.json")]
        config: PathBuf,
    },

    /// Answer a single JSON request and exit
    Request {
        /// Path to configuration file
        #[arg(long, default_value = "./galaxydb.json")]
        config: PathBuf,

        /// Request JSON; read from stdin when omitted
        #[arg(long)]
        json: Option<String>,
    },

    /// Clear and rebuild indexes, blocking until the run ends
    Rebuild {
        /// Path to configuration file
        #[arg(long, default_value = "./galaxydb.json")]
        config: PathBuf,

        /// Index to rebuild; repeat for several. Defaults to every index.
        #[arg(long = "index")]
        indexes: Vec<IndexName>,

        /// Stages run at once
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Print the persisted rebuild state
    Status {
        /// Path to configuration file
        #[arg(long, default_value = "./galaxydb.json")]
        config: PathBuf,
    },

    /// Write a synthetic dataset for local testing
    Generate {
        /// Path to configuration file
        #[arg(long, default_value = "./galaxydb.json")]
        config: PathBuf,

        /// Number of galaxies
        #[arg(long, default_value_t = 1_000)]
        count: usize,

        /// RNG seed for a reproducible dataset
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
