// SPDX-FileCopyrightText: 2026 Sephyi <me@sephy.io>
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Commercial

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "pomscout")]
#[command(version)]
#[command(about = "Scrape and analyze Maven build files of public GitHub repositories", long_about = None)]
pub struct Cli {
    /// The data directory to analyze or download into
    #[arg(short, long = "data", global = true, env = "POMSCOUT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// GitHub tokens, rotated when one hits its rate limit
    #[arg(
        long = "token",
        global = true,
        env = "GH_TOKENS",
        value_delimiter = ',',
        hide_env_values = true
    )]
    pub tokens: Vec<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Page through all GitHub repositories, keep the Java ones and download their POMs
    FetchAndDownload,
    /// Download POMs (recursively) for every repository in github.csv not fetched yet
    DownloadPoms,
    /// Download the GitHub workflow files of repositories with distribution repositories
    DownloadWorkflows,
    /// Analyze the (effective) POMs of every downloaded project
    Analyze {
        /// Create effective POMs with Maven (~2s per POM)
        #[arg(long)]
        effective: bool,
    },
    /// Copy a reproducible random sample of a data directory
    CreateRandomSubset {
        /// Number of repositories to keep
        n: usize,
        /// Source data directory
        from: PathBuf,
        /// Destination data directory
        out: PathBuf,
    },
    /// Update the has_pom column of github.csv from the filesystem
    ConsolidateCsv,
    /// Download missing POMs, consolidate the CSV and write a fresh report
    #[command(alias = "data")]
    Refresh {
        /// Create effective POMs with Maven
        #[arg(long)]
        effective: bool,
    },
    /// Commit and push a refreshed dataset from CI
    Publish,
    /// Initialize config file
    Init,
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

impl Commands {
    /// Whether the command stops cleanly on the first Ctrl+C
    pub fn observes_cancellation(&self) -> bool {
        matches!(
            self,
            Commands::FetchAndDownload
                | Commands::DownloadPoms
                | Commands::DownloadWorkflows
                | Commands::Refresh { .. }
                | Commands::Publish
        )
    }
}
