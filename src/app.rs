// SPDX-FileCopyrightText: 2026 Sephyi <me@sephy.io>
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Commercial

use console::style;
use secrecy::SecretString;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::services::{
    analyzer::{AnalyzeOptions, AnalyzerService},
    git::GitService,
    github::Github,
    publish::{self, PublishOutcome, Publisher},
    scraper::Scraper,
    store::DataStore,
    subset,
};

pub struct App {
    cli: Cli,
    config: Config,
    cancel_token: CancellationToken,
}

impl App {
    pub fn new(cli: Cli) -> Result<Self> {
        let config = Config::load(&cli)?;
        debug!(
            data_dir = %config.data_dir.display(),
            api_url = %config.github.api_url,
            tokens = cli.tokens.len(),
            "config loaded"
        );
        let cancel_token = CancellationToken::new();
        Ok(Self {
            cli,
            config,
            cancel_token,
        })
    }

    pub async fn run(&self) -> Result<()> {
        // Ctrl+C lets running scrapes finish their current repository, a
        // second one exits. Other commands keep the default SIGINT behavior.
        if self.cli.command.observes_cancellation() {
            let cancel = self.cancel_token.clone();
            tokio::spawn(async move {
                if signal::ctrl_c().await.is_err() {
                    return;
                }
                warn!("Ctrl+C received, stopping...");
                cancel.cancel();

                if signal::ctrl_c().await.is_ok() {
                    eprintln!("Aborted.");
                    std::process::exit(130);
                }
            });
        }

        match &self.cli.command {
            Commands::FetchAndDownload => {
                let scraper = self.scraper().await?;
                scraper.fetch_and_download().await?;
                self.print_stopped_early();
                Ok(())
            }
            Commands::DownloadPoms => {
                let scraper = self.scraper().await?;
                scraper.download_files().await?;
                self.store().await?.update_csv_has_pom().await?;
                self.print_stopped_early();
                Ok(())
            }
            Commands::DownloadWorkflows => {
                let scraper = self.scraper().await?;
                let count = scraper.download_all_workflows().await?;
                self.print_info(&format!("{count} repositories have workflow files"));
                Ok(())
            }
            Commands::Analyze { effective } => {
                let store = self.store().await?;
                self.analyze(&store, *effective).await
            }
            Commands::CreateRandomSubset { n, from, out } => {
                let (n, from, out) = (*n, from.clone(), out.clone());
                self.print_status(&format!(
                    "Sampling {n} repositories from {}...",
                    from.display()
                ));
                let kept =
                    tokio::task::spawn_blocking(move || subset::create_subset(n, &from, &out))
                        .await??;
                self.print_info(&format!("Kept {kept} repositories"));
                Ok(())
            }
            Commands::ConsolidateCsv => self.store().await?.update_csv_has_pom().await,
            Commands::Refresh { effective } => {
                let scraper = self.scraper().await?;
                scraper.download_files().await?;
                if self.cancel_token.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let store = self.store().await?;
                store.update_csv_has_pom().await?;
                self.analyze(&store, *effective).await
            }
            Commands::Publish => self.publish().await,
            Commands::Init => {
                let path = Config::create_default()?;
                println!("Created config: {}", path.display());
                Ok(())
            }
            Commands::Config => {
                self.print_config();
                Ok(())
            }
            Commands::Completions { shell } => {
                let mut cmd = <Cli as clap::CommandFactory>::command();
                clap_complete::generate(*shell, &mut cmd, "pomscout", &mut std::io::stdout());
                Ok(())
            }
        }
    }

    async fn store(&self) -> Result<DataStore> {
        DataStore::open(&self.config.data_dir).await
    }

    fn tokens(&self) -> Vec<SecretString> {
        self.cli
            .tokens
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| SecretString::from(t.to_string()))
            .collect()
    }

    async fn scraper(&self) -> Result<Scraper> {
        let gh = Github::new(self.tokens(), &self.config.github)?;
        let store = self.store().await?;
        Ok(Scraper::new(
            gh,
            store,
            &self.config.github,
            self.cancel_token.clone(),
        ))
    }

    async fn analyze(&self, store: &DataStore, effective: bool) -> Result<()> {
        self.print_status("Analyzing POMs...");

        let options = AnalyzeOptions {
            effective,
            maven: self.config.analyze.maven.clone(),
        };
        let report = AnalyzerService::analyze(store, options).await?;

        report.print(self.config.analyze.top_n);
        store.write_report(&report).await?;
        store.write_error_log(&report.errors).await?;

        if !report.errors.is_empty() {
            self.print_warning(&format!(
                "{} projects failed, see {}",
                report.errors.len(),
                store.error_log_path().display()
            ));
        }

        Ok(())
    }

    async fn publish(&self) -> Result<()> {
        let cfg = &self.config.publish;

        // Both checks happen before touching the repository
        let deploy_key = publish::check_preconditions(cfg, publish::env_lookup)?;

        let git = GitService::discover()?;
        let home = directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .ok_or_else(|| Error::Config("Cannot determine home directory".into()))?;

        let publisher = Publisher::new(git, cfg.clone(), home, self.cancel_token.clone());
        match publisher.run(deploy_key).await? {
            PublishOutcome::NoChanges => {
                self.print_info("No changes to commit");
            }
            PublishOutcome::Pushed { changed } => {
                eprintln!(
                    "{} Pushed {changed} changed paths to {} ({})",
                    style("✓").green().bold(),
                    cfg.remote,
                    cfg.branch
                );
            }
        }

        Ok(())
    }

    fn print_config(&self) {
        let c = &self.config;
        println!("Data dir: {}", c.data_dir.display());
        println!();
        println!("[github]");
        println!("  api_url: {}", c.github.api_url);
        println!("  raw_url: {}", c.github.raw_url);
        println!("  user_agent: {}", c.github.user_agent);
        println!("  timeout: {}s", c.github.timeout_secs);
        println!("  rate_limit_wait: {}s", c.github.rate_limit_wait_secs);
        println!("  batch_size: {}", c.github.batch_size);
        println!("  page_interval: {}ms", c.github.page_interval_ms);
        println!("  tokens: {}", self.tokens().len());
        println!();
        println!("[analyze]");
        println!("  top_n: {}", c.analyze.top_n);
        println!("  maven: {}", c.analyze.maven);
        println!();
        println!("[publish]");
        println!("  ci_marker: {}", c.publish.ci_marker);
        println!("  deploy_key_env: {}", c.publish.deploy_key_env);
        println!("  branch: {}", c.publish.branch);
        println!("  watch_dir: {}", c.publish.watch_dir.display());
        println!("  command: {}", c.publish.command.join(" "));
        println!(
            "  author: {} <{}>",
            c.publish.author_name, c.publish.author_email
        );
        println!("  message: {}", c.publish.message);
        println!("  remote: {}", c.publish.remote);
        println!("  key_path: ~/{}", c.publish.key_path.display());
    }

    fn print_stopped_early(&self) {
        if self.cancel_token.is_cancelled() {
            self.print_warning("Stopped early, progress is saved and resumes on the next run");
        }
    }

    fn print_status(&self, msg: &str) {
        eprintln!("{} {}", style("→").cyan(), msg);
    }

    fn print_info(&self, msg: &str) {
        eprintln!("{} {}", style("info:").cyan(), msg);
    }

    fn print_warning(&self, msg: &str) {
        eprintln!("{} {}", style("warning:").yellow().bold(), msg);
    }
}
