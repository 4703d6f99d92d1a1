// SPDX-FileCopyrightText: 2026 Sephyi <me@sephy.io>
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Commercial

use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::GithubConfig;
use crate::domain::Repo;
use crate::error::{Error, Result};
use crate::services::github::Github;
use crate::services::store::DataStore;

/// Repositories whose workflows are downloaded concurrently
const WORKFLOW_GROUP: usize = 5;

fn glob_set(patterns: &[&str]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

pub static POM_FILES: LazyLock<GlobSet> = LazyLock::new(|| glob_set(&["**/pom.xml"]));

pub static WORKFLOW_FILES: LazyLock<GlobSet> = LazyLock::new(|| {
    glob_set(&[".github/workflows/**/*.yml", ".github/workflows/**/*.yaml"])
});

#[derive(Debug, Clone)]
pub struct Scraper {
    gh: Arc<Github>,
    store: DataStore,
    cancel: CancellationToken,
    batch_size: usize,
    page_interval: Duration,
}

impl Scraper {
    pub fn new(gh: Github, store: DataStore, config: &GithubConfig, cancel: CancellationToken) -> Self {
        Self {
            gh: Arc::new(gh),
            store,
            cancel,
            batch_size: config.batch_size,
            page_interval: Duration::from_millis(config.page_interval_ms),
        }
    }

    /// Downloads every file of `repo` accepted by `files`
    ///
    /// Returns whether the tree contained any such file. An unreachable
    /// tree (deleted or empty repository) marks the repo as fetched.
    pub async fn fetch_all_files_for(&self, repo: &Repo, files: &'static GlobSet) -> Result<bool> {
        debug!(repo = %repo.name, "fetching files");
        let tree = match self.gh.tree(repo).await {
            Ok(tree) => tree,
            Err(Error::HttpStatus { status }) => {
                self.store.mark_fetched(repo).await?;
                warn!(status, repo = %repo.name, "could not get tree");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let mut js = JoinSet::new();
        let mut has_file = false;

        for node in tree.tree.into_iter().filter(|node| files.is_match(&node.path)) {
            has_file = true;
            let gh = self.gh.clone();
            let store = self.store.clone();
            let repo = repo.clone();

            js.spawn(async move {
                let target = store.pom_path(&repo, &node.path)?;
                if tokio::fs::try_exists(&target).await? {
                    return Ok(());
                }
                let bytes = gh.download_file(&repo, &node.path).await?;
                store.write_pom(&repo, &node.path, &bytes).await
            });
        }

        while let Some(res) = js.join_next().await {
            match res? {
                Ok(()) => {}
                Err(Error::HttpStatus { status }) => {
                    warn!(status, repo = %repo.name, "could not download file");
                }
                Err(Error::InvalidPath(path)) => {
                    warn!(path = %path, repo = %repo.name, "skipping unsafe path");
                }
                Err(e) => return Err(e),
            }
        }

        self.store.mark_fetched(repo).await?;
        info!(repo = %repo.name, has_file, "fetched files");

        Ok(has_file)
    }

    /// Keeps the Java repositories among `node_ids` and stores them with their POMs
    async fn load_repositories(&self, node_ids: Vec<String>) -> Result<()> {
        debug!(count = node_ids.len(), "loading repositories");

        let graph_repos = self.gh.load_repositories(&node_ids).await?;
        for repo in graph_repos.into_iter().filter(|r| r.has_language("Java")) {
            let repo = repo.into_repo();
            let has_files = self.fetch_all_files_for(&repo, &POM_FILES).await?;

            self.store.store_repo(repo.into_csv(has_files)).await?;
        }

        Ok(())
    }

    /// Downloads POMs for all repositories in the CSV not fetched yet
    pub async fn download_files(&self) -> Result<()> {
        let repos = self.store.non_fetched_repos().await?;
        info!(count = repos.len(), "repositories left to fetch");

        for repo in repos {
            if self.cancel.is_cancelled() {
                break;
            }
            self.fetch_all_files_for(&repo.into(), &POM_FILES).await?;
        }

        Ok(())
    }

    /// Pages through all public repositories starting at the stored cursor
    pub async fn fetch_and_download(&self) -> Result<()> {
        let start = Instant::now();

        let mut to_load = Vec::with_capacity(self.batch_size);
        let mut last_id = self.store.last_id();

        loop {
            let start_page = Instant::now();
            let repos = self.gh.scrape_repositories(last_id).await?;
            let exhausted = repos.is_empty();
            let mut js = JoinSet::new();

            for repo in repos {
                last_id = last_id.max(repo.id);
                if repo.fork {
                    continue;
                }

                to_load.push(repo.node_id);

                if to_load.len() == self.batch_size {
                    let batch = std::mem::take(&mut to_load);
                    let me = self.clone();
                    js.spawn(async move { me.load_repositories(batch).await });
                }
            }

            self.store.set_last_id(last_id).await?;

            while let Some(res) = js.join_next().await {
                if let Err(e) = res? {
                    warn!(error = %e, "failed scraping batch");
                }
            }

            if exhausted || self.cancel.is_cancelled() {
                if !to_load.is_empty() {
                    self.load_repositories(std::mem::take(&mut to_load)).await?;
                }
                break;
            }

            if let Some(time) = self.page_interval.checked_sub(start_page.elapsed()) {
                sleep(time).await;
            }
        }

        info!(
            secs = start.elapsed().as_secs(),
            last_id, "finished scraping"
        );

        Ok(())
    }

    /// Downloads workflow files of every repository reported with distribution repositories
    pub async fn download_all_workflows(&self) -> Result<usize> {
        let report = self.store.read_report().await?;
        let mut count = 0;

        for group in report.has_distro_repos.chunks(WORKFLOW_GROUP) {
            if self.cancel.is_cancelled() {
                break;
            }

            let mut js = JoinSet::new();
            for dir in group {
                let repo = Repo {
                    id: String::new(),
                    name: Repo::name_from_dir(dir),
                };

                let me = self.clone();
                js.spawn(async move { me.fetch_workflow_files(&repo).await });
            }

            while let Some(next) = js.join_next().await {
                match next? {
                    Ok(true) => count += 1,
                    Ok(false) => {}
                    Err(e) => error!(error = %e, "failed fetching workflows"),
                }
            }
        }

        Ok(count)
    }

    async fn fetch_workflow_files(&self, repo: &Repo) -> Result<bool> {
        let tree = self.gh.tree(repo).await?;
        let mut js = JoinSet::new();
        let mut has_file = false;

        for node in tree
            .tree
            .into_iter()
            .filter(|node| WORKFLOW_FILES.is_match(&node.path))
        {
            has_file = true;
            let gh = self.gh.clone();
            let store = self.store.clone();
            let repo = repo.clone();

            debug!(repo = %repo.name, path = %node.path, "downloading workflow");
            js.spawn(async move {
                let bytes = gh.download_file(&repo, &node.path).await?;
                store.write_pom(&repo, &node.path, &bytes).await
            });
        }

        while let Some(res) = js.join_next().await {
            res??;
        }

        info!(repo = %repo.name, has_file, "fetched workflows");

        Ok(has_file)
    }
}
