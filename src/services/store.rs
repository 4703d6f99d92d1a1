// SPDX-FileCopyrightText: 2026 Sephyi <me@sephy.io>
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Commercial

//! On-disk layout of a data directory.
//!
//! ```text
//! data/
//!   state.json           scrape cursor
//!   github.csv           id,name,has_pom
//!   fetched              ids whose files were downloaded, one per line
//!   poms/<owner.repo>/   downloaded files, mirroring the repository tree
//!   report.json          last analysis report
//!   analyzer_errors.log  projects that failed to analyze, one per line
//! ```

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::iter::{ParallelBridge, ParallelIterator};
use serde::{Deserialize, Serialize};
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

use crate::domain::{CsvRepo, Repo, Report};
use crate::error::{Error, Result};

const STATE_FILE: &str = "state.json";
const CSV_FILE: &str = "github.csv";
const FETCHED_FILE: &str = "fetched";
const POM_DIR: &str = "poms";
const REPORT_FILE: &str = "report.json";
const ERROR_LOG_FILE: &str = "analyzer_errors.log";

#[derive(Debug, Serialize, Deserialize)]
struct State {
    last_id: Forges,
}

#[derive(Debug, Serialize, Deserialize)]
struct Forges {
    github: usize,
}

#[derive(Debug, Clone)]
pub struct DataStore {
    base_dir: PathBuf,
    pom_dir: PathBuf,
    github_csv: PathBuf,
    fetched: PathBuf,

    state_cache: Arc<AtomicUsize>,
    state_path: PathBuf,
    state_file_lock: Arc<Mutex<()>>,

    csv_lock: Arc<Mutex<()>>,
    fetched_lock: Arc<Mutex<()>>,
}

fn lock(mutex: &Mutex<()>) -> MutexGuard<'_, ()> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DataStore {
    pub async fn open(base_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(base_dir).await?;

        let state_path = base_dir.join(STATE_FILE);
        let state_cache = Arc::new(AtomicUsize::new(0));
        if tokio::fs::try_exists(&state_path).await? {
            let data = tokio::fs::read(&state_path).await?;
            let state: State = serde_json::from_slice(&data)?;
            state_cache.store(state.last_id.github, Ordering::SeqCst);
        }

        let fetched = base_dir.join(FETCHED_FILE);
        if !tokio::fs::try_exists(&fetched).await? {
            tokio::fs::File::create(&fetched).await?;
        }

        debug!(dir = %base_dir.display(), last_id = state_cache.load(Ordering::SeqCst), "data store opened");

        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            pom_dir: base_dir.join(POM_DIR),
            github_csv: base_dir.join(CSV_FILE),
            fetched,
            state_cache,
            state_path,
            state_file_lock: Default::default(),
            csv_lock: Default::default(),
            fetched_lock: Default::default(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn pom_dir(&self) -> &Path {
        &self.pom_dir
    }

    pub fn csv_path(&self) -> &Path {
        &self.github_csv
    }

    pub fn report_path(&self) -> PathBuf {
        self.base_dir.join(REPORT_FILE)
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.base_dir.join(ERROR_LOG_FILE)
    }

    /// Local path of `path` (relative to the repository root) of `repo`
    pub fn pom_path(&self, repo: &Repo, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(Error::InvalidPath(path.to_string()));
        }
        Ok(self.pom_dir.join(repo.path()).join(relative))
    }

    pub async fn write_pom(&self, repo: &Repo, path: &str, bytes: &[u8]) -> Result<()> {
        let file_path = self.pom_path(repo, path)?;
        let parent = file_path
            .parent()
            .ok_or_else(|| Error::InvalidPath(format!("{path} has no parent")))?;
        tokio::fs::create_dir_all(parent).await?;
        tokio::fs::write(file_path, bytes).await?;

        Ok(())
    }

    pub fn last_id(&self) -> usize {
        self.state_cache.load(Ordering::SeqCst)
    }

    pub async fn set_last_id(&self, id: usize) -> Result<()> {
        self.state_cache.store(id, Ordering::SeqCst);

        let lock_handle = self.state_file_lock.clone();
        let state_path = self.state_path.clone();
        spawn_blocking(move || -> Result<()> {
            let _guard = lock(&lock_handle);

            let mut file = BufWriter::new(File::create(state_path)?);
            serde_json::to_writer_pretty(
                &mut file,
                &State {
                    last_id: Forges { github: id },
                },
            )?;
            file.write_all(b"\n")?;
            file.flush()?;

            Ok(())
        })
        .await?
    }

    /// Append a row to `github.csv`, writing the header only when creating it
    pub async fn store_repo(&self, repo: CsvRepo) -> Result<()> {
        let lock_handle = self.csv_lock.clone();
        let github_csv = self.github_csv.clone();
        spawn_blocking(move || -> Result<()> {
            let _guard = lock(&lock_handle);

            let exists = github_csv.exists();
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&github_csv)?;
            let mut csv = csv::WriterBuilder::new()
                .has_headers(!exists)
                .from_writer(file);

            csv.serialize(repo)?;
            csv.flush()?;

            Ok(())
        })
        .await?
    }

    pub async fn non_fetched_repos(&self) -> Result<Vec<CsvRepo>> {
        let fetched = self.fetched.clone();
        let github_csv = self.github_csv.clone();
        spawn_blocking(move || -> Result<Vec<CsvRepo>> {
            if !github_csv.exists() {
                return Ok(Vec::new());
            }
            let done_str = fs::read_to_string(fetched)?;
            let done: HashSet<_> = done_str.lines().collect();

            let mut rdr = csv::Reader::from_path(github_csv)?;
            let mut repos = Vec::new();

            for record in rdr.deserialize() {
                let record: CsvRepo = record?;
                if !done.contains(record.id.as_str()) {
                    repos.push(record);
                }
            }

            Ok(repos)
        })
        .await?
    }

    pub async fn mark_fetched(&self, repo: &Repo) -> Result<()> {
        let lock_handle = self.fetched_lock.clone();
        let fetched = self.fetched.clone();
        let id = repo.id.clone();
        spawn_blocking(move || -> Result<()> {
            let _guard = lock(&lock_handle);

            let mut f = OpenOptions::new().create(true).append(true).open(&fetched)?;
            f.write_all(format!("{id}\n").as_bytes())?;

            Ok(())
        })
        .await?
    }

    /// Set `has_pom` for every CSV row whose project directory exists
    ///
    /// Rows already marked keep their flag. Written to `github.csv.new`
    /// first, then renamed over `github.csv`.
    pub async fn update_csv_has_pom(&self) -> Result<()> {
        if !tokio::fs::try_exists(&self.github_csv).await? {
            warn!(path = %self.github_csv.display(), "no csv to consolidate");
            return Ok(());
        }

        info!("updating csv from filesystem");
        let csv_path = self.github_csv.clone();
        let new_csv = self.github_csv.with_extension("csv.new");
        if tokio::fs::try_exists(&new_csv).await? {
            tokio::fs::remove_file(&new_csv).await?;
        }

        let dirs: HashSet<String> = self
            .project_dirs()
            .await?
            .into_iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();

        debug!(count = dirs.len(), "listed project dirs");

        let lock_handle = self.csv_lock.clone();
        let new_path = new_csv.clone();
        let updated = spawn_blocking(move || -> Result<usize> {
            let _guard = lock(&lock_handle);

            let spinner = ProgressBar::new(dirs.len() as u64);
            if let Ok(style) = ProgressStyle::with_template("{spinner} {pos}/{len} with POMs") {
                spinner.set_style(style);
            }

            let mut rdr = csv::Reader::from_path(&csv_path)?;
            let mut wtr = csv::WriterBuilder::new()
                .has_headers(true)
                .from_path(&new_path)?;

            let mut with_pom = 0;
            for record in rdr.deserialize() {
                spinner.tick();
                let mut row: CsvRepo = record?;
                row.has_pom = row.has_pom || dirs.contains(&Repo::dir_name(&row.name));
                if row.has_pom {
                    with_pom += 1;
                    spinner.inc(1);
                }

                wtr.serialize(row)?;
            }
            wtr.flush()?;

            spinner.finish_and_clear();

            fs::rename(&new_path, &csv_path)?;
            Ok(with_pom)
        })
        .await??;

        info!(with_pom = updated, "consolidated csv");

        Ok(())
    }

    /// Every directory under `poms/`, listed in parallel
    pub async fn project_dirs(&self) -> Result<Vec<PathBuf>> {
        if !tokio::fs::try_exists(&self.pom_dir).await? {
            return Ok(Vec::new());
        }

        let dir = self.pom_dir.read_dir()?;
        let (send, recv) = tokio::sync::oneshot::channel();

        rayon::spawn(move || {
            let mut projects: Vec<PathBuf> = dir
                .par_bridge()
                .filter_map(|d| d.ok().map(|d| d.path()))
                .filter(|p| p.is_dir())
                .collect();
            projects.sort();

            let _ = send.send(projects);
        });

        recv.await
            .map_err(|_| Error::Task("directory listing panicked".into()))
    }

    pub async fn write_report(&self, report: &Report) -> Result<()> {
        let mut json = serde_json::to_vec_pretty(report)?;
        json.push(b'\n');
        tokio::fs::write(self.report_path(), json).await?;
        Ok(())
    }

    pub async fn read_report(&self) -> Result<Report> {
        let path = self.report_path();
        if !tokio::fs::try_exists(&path).await? {
            return Err(Error::MissingReport { path });
        }
        let data = tokio::fs::read(&path).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub async fn write_error_log(&self, errors: &[String]) -> Result<()> {
        let mut content = errors.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        tokio::fs::write(self.error_log_path(), content).await?;
        Ok(())
    }
}
