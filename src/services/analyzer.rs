// SPDX-FileCopyrightText: 2026 Sephyi <me@sephy.io>
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Commercial

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use rayon::prelude::*;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::domain::{Pom, Report};
use crate::error::{Error, Result};
use crate::services::store::DataStore;

const POM_FILE_NAME: &str = "pom.xml";
const EFFECTIVE_FILE_NAME: &str = "effective.xml";

/// Repositories referenced by all POMs of one project directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    pub repos: HashSet<String>,
    pub dist_repos: HashSet<String>,
}

/// How POMs get read
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Prefer Maven's effective POM over the raw file
    pub effective: bool,
    /// Maven executable
    pub maven: String,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            effective: false,
            maven: "mvn".into(),
        }
    }
}

pub struct AnalyzerService;

impl AnalyzerService {
    /// Analyzes every project directory of `store` on the rayon pool
    pub async fn analyze(store: &DataStore, options: AnalyzeOptions) -> Result<Report> {
        let projects = store.project_dirs().await?;
        info!(projects = projects.len(), effective = options.effective, "analyzing");

        let (send, recv) = tokio::sync::oneshot::channel();
        rayon::spawn(move || {
            let _ = send.send(Self::analyze_dirs(&projects, &options));
        });

        recv.await
            .map_err(|_| Error::Task("analysis panicked".into()))
    }

    pub fn analyze_dirs(projects: &[PathBuf], options: &AnalyzeOptions) -> Report {
        let distros: DashMap<String, usize> = DashMap::new();
        let repos: DashMap<String, usize> = DashMap::new();
        let has_external_repo = AtomicUsize::new(0);
        let has_distro_repo = Mutex::new(Vec::new());
        let total = AtomicUsize::new(0);
        let errors = Mutex::new(Vec::new());

        projects
            .par_iter()
            .filter_map(|dir| match Self::process_folder(dir, options) {
                Ok(project) => Some(project),
                Err(error) => {
                    let name = dir.file_name().map(|n| n.to_string_lossy().into_owned());
                    errors
                        .lock()
                        .unwrap_or_else(|p| p.into_inner())
                        .push(format!("{}: {error}", name.unwrap_or_default()));
                    None
                }
            })
            .for_each(|proj| {
                if !proj.repos.is_empty() {
                    has_external_repo.fetch_add(1, Ordering::Relaxed);
                }

                if !proj.dist_repos.is_empty() {
                    has_distro_repo
                        .lock()
                        .unwrap_or_else(|p| p.into_inner())
                        .push(proj.name);
                }

                for repo in proj.repos {
                    *repos.entry(repo).or_insert(0) += 1;
                }

                for repo in proj.dist_repos {
                    *distros.entry(repo).or_insert(0) += 1;
                }

                total.fetch_add(1, Ordering::Relaxed);
            });

        let mut has_distro_repos = has_distro_repo
            .into_inner()
            .unwrap_or_else(|p| p.into_inner());
        has_distro_repos.sort();
        let mut errors = errors.into_inner().unwrap_or_else(|p| p.into_inner());
        errors.sort();

        Report {
            total: total.load(Ordering::SeqCst),
            has_external_repos: has_external_repo.load(Ordering::SeqCst),
            has_distro_repos,
            external_repos: repos.into_iter().collect::<BTreeMap<_, _>>(),
            distros: distros.into_iter().collect::<BTreeMap<_, _>>(),
            errors,
        }
    }

    /// Collects the repositories of every `pom.xml` below `path`
    pub fn process_folder(path: &Path, options: &AnalyzeOptions) -> Result<Project> {
        let poms = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| {
                e.ok()
                    .and_then(|d| (d.file_name() == POM_FILE_NAME).then(|| d.into_path()))
            });

        let mut repos = HashSet::new();
        let mut dist_repos = HashSet::new();

        for pom_path in poms {
            let pom = if options.effective {
                Self::read_effective(&pom_path, &options.maven)?
            } else {
                Self::read_pom(&pom_path)?
            };

            if let Some(urls) = pom.repositories() {
                repos.extend(urls.into_iter().map(str::to_string));
            }

            if let Some(urls) = pom.distribution_repositories() {
                dist_repos.extend(urls.into_iter().map(str::to_string));
            }
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?;

        Ok(Project {
            name,
            repos,
            dist_repos,
        })
    }

    pub fn read_pom(path: &Path) -> Result<Pom> {
        let xml = fs::read_to_string(path)?;
        Pom::from_xml(&xml).map_err(|e| Error::Xml {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Cached `effective.xml`, else generated by Maven, else the raw POM
    fn read_effective(pom_path: &Path, maven: &str) -> Result<Pom> {
        let effective = pom_path.with_file_name(EFFECTIVE_FILE_NAME);
        if effective.exists() {
            return Self::read_pom(&effective);
        }

        let module_dir = pom_path
            .parent()
            .ok_or_else(|| Error::InvalidPath(pom_path.display().to_string()))?;

        match Self::effective_pom(module_dir, maven) {
            Ok(pom) => Ok(pom),
            Err(e) => {
                debug!(dir = %module_dir.display(), error = %e, "falling back to raw pom");
                Self::read_pom(pom_path)
            }
        }
    }

    fn effective_pom(module_dir: &Path, maven: &str) -> Result<Pom> {
        let status = Command::new(maven)
            .args([
                "help:effective-pom",
                &format!("-Doutput={EFFECTIVE_FILE_NAME}"),
            ])
            .current_dir(module_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;

        if status.success() {
            Self::read_pom(&module_dir.join(EFFECTIVE_FILE_NAME))
        } else {
            Err(Error::Maven {
                path: module_dir.to_path_buf(),
            })
        }
    }
}
