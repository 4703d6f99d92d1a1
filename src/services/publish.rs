// SPDX-FileCopyrightText: 2026 Sephyi <me@sephy.io>
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Commercial

//! Commits and pushes a regenerated dataset from CI.
//!
//! Sequence: check the CI marker and deploy key, check out the branch, run
//! the data command (its exit status is ignored), and when the watched
//! directory changed stage it, commit once and push once with the deploy key.
//! An interrupt during the run aborts before anything is pushed.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::PublishConfig;
use crate::error::{Error, Result};
use crate::services::git::GitService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The data command left the watched directory untouched
    NoChanges,
    /// One commit covering `changed` paths was pushed
    Pushed { changed: usize },
}

/// Fails unless the CI marker and the deploy key are both present
///
/// Both are presence checks, an empty value counts as set.
pub fn check_preconditions<F>(config: &PublishConfig, lookup: F) -> Result<SecretString>
where
    F: Fn(&str) -> Option<String>,
{
    if lookup(&config.ci_marker).is_none() {
        return Err(Error::MissingCiContext {
            var: config.ci_marker.clone(),
        });
    }

    lookup(&config.deploy_key_env)
        .map(SecretString::from)
        .ok_or_else(|| Error::MissingDeployKey {
            var: config.deploy_key_env.clone(),
        })
}

pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var_os(name).map(|v| v.to_string_lossy().into_owned())
}

pub struct Publisher {
    git: GitService,
    config: PublishConfig,
    home: PathBuf,
    cancel: CancellationToken,
}

impl Publisher {
    pub fn new(
        git: GitService,
        config: PublishConfig,
        home: PathBuf,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            git,
            config,
            home,
            cancel,
        }
    }

    pub fn key_file(&self) -> PathBuf {
        self.home.join(&self.config.key_path)
    }

    pub async fn run(&self, deploy_key: SecretString) -> Result<PublishOutcome> {
        let cfg = &self.config;

        info!(branch = %cfg.branch, "checking out");
        self.git.checkout(&cfg.branch).await?;

        self.run_data_command().await;

        // An interrupted data command may leave partial data behind
        self.ensure_not_cancelled()?;

        let changed = self.git.status(&cfg.watch_dir).await?;
        if changed.is_empty() {
            info!(dir = %cfg.watch_dir.display(), "no changes to commit");
            return Ok(PublishOutcome::NoChanges);
        }
        info!(dir = %cfg.watch_dir.display(), changed = changed.len(), "data changed");

        self.git.add(&cfg.watch_dir).await?;
        self.git
            .commit_as(&cfg.author_name, &cfg.author_email, &cfg.message)
            .await?;

        let key_file = self.key_file();
        install_key(&key_file, &deploy_key)?;

        self.ensure_not_cancelled()?;
        info!(remote = %cfg.remote, branch = %cfg.branch, "pushing");
        self.git
            .push(&cfg.remote, &cfg.branch, Some(&ssh_command(&key_file)))
            .await?;

        Ok(PublishOutcome::Pushed {
            changed: changed.len(),
        })
    }

    fn ensure_not_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            warn!("interrupted, nothing pushed");
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Runs the data command in the work tree, whatever it returns
    async fn run_data_command(&self) {
        let Some((program, args)) = self.config.command.split_first() else {
            return;
        };

        info!(command = %self.config.command.join(" "), "generating data");
        let status = Command::new(program)
            .args(args)
            .current_dir(self.git.work_dir())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {}
            Ok(status) => warn!(%status, "data command failed, continuing"),
            Err(e) => warn!(error = %e, "data command could not start, continuing"),
        }
    }
}

/// Writes the deploy key with owner-only permissions
pub fn install_key(path: &Path, key: &SecretString) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?;
    let created_parent = !parent.exists();
    fs::create_dir_all(parent)?;

    #[cfg(not(unix))]
    let _ = created_parent;

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        if created_parent {
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))?;
        }
    }

    let mut file = options.open(path)?;
    let key = key.expose_secret();
    file.write_all(key.as_bytes())?;
    if !key.ends_with('\n') {
        file.write_all(b"\n")?;
    }

    // mode() only applies on creation
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

pub fn ssh_command(key_file: &Path) -> String {
    format!(
        "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=accept-new",
        shell_quote(&key_file.display().to_string())
    )
}

/// Single-quotes `value` for `sh`, embedded quotes become `'\''`
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
