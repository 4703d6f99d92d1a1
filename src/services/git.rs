// SPDX-FileCopyrightText: 2026 Sephyi <me@sephy.io>
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Commercial

use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

pub struct GitService {
    work_dir: PathBuf,
}

impl GitService {
    pub fn discover() -> Result<Self> {
        Self::discover_at(Path::new("."))
    }

    pub fn discover_at(dir: &Path) -> Result<Self> {
        let repo = gix::discover(dir).map_err(|_| Error::NotAGitRepo)?;

        let work_dir = repo
            .work_dir()
            .ok_or_else(|| Error::Git("Bare repository not supported".into()))?
            .to_path_buf();

        Ok(Self { work_dir })
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn git(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.work_dir);
        cmd
    }

    /// Runs a prepared git command, failing with its stderr on a non-zero exit
    async fn run(&self, mut cmd: Command) -> Result<String> {
        debug!(command = ?cmd.as_std(), "running git");
        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Git(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub async fn checkout(&self, branch: &str) -> Result<()> {
        let mut cmd = self.git();
        cmd.args(["checkout", branch]);
        self.run(cmd).await?;
        Ok(())
    }

    /// Porcelain status lines for `path`, untracked files included
    pub async fn status(&self, path: &Path) -> Result<Vec<String>> {
        let mut cmd = self.git();
        cmd.args(["status", "--porcelain", "--untracked-files=all", "--"])
            .arg(path);
        let output = self.run(cmd).await?;

        Ok(output
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn add(&self, path: &Path) -> Result<()> {
        let mut cmd = self.git();
        cmd.args(["add", "--"]).arg(path);
        self.run(cmd).await?;
        Ok(())
    }

    /// Commits the index with an explicit author and committer identity
    pub async fn commit_as(&self, name: &str, email: &str, message: &str) -> Result<()> {
        let mut cmd = self.git();
        cmd.arg("-c")
            .arg(format!("user.name={name}"))
            .arg("-c")
            .arg(format!("user.email={email}"))
            .args(["commit", "-m", message]);
        self.run(cmd).await?;
        Ok(())
    }

    pub async fn push(&self, remote: &str, branch: &str, ssh_command: Option<&str>) -> Result<()> {
        let mut cmd = self.git();
        cmd.args(["push", remote, branch])
            .env("GIT_TERMINAL_PROMPT", "0");
        if let Some(ssh) = ssh_command {
            cmd.env("GIT_SSH_COMMAND", ssh);
        }
        self.run(cmd).await?;
        Ok(())
    }
}
