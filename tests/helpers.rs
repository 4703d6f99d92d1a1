// SPDX-FileCopyrightText: 2026 Sephyi <me@sephy.io>
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Commercial

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use pomscout::config::GithubConfig;
use secrecy::SecretString;
use tempfile::TempDir;

/// GitHub config pointing every endpoint at a mock server, no waiting
#[allow(dead_code)]
pub fn github_config(server_url: &str) -> GithubConfig {
    GithubConfig {
        api_url: server_url.to_string(),
        raw_url: format!("{server_url}/raw"),
        timeout_secs: 5,
        rate_limit_wait_secs: 0,
        page_interval_ms: 0,
        ..GithubConfig::default()
    }
}

#[allow(dead_code)]
pub fn tokens(values: &[&str]) -> Vec<SecretString> {
    values
        .iter()
        .map(|t| SecretString::from(t.to_string()))
        .collect()
}

/// Runs git in `dir`, panicking on failure, returns stdout
#[allow(dead_code)]
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(args)
        .current_dir(dir)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .output()
        .expect("git runs");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// A work tree on `main` with a tracked `data/a.txt`, plus a bare remote
/// holding the same single commit
#[allow(dead_code)]
pub struct GitFixture {
    _tmp: TempDir,
    pub work: PathBuf,
    pub remote: PathBuf,
    pub home: PathBuf,
    pub xdg: PathBuf,
}

#[allow(dead_code)]
impl GitFixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let work = tmp.path().join("work");
        let remote = tmp.path().join("remote.git");
        let home = tmp.path().join("home");
        let xdg = tmp.path().join("xdg");
        for dir in [&work, &remote, &home, &xdg] {
            fs::create_dir_all(dir).expect("create fixture dir");
        }

        git(&remote, &["init", "--bare", "--quiet"]);

        git(&work, &["init", "--quiet"]);
        fs::create_dir_all(work.join("data")).unwrap();
        fs::write(work.join("data/a.txt"), "1\n").unwrap();
        fs::write(work.join("README.md"), "dataset\n").unwrap();
        git(&work, &["add", "."]);
        git(&work, &["commit", "--quiet", "-m", "init"]);
        git(&work, &["branch", "-M", "main"]);
        git(&work, &["push", "--quiet", remote.to_str().unwrap(), "main"]);

        Self {
            _tmp: tmp,
            work,
            remote,
            home,
            xdg,
        }
    }

    /// Writes `.pomscout.toml` with the given data command and this remote
    pub fn configure(&self, command: &[&str]) {
        let command = command
            .iter()
            .map(|a| format!("{a:?}"))
            .collect::<Vec<_>>()
            .join(", ");
        let toml = format!(
            "[publish]\nremote = {:?}\ncommand = [{command}]\n",
            self.remote.to_str().unwrap()
        );
        fs::write(self.work.join(".pomscout.toml"), toml).unwrap();
    }

    /// Commits on the remote's main branch, newest first
    pub fn remote_log(&self) -> Vec<String> {
        git(
            &self.remote,
            &["log", "main", "--format=%an <%ae> %cn <%ce> %s"],
        )
        .lines()
        .map(str::to_string)
        .collect()
    }

    pub fn remote_head_files(&self) -> Vec<String> {
        git(
            &self.remote,
            &["show", "--name-only", "--format=", "main"],
        )
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
    }

    pub fn current_branch(&self) -> String {
        git(&self.work, &["rev-parse", "--abbrev-ref", "HEAD"])
            .trim()
            .to_string()
    }

    pub fn key_file(&self) -> PathBuf {
        self.home.join(".ssh/deploy_key")
    }
}
