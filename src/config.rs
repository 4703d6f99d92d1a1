// SPDX-FileCopyrightText: 2026 Sephyi <me@sephy.io>
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Commercial

use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::cli::Cli;
use crate::error::{Error, Result};

/// GitHub endpoints and scrape pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Base URL serving raw file contents (`<raw_url>/<owner>/<repo>/HEAD/<path>`)
    #[serde(default = "default_raw_url")]
    pub raw_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds (default 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sleep once every token has hit its rate limit (default 60)
    #[serde(default = "default_rate_limit_wait_secs")]
    pub rate_limit_wait_secs: u64,

    /// Node ids per GraphQL batch, GitHub caps this at 100
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Minimum time between two repository listing pages
    #[serde(default = "default_page_interval_ms")]
    pub page_interval_ms: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            raw_url: default_raw_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            rate_limit_wait_secs: default_rate_limit_wait_secs(),
            batch_size: default_batch_size(),
            page_interval_ms: default_page_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeConfig {
    /// Entries listed per ranking in the printed summary
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Maven executable used for effective POMs
    #[serde(default = "default_maven")]
    pub maven: String,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            maven: default_maven(),
        }
    }
}

/// Settings of the CI job that commits a refreshed dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Env var whose presence marks a CI run
    #[serde(default = "default_ci_marker")]
    pub ci_marker: String,

    /// Env var holding the SSH deploy key
    #[serde(default = "default_deploy_key_env")]
    pub deploy_key_env: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Directory whose changes get committed
    #[serde(default = "default_watch_dir")]
    pub watch_dir: PathBuf,

    /// Data generation command, argv form. Its exit status is ignored.
    #[serde(default = "default_command")]
    pub command: Vec<String>,

    #[serde(default = "default_author_name")]
    pub author_name: String,

    #[serde(default = "default_author_email")]
    pub author_email: String,

    #[serde(default = "default_message")]
    pub message: String,

    #[serde(default = "default_remote")]
    pub remote: String,

    /// Deploy key location, relative to the home directory
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            ci_marker: default_ci_marker(),
            deploy_key_env: default_deploy_key_env(),
            branch: default_branch(),
            watch_dir: default_watch_dir(),
            command: default_command(),
            author_name: default_author_name(),
            author_email: default_author_email(),
            message: default_message(),
            remote: default_remote(),
            key_path: default_key_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub github: GithubConfig,

    #[serde(default)]
    pub analyze: AnalyzeConfig,

    #[serde(default)]
    pub publish: PublishConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_api_url() -> String {
    "https://api.github.com".into()
}
fn default_raw_url() -> String {
    "https://raw.githubusercontent.com".into()
}
fn default_user_agent() -> String {
    concat!("pomscout/", env!("CARGO_PKG_VERSION")).into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_rate_limit_wait_secs() -> u64 {
    60
}
fn default_batch_size() -> usize {
    100
}
fn default_page_interval_ms() -> u64 {
    250
}
fn default_top_n() -> usize {
    25
}
fn default_maven() -> String {
    "mvn".into()
}
fn default_ci_marker() -> String {
    "GITHUB_ACTIONS".into()
}
fn default_deploy_key_env() -> String {
    "DEPLOY_KEY".into()
}
fn default_branch() -> String {
    "main".into()
}
fn default_watch_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_command() -> Vec<String> {
    ["cargo", "run", "--release", "--", "data"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_author_name() -> String {
    "pomscout-bot".into()
}
fn default_author_email() -> String {
    "pomscout-bot@users.noreply.github.com".into()
}
fn default_message() -> String {
    "Update dataset".into()
}
fn default_remote() -> String {
    "git@github.com:pomscout/pomscout.git".into()
}
fn default_key_path() -> PathBuf {
    PathBuf::from(".ssh/deploy_key")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            github: GithubConfig::default(),
            analyze: AnalyzeConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

impl Config {
    /// Load with priority: CLI > ENV > user config > project config > defaults
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Project-level config (.pomscout.toml in the working directory)
        if let Ok(cwd) = std::env::current_dir() {
            let project_config = cwd.join(".pomscout.toml");
            if project_config.exists() {
                figment = figment.merge(Toml::file(&project_config));
            }
        }

        if let Some(path) = Self::config_path() {
            if path.exists() {
                figment = figment.merge(Toml::file(&path));
            }
        }

        // POMSCOUT_DATA_DIR, POMSCOUT_GITHUB__API_URL, POMSCOUT_PUBLISH__BRANCH, ...
        figment = figment.merge(Env::prefixed("POMSCOUT_").split("__"));

        let mut config: Config = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "pomscout").map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(ref dir) = cli.data_dir {
            self.data_dir = dir.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("github.api_url", &self.github.api_url),
            ("github.raw_url", &self.github.raw_url),
        ] {
            let parsed = url::Url::parse(value)
                .map_err(|e| Error::Config(format!("{name} is not a valid URL ({e}): '{value}'")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "{name} must start with http:// or https://, got '{value}'"
                )));
            }
        }

        if !(1..=100).contains(&self.github.batch_size) {
            return Err(Error::Config(format!(
                "github.batch_size must be 1–100, got {}",
                self.github.batch_size
            )));
        }

        if !(1..=3600).contains(&self.github.timeout_secs) {
            return Err(Error::Config(format!(
                "github.timeout_secs must be 1–3600, got {}",
                self.github.timeout_secs
            )));
        }

        if self.analyze.top_n == 0 {
            return Err(Error::Config("analyze.top_n must be at least 1".into()));
        }

        if self.publish.command.is_empty() {
            return Err(Error::Config("publish.command cannot be empty".into()));
        }

        if self.publish.branch.is_empty() || self.publish.remote.is_empty() {
            return Err(Error::Config(
                "publish.branch and publish.remote cannot be empty".into(),
            ));
        }

        if self.publish.watch_dir.as_os_str().is_empty() {
            return Err(Error::Config("publish.watch_dir cannot be empty".into()));
        }

        Ok(())
    }

    /// Create default config file with secure permissions
    pub fn create_default() -> Result<PathBuf> {
        let Some(dir) = Self::config_dir() else {
            return Err(Error::Config("Cannot determine config directory".into()));
        };

        fs::create_dir_all(&dir)?;

        let path = dir.join("config.toml");
        let content = r#"# pomscout configuration

# Where github.csv, state.json, fetched and poms/ live
data_dir = "./data"

[github]
api_url = "https://api.github.com"
raw_url = "https://raw.githubusercontent.com"

# Seconds to sleep once every token is rate limited
rate_limit_wait_secs = 60

# Node ids per GraphQL request (max 100)
batch_size = 100

[analyze]
# Entries shown per ranking
top_n = 25
maven = "mvn"

[publish]
branch = "main"
watch_dir = "data"
command = ["cargo", "run", "--release", "--", "data"]
author_name = "pomscout-bot"
author_email = "pomscout-bot@users.noreply.github.com"
message = "Update dataset"
# remote = "git@github.com:<owner>/<repo>.git"
"#;

        fs::write(&path, content)?;

        // Set secure permissions (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&path, perms)?;
        }

        Ok(path)
    }
}
