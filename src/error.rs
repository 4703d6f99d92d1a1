// SPDX-FileCopyrightText: 2026 Sephyi <me@sephy.io>
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Commercial

// miette's Diagnostic derive generates code that triggers this false positive
#![allow(unused_assignments)]

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("No GitHub tokens configured")]
    #[diagnostic(
        code(pomscout::github::no_tokens),
        help("Pass --token <TOKEN> or set GH_TOKENS=token1,token2")
    )]
    MissingTokens,

    #[error("GitHub rate limit hit (HTTP {status})")]
    #[diagnostic(code(pomscout::github::rate_limit))]
    RateLimited { status: u16 },

    #[error("GitHub returned HTTP {status}")]
    #[diagnostic(code(pomscout::github::http))]
    HttpStatus { status: u16 },

    #[error("GitHub response did not contain the requested data")]
    #[diagnostic(code(pomscout::github::empty))]
    EmptyResponse,

    #[error("Not running inside CI: {var} is not set")]
    #[diagnostic(
        code(pomscout::publish::not_ci),
        help("publish only runs from CI; set {var} to run it deliberately")
    )]
    MissingCiContext { var: String },

    #[error("Deploy key missing: {var} is not set")]
    #[diagnostic(
        code(pomscout::publish::no_deploy_key),
        help("Expose the deploy key secret to the job as {var}")
    )]
    MissingDeployKey { var: String },

    #[error("Not a git repository")]
    #[diagnostic(
        code(pomscout::git::not_repo),
        help("Run this command inside a git repository")
    )]
    NotAGitRepo,

    #[error("Git error: {0}")]
    #[diagnostic(code(pomscout::git::error))]
    Git(String),

    #[error("Failed to parse {}: {message}", path.display())]
    #[diagnostic(code(pomscout::analyze::xml))]
    Xml { path: PathBuf, message: String },

    #[error("Maven failed in {}", path.display())]
    #[diagnostic(
        code(pomscout::analyze::maven),
        help("Check that `mvn` is installed or run without --effective")
    )]
    Maven { path: PathBuf },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("No analysis report found at {}", path.display())]
    #[diagnostic(
        code(pomscout::data::no_report),
        help("Run `pomscout analyze` first")
    )]
    MissingReport { path: PathBuf },

    #[error("Configuration error: {0}")]
    #[diagnostic(code(pomscout::config::error))]
    Config(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Operation cancelled by user")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Task(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
