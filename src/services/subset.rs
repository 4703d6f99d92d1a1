// SPDX-FileCopyrightText: 2026 Sephyi <me@sephy.io>
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Commercial

use std::fs;
use std::path::Path;

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, info};

use crate::domain::{CsvRepo, Repo};
use crate::error::Result;

const SEED: [u8; 32] = [42; 32];

/// Picks `n` repositories of `repos`, the same ones for the same input
pub fn sample(mut repos: Vec<CsvRepo>, n: usize) -> Vec<CsvRepo> {
    let mut rng = ChaCha20Rng::from_seed(SEED);
    repos.shuffle(&mut rng);
    repos.truncate(n);
    repos
}

/// Writes a data directory at `out` holding a random sample of `from`
///
/// Project directories are symlinked, not copied.
pub fn create_subset(n: usize, from: &Path, out: &Path) -> Result<usize> {
    let mut reader = csv::Reader::from_path(from.join("github.csv"))?;
    let repos = reader
        .deserialize()
        .collect::<std::result::Result<Vec<CsvRepo>, _>>()?;
    let available = repos.len();

    let repos = sample(repos, n);

    fs::create_dir_all(out.join("poms"))?;

    let fetched = from.join("fetched");
    if fetched.exists() {
        fs::copy(fetched, out.join("fetched"))?;
    }

    let mut writer = csv::Writer::from_path(out.join("github.csv"))?;
    let mut linked = 0;
    for repo in &repos {
        let repo_path = Repo::dir_name(&repo.name);
        let source = from.join("poms").join(&repo_path);
        let target = out.join("poms").join(&repo_path);
        if source.exists() && !target.exists() {
            let source = source.canonicalize()?;
            link_dir(&source, &target)?;
            linked += 1;
            debug!(repo = %repo.name, "linked project");
        }

        writer.serialize(repo)?;
    }
    writer.flush()?;

    info!(
        kept = repos.len(),
        available,
        linked,
        out = %out.display(),
        "created subset"
    );

    Ok(repos.len())
}

#[cfg(unix)]
fn link_dir(source: &Path, target: &Path) -> Result<()> {
    std::os::unix::fs::symlink(source, target)?;
    Ok(())
}

#[cfg(not(unix))]
fn link_dir(source: &Path, _target: &Path) -> Result<()> {
    Err(crate::error::Error::InvalidPath(format!(
        "cannot link {}: symlinks are only supported on unix",
        source.display()
    )))
}
