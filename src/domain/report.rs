// SPDX-FileCopyrightText: 2026 Sephyi <me@sephy.io>
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Commercial

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Aggregated result of an analysis run over all project directories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Projects analyzed successfully
    pub total: usize,
    /// Projects declaring at least one external repository
    pub has_external_repos: usize,
    /// Directory names of projects declaring a distribution repository, sorted
    pub has_distro_repos: Vec<String>,
    /// External repository URL -> number of projects using it
    pub external_repos: BTreeMap<String, usize>,
    /// Distribution repository URL -> number of projects using it
    pub distros: BTreeMap<String, usize>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl Report {
    /// The `n` most used URLs, by count descending then URL
    pub fn top(map: &BTreeMap<String, usize>, n: usize) -> Vec<(&str, usize)> {
        let mut top: Vec<(&str, usize)> = map.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        top.sort_by(|(a_url, a), (b_url, b)| b.cmp(a).then_with(|| a_url.cmp(b_url)));
        top.truncate(n);
        top
    }

    pub fn print(&self, top_n: usize) {
        println!("Found a total of {} repos", self.total);
        println!(
            "Amount of repos with external repos: {}",
            self.has_external_repos
        );
        println!(
            "Amount of repos with distribution repos: {}",
            self.has_distro_repos.len()
        );

        println!(
            "\nFound {} distinct external repositories, top {top_n}:",
            self.external_repos.len()
        );
        for (url, count) in Self::top(&self.external_repos, top_n) {
            println!("  {count:>6}  {url}");
        }

        println!(
            "\nFound {} distinct distribution repositories, top {top_n}:",
            self.distros.len()
        );
        for (url, count) in Self::top(&self.distros, top_n) {
            println!("  {count:>6}  {url}");
        }

        if !self.errors.is_empty() {
            println!("\n{} projects failed to analyze", self.errors.len());
        }
    }
}
