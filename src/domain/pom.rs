// SPDX-FileCopyrightText: 2026 Sephyi <me@sephy.io>
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Commercial

use serde::Deserialize;

/// The parts of a Maven POM we care about. Every other element is ignored.
#[derive(Debug, Deserialize, PartialEq, Default)]
pub struct Pom {
    #[serde(default)]
    pub repositories: Option<Repositories>,
    #[serde(rename = "distributionManagement", default)]
    pub distribution_management: Option<DistributionManagement>,
}

#[derive(Debug, Deserialize, PartialEq, Default)]
pub struct Repositories {
    #[serde(rename = "repository", default)]
    pub repositories: Vec<Repository>,
}

#[derive(Debug, Deserialize, PartialEq, Default)]
pub struct DistributionManagement {
    #[serde(default)]
    pub repository: Option<Repository>,
    #[serde(rename = "snapshotRepository", default)]
    pub snapshot_repository: Option<Repository>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct Repository {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub url: String,
}

impl Pom {
    pub fn from_xml(xml: &str) -> Result<Self, quick_xml::DeError> {
        quick_xml::de::from_str(xml)
    }

    /// URLs of `<repositories>`, `None` when the section is absent
    pub fn repositories(&self) -> Option<Vec<&str>> {
        self.repositories.as_ref().map(|repos| {
            repos
                .repositories
                .iter()
                .map(|repo| repo.url.trim())
                .filter(|url| !url.is_empty())
                .collect()
        })
    }

    /// URLs of `<distributionManagement>`, release and snapshot repositories
    pub fn distribution_repositories(&self) -> Option<Vec<&str>> {
        self.distribution_management.as_ref().map(|dm| {
            dm.repository
                .iter()
                .chain(dm.snapshot_repository.iter())
                .map(|repo| repo.url.trim())
                .filter(|url| !url.is_empty())
                .collect()
        })
    }
}
