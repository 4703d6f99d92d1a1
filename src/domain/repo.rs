// SPDX-FileCopyrightText: 2026 Sephyi <me@sephy.io>
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Commercial

use serde::{Deserialize, Serialize};

/// A GitHub repository, `name` being `owner/repo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    pub id: String,
    pub name: String,
}

impl Repo {
    /// Directory name used for this repository under `poms/`
    pub fn path(&self) -> String {
        Self::dir_name(&self.name)
    }

    pub fn dir_name(name: &str) -> String {
        name.replace('/', ".")
    }

    /// Inverse of [`Repo::dir_name`] for the first separator only,
    /// owners never contain a dot but repository names can.
    pub fn name_from_dir(dir: &str) -> String {
        dir.replacen('.', "/", 1)
    }

    pub fn into_csv(self, has_pom: bool) -> CsvRepo {
        CsvRepo {
            id: self.id,
            name: self.name,
            has_pom,
        }
    }
}

/// Row of `github.csv`.
///
/// Kept flat: the csv crate cannot deserialize `#[serde(flatten)]` fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvRepo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub has_pom: bool,
}

impl From<CsvRepo> for Repo {
    fn from(value: CsvRepo) -> Self {
        Repo {
            id: value.id,
            name: value.name,
        }
    }
}
