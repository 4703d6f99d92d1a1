// SPDX-FileCopyrightText: 2026 Sephyi <me@sephy.io>
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Commercial

mod pom;
mod report;
mod repo;

pub use pom::*;
pub use report::*;
pub use repo::*;
