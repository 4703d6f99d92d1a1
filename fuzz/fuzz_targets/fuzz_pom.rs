// SPDX-FileCopyrightText: 2026 Sephyi <me@sephy.io>
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Commercial

#![no_main]

use libfuzzer_sys::fuzz_target;
use pomscout::domain::Pom;

fuzz_target!(|data: &[u8]| {
    if let Ok(xml) = std::str::from_utf8(data) {
        if let Ok(pom) = Pom::from_xml(xml) {
            let _ = pom.repositories();
            let _ = pom.distribution_repositories();
        }
    }
});
