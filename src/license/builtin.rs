use std::collections::BTreeMap;

use super::corpus::{CorpusError, LicenseCorpus};

macro_rules! header {
    ($expr:literal, $file:literal) => {
        (
            $expr,
            include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/licenses/", $expr, "/", $file)),
        )
    };
}

/// Header texts compiled into the binary, as `(expression, variant)` pairs.
const BUNDLED_HEADERS: &[(&str, &str)] = &[
    header!("GPL-2.0-only_OR_GPL-3.0-only_OR_LicenseRef-KDE-Accepted-GPL", "kde.txt"),
    header!("GPL-2.0-only_OR_GPL-3.0-or-later", "kdevelop.txt"),
    header!("GPL-2.0-or-later", "fsf-address.txt"),
    header!("GPL-2.0-or-later", "gnu-url.txt"),
    header!("GPL-2.0-or-later", "gnu-url-no-period.txt"),
    header!("GPL-3.0-or-later", "gnu-url.txt"),
    header!("LGPL-2.0-only", "kde.txt"),
    header!("LGPL-2.0-or-later", "kdelibs.txt"),
    header!("LGPL-2.0-or-later", "program.txt"),
    header!("LGPL-2.1-only_OR_LGPL-3.0-only_OR_LicenseRef-KDE-Accepted-LGPL", "kde.txt"),
    header!("LGPL-2.1-only", "kde.txt"),
    header!("LGPL-2.1-or-later", "kde.txt"),
    header!("LGPL-3.0-or-later", "kde.txt"),
    header!("MIT", "mit.txt"),
];

impl LicenseCorpus {
    /// The corpus shipped with the binary. It carries no license files.
    pub fn bundled() -> Result<Self, CorpusError> {
        let mut headers: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (expression, text) in BUNDLED_HEADERS {
            headers.entry(*expression).or_default().push(text.to_string());
        }
        LicenseCorpus::new(headers, BTreeMap::new())
    }
}
