//! Locator classification: maps the textual form of a locator onto the
//! adapter class that will retrieve it.
//!
//! Classification is an explicit ordered list of (predicate, class) pairs
//! evaluated in priority order; the first matching rule wins. The order is
//! load-bearing and deliberate: a share-link URL that embeds another host's
//! name (a real edge case for redirect pages) must classify deterministically.

/// The class of source a locator resolves to. Each class maps to exactly one
/// primary adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorClass {
    /// A host that shut down; rejected up front, no adapter is invoked.
    UnsupportedLegacy,
    /// Indirect share link that must be resolved to a direct URL first.
    ShareRedirect,
    /// Provider-hosted file requiring an authenticated session to retrieve.
    CloudDrive,
    /// Anything else URL-shaped: streamed directly.
    Direct,
}

type Predicate = fn(&str) -> bool;

/// Priority-ordered classification rules. First match wins.
const RULES: &[(Predicate, LocatorClass)] = &[
    (is_legacy_host, LocatorClass::UnsupportedLegacy),
    (is_share_host, LocatorClass::ShareRedirect),
    (is_cloud_drive_host, LocatorClass::CloudDrive),
];

fn is_legacy_host(locator: &str) -> bool {
    locator.contains("openload") || locator.contains("oload")
}

fn is_share_host(locator: &str) -> bool {
    locator.contains("dropbox.com")
}

fn is_cloud_drive_host(locator: &str) -> bool {
    locator.contains("mega.nz")
}

/// Classify a locator by structural pattern matching on its textual form.
/// Pure: no I/O, deterministic for any input.
pub fn classify(locator: &str) -> LocatorClass {
    for (matches, class) in RULES {
        if matches(locator) {
            return *class;
        }
    }
    LocatorClass::Direct
}
