//! Semantic version ordering (major.minor.patch, numeric field-wise).
//!
//! Unparsable or missing versions are represented as `None` and compare
//! lower than any valid version (`Option`'s ordering), so a bad string on
//! one entry never aborts a whole check.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse `1.2.3`, tolerating a leading `v` and pre-release/build suffixes
    /// (`v1.2.3-beta+7` parses as 1.2.3). One to three numeric components are
    /// accepted; missing minor/patch default to 0.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let raw = raw.strip_prefix(['v', 'V']).unwrap_or(raw);
        let core = raw.split(['-', '+']).next()?;
        if core.is_empty() {
            return None;
        }
        let mut fields = [0u64; 3];
        let mut count = 0;
        for part in core.split('.') {
            if count == fields.len() {
                return None;
            }
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            fields[count] = part.parse().ok()?;
            count += 1;
        }
        Some(Version::new(fields[0], fields[1], fields[2]))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Total order over raw version strings; unparsable sorts lowest.
pub fn compare(a: &str, b: &str) -> Ordering {
    Version::parse(a).cmp(&Version::parse(b))
}

/// True when `remote` is strictly newer than `local`.
pub fn is_newer(remote: &str, local: &str) -> bool {
    compare(remote, local) == Ordering::Greater
}
