//! Dotted numeric versions (`2.1`, `1.10`, `2.1.3`).
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid version '{0}': expected dot separated numbers")]
pub struct VersionParseError(pub String);

/// A version compared component by component as integers, so `1.10` is greater than `1.2`.
///
/// A longer version is greater than its own prefix (`2.1.0` > `2.1`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(Vec<u64>);

impl Version {
    pub fn major(&self) -> u64 {
        self.0.first().copied().unwrap_or_default()
    }

    /// Keeps at most the first `components` components (`2.1.3` -> `2.1`).
    pub fn truncated(&self, components: usize) -> Self {
        Self(self.0.iter().copied().take(components).collect())
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .split('.')
            .map(|component| component.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
            .map_err(|_| VersionParseError(s.to_string()))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u64::to_string).collect();
        f.write_str(&parts.join("."))
    }
}
