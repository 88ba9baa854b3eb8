use std::borrow::Cow;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use opsconsole_core::DomainError;

/// Capability identifier (e.g. `"CONTRACT.UPDATE"`).
///
/// Capabilities are opaque tokens from a registry shared with the server. The
/// client never derives them; it only compares them for set membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(Cow<'static, str>);

impl Capability {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Const constructor for registry entries.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading segment, e.g. `CONTRACT` for `CONTRACT.UPDATE`.
    pub fn resource(&self) -> &str {
        self.as_str().split('.').next().unwrap_or_default()
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Capability {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}

impl From<String> for Capability {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

/// Parses user-typed identifiers (`contract.update` → `CONTRACT.UPDATE`).
///
/// Server-provided lists go through `From<String>` unchecked.
impl FromStr for Capability {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        let (resource, action) = normalized
            .split_once('.')
            .ok_or_else(|| DomainError::validation(format!("capability '{s}' must look like RESOURCE.ACTION")))?;

        let valid_segment = |segment: &str| {
            !segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        };
        if !valid_segment(resource) || !valid_segment(action) {
            return Err(DomainError::validation(format!("capability '{s}' has an empty or invalid segment")));
        }

        Ok(Self(Cow::Owned(normalized)))
    }
}
