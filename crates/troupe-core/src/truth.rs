//! Three-tier truth layers carried by personas and relations.

use serde::{Deserialize, Serialize};

/// The layers of truth about a persona or relation.
///
/// `universal` is public fact, `internal` is what insiders know and
/// `external` is how outsiders perceive the subject. Empty strings mean the
/// layer is not populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Truth {
    /// Public fact, visible to everyone.
    #[serde(default)]
    pub universal: String,
    /// Visible to the subject itself, or to members of a relation.
    #[serde(default)]
    pub internal: String,
    /// The outside perception, visible to non-members.
    #[serde(default)]
    pub external: String,
}

impl Truth {
    /// Creates a truth from its three layers.
    #[must_use]
    pub fn new(
        universal: impl Into<String>,
        internal: impl Into<String>,
        external: impl Into<String>,
    ) -> Self {
        Self {
            universal: universal.into(),
            internal: internal.into(),
            external: external.into(),
        }
    }

    /// True when neither `universal` nor `external` carries text, which
    /// makes the subject invisible to outsiders.
    #[must_use]
    pub fn is_intangible(&self) -> bool {
        is_blank(&self.universal) && is_blank(&self.external)
    }
}

/// True for empty or whitespace-only text.
#[must_use]
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
