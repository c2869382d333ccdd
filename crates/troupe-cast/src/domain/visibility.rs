//! Visibility resolver.
//!
//! Decides which truth layers an observing persona may see:
//!
//! - its own persona: `universal` + `internal`;
//! - any other persona: `universal` + `external`, never `internal`;
//! - a relation it belongs to: `universal` + `internal`;
//! - any other relation: `universal` + `external`.
//!
//! Personas and relations without `universal` or `external` text are
//! intangible to outsiders and resolve to `None`, so their existence does
//! not leak. Worlds and scenarios carry no layers and are always visible.

use serde::Serialize;
use troupe_core::truth::{Truth, is_blank};
use uuid::Uuid;

use super::persona::Persona;
use super::relation::Relation;

/// Whether the observer sees a subject from the inside or the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Perspective {
    /// The subject is the observer itself, or a relation it belongs to.
    Insider,
    /// Everyone else.
    Outsider,
}

/// The truth layers an observer is permitted to see. Blank layers are
/// reported as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibleTruth {
    /// Inside or outside view.
    pub perspective: Perspective,
    /// Public fact.
    pub universal: Option<String>,
    /// Only ever set for insiders.
    pub internal: Option<String>,
    /// Only ever set for outsiders.
    pub external: Option<String>,
}

impl VisibleTruth {
    fn insider(truth: &Truth) -> Self {
        Self {
            perspective: Perspective::Insider,
            universal: populated(&truth.universal),
            internal: populated(&truth.internal),
            external: None,
        }
    }

    fn outsider(truth: &Truth) -> Self {
        Self {
            perspective: Perspective::Outsider,
            universal: populated(&truth.universal),
            internal: None,
            external: populated(&truth.external),
        }
    }
}

fn populated(text: &str) -> Option<String> {
    (!is_blank(text)).then(|| text.trim().to_owned())
}

/// The persona through whose eyes a context is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observer {
    persona_id: Uuid,
}

impl Observer {
    /// Observe as `persona_id`.
    #[must_use]
    pub fn new(persona_id: Uuid) -> Self {
        Self { persona_id }
    }

    /// The observing persona.
    #[must_use]
    pub fn persona_id(&self) -> Uuid {
        self.persona_id
    }

    /// Whether the observer is a listed member of `relation`.
    #[must_use]
    pub fn is_member_of(&self, relation: &Relation) -> bool {
        relation.has_member(self.persona_id)
    }

    /// Resolve what the observer sees of `subject`, or `None` when the
    /// subject is intangible to it.
    #[must_use]
    pub fn persona(&self, subject: &Persona) -> Option<VisibleTruth> {
        if subject.id == self.persona_id {
            return Some(VisibleTruth::insider(&subject.truth));
        }
        if subject.truth.is_intangible() {
            return None;
        }
        Some(VisibleTruth::outsider(&subject.truth))
    }

    /// Resolve what the observer sees of `relation`, or `None` when the
    /// relation is intangible to it.
    #[must_use]
    pub fn relation(&self, relation: &Relation) -> Option<VisibleTruth> {
        if self.is_member_of(relation) {
            return Some(VisibleTruth::insider(&relation.truth));
        }
        if relation.truth.is_intangible() {
            return None;
        }
        Some(VisibleTruth::outsider(&relation.truth))
    }
}
