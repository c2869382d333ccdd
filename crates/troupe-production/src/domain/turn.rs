//! Turns and their structured content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use troupe_core::entity::{Entity, EntityKind};
use uuid::Uuid;

/// Which side produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// Written by the human user.
    User,
    /// Generated by an assistant.
    Assistant,
}

impl TurnRole {
    /// Lowercase name as stored.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Spatial and situational vectors of a performance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vectors {
    /// Where the persona is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    /// How the persona holds itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posture: Option<String>,
    /// Where the persona is facing or heading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// Where the persona's actions are carrying it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub momentum: Option<String>,
}

impl Vectors {
    /// True when no vector is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.posture.is_none()
            && self.direction.is_none()
            && self.momentum.is_none()
    }
}

/// The `message.content` payload of a turn, matching the JSON object the
/// model is asked to produce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnContent {
    /// Speaker label.
    #[serde(default)]
    pub persona_name: String,
    /// What is said and done. Non-empty on every completed turn.
    #[serde(default)]
    pub performance: String,
    /// Optional situational vectors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vectors: Option<Vectors>,
    /// Private evolution field, visible only to the authoring assistant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
    /// Private evolution field, visible only to the authoring assistant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_to_self: Option<String>,
}

/// A vector field inside [`Vectors`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorField {
    /// `vectors.position`
    Position,
    /// `vectors.posture`
    Posture,
    /// `vectors.direction`
    Direction,
    /// `vectors.momentum`
    Momentum,
}

impl VectorField {
    /// Resolve a JSON key inside the `vectors` object.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "position" => Some(Self::Position),
            "posture" => Some(Self::Posture),
            "direction" => Some(Self::Direction),
            "momentum" => Some(Self::Momentum),
            _ => None,
        }
    }
}

/// A string-valued field of [`TurnContent`] that can be written while a
/// turn is streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "field", content = "vector")]
pub enum ContentField {
    /// `persona_name`
    PersonaName,
    /// `performance`
    Performance,
    /// `meta`
    Meta,
    /// `note_to_self`
    NoteToSelf,
    /// One of `vectors.*`
    Vector(VectorField),
}

impl ContentField {
    /// Resolve a top-level JSON key. `vectors` is an object and therefore
    /// not a field of its own.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "persona_name" => Some(Self::PersonaName),
            "performance" => Some(Self::Performance),
            "meta" => Some(Self::Meta),
            "note_to_self" => Some(Self::NoteToSelf),
            _ => None,
        }
    }
}

impl TurnContent {
    /// Content for a user-authored turn.
    #[must_use]
    pub fn performance(persona_name: impl Into<String>, performance: impl Into<String>) -> Self {
        Self {
            persona_name: persona_name.into(),
            performance: performance.into(),
            ..Self::default()
        }
    }

    /// Overwrite one field with its latest value.
    pub fn set(&mut self, field: ContentField, value: String) {
        *self.field_mut(field) = value;
    }

    /// Mutable access to one field, creating optional fields as empty.
    pub fn field_mut(&mut self, field: ContentField) -> &mut String {
        match field {
            ContentField::PersonaName => &mut self.persona_name,
            ContentField::Performance => &mut self.performance,
            ContentField::Meta => self.meta.get_or_insert_with(String::new),
            ContentField::NoteToSelf => self.note_to_self.get_or_insert_with(String::new),
            ContentField::Vector(vector) => {
                let vectors = self.vectors.get_or_insert_with(Vectors::default);
                let slot = match vector {
                    VectorField::Position => &mut vectors.position,
                    VectorField::Posture => &mut vectors.posture,
                    VectorField::Direction => &mut vectors.direction,
                    VectorField::Momentum => &mut vectors.momentum,
                };
                slot.get_or_insert_with(String::new)
            }
        }
    }

    /// Current value of one field, if set.
    #[must_use]
    pub fn get(&self, field: ContentField) -> Option<&str> {
        match field {
            ContentField::PersonaName => Some(self.persona_name.as_str()),
            ContentField::Performance => Some(self.performance.as_str()),
            ContentField::Meta => self.meta.as_deref(),
            ContentField::NoteToSelf => self.note_to_self.as_deref(),
            ContentField::Vector(vector) => {
                let vectors = self.vectors.as_ref()?;
                match vector {
                    VectorField::Position => vectors.position.as_deref(),
                    VectorField::Posture => vectors.posture.as_deref(),
                    VectorField::Direction => vectors.direction.as_deref(),
                    VectorField::Momentum => vectors.momentum.as_deref(),
                }
            }
        }
    }

    /// True when the turn carries usable output.
    #[must_use]
    pub fn has_performance(&self) -> bool {
        !self.performance.trim().is_empty()
    }
}

/// One exchange unit of a production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Turn identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// The production this turn belongs to.
    pub production_id: Uuid,
    /// Producing role.
    pub role: TurnRole,
    /// Authoring assistant; `None` for pure user turns.
    #[serde(default)]
    pub assistant_id: Option<Uuid>,
    /// Parent turn; `None` for roots.
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    /// Structured payload.
    pub content: TurnContent,
    /// Marks an out-of-character instruction.
    #[serde(default)]
    pub directive: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// A user turn carrying `content`.
    #[must_use]
    pub fn user(
        user_id: Uuid,
        production_id: Uuid,
        parent_id: Option<Uuid>,
        content: TurnContent,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            production_id,
            role: TurnRole::User,
            assistant_id: None,
            parent_id,
            content,
            directive: false,
            created_at,
        }
    }

    /// An assistant turn with empty content, ready to be streamed into.
    #[must_use]
    pub fn provisional(
        user_id: Uuid,
        production_id: Uuid,
        assistant_id: Uuid,
        parent_id: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            production_id,
            role: TurnRole::Assistant,
            assistant_id: Some(assistant_id),
            parent_id,
            content: TurnContent::default(),
            directive: false,
            created_at,
        }
    }

    /// Mark this turn as an out-of-character directive.
    #[must_use]
    pub fn as_directive(mut self) -> Self {
        self.directive = true;
        self
    }
}

impl Entity for Turn {
    const KIND: EntityKind = EntityKind::Turn;

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn user_id(&self) -> Uuid {
        self.user_id
    }
}
