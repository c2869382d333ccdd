//! Message rendering.

use serde::Serialize;
use troupe_cast::domain::visibility::{Perspective, VisibleTruth};
use troupe_cast::domain::{Persona, Relation};
use troupe_core::completion::ChatMessage;
use troupe_core::error::DomainError;
use troupe_production::domain::{Scenario, Turn, TurnContent, Vectors, World};

const RESPONSE_FORMAT: &str = "\
Reply with exactly one JSON object and nothing else, using these keys:
- \"persona_name\": your name as the speaker
- \"performance\": what you say and do (required, never empty)
- \"vectors\" (optional): an object with optional string fields
  \"position\", \"posture\", \"direction\" and \"momentum\"
- \"meta\" (optional): private notes on how you are evolving
- \"note_to_self\" (optional): a private reminder for your next turn";

fn push_layers(out: &mut String, visible: &VisibleTruth) {
    for (label, layer) in [
        ("Universal", &visible.universal),
        ("Internal", &visible.internal),
        ("External", &visible.external),
    ] {
        if let Some(text) = layer {
            out.push('\n');
            out.push_str(label);
            out.push_str(": ");
            out.push_str(text);
        }
    }
}

pub(crate) fn world(world: &World) -> ChatMessage {
    ChatMessage::system(format!("World: {}\n{}", world.name, world.description.trim()))
}

pub(crate) fn scenario(scenario: &Scenario) -> ChatMessage {
    ChatMessage::system(format!(
        "Scenario: {}\n{}",
        scenario.name,
        scenario.description.trim()
    ))
}

pub(crate) fn own_persona(persona: &Persona, visible: &VisibleTruth) -> ChatMessage {
    let mut out = format!("You are {}.", persona.name);
    push_layers(&mut out, visible);
    out.push_str("\n\n");
    out.push_str(RESPONSE_FORMAT);
    ChatMessage::system(out)
}

pub(crate) fn other_persona(persona: &Persona, visible: &VisibleTruth) -> ChatMessage {
    let mut out = format!("Persona: {}", persona.name);
    push_layers(&mut out, visible);
    ChatMessage::system(out)
}

pub(crate) fn relation(
    relation: &Relation,
    visible: &VisibleTruth,
    members: &[String],
) -> ChatMessage {
    let prefix = match visible.perspective {
        Perspective::Insider => "Your relation",
        Perspective::Outsider => "Other relation",
    };
    let mut out = format!("{prefix}: {}", relation.label());
    if !members.is_empty() {
        out.push_str(" (");
        out.push_str(&members.join(", "));
        out.push(')');
    }
    push_layers(&mut out, visible);
    ChatMessage::system(out)
}

/// What of a turn is shown to the responding assistant.
#[derive(Serialize)]
struct Shown<'a> {
    persona_name: &'a str,
    performance: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    vectors: Option<&'a Vectors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note_to_self: Option<&'a str>,
}

impl<'a> Shown<'a> {
    fn new(content: &'a TurnContent, speaker: &'a str, private: bool) -> Self {
        Self {
            persona_name: speaker,
            performance: &content.performance,
            vectors: content.vectors.as_ref().filter(|v| !v.is_empty()),
            meta: content.meta.as_deref().filter(|_| private),
            note_to_self: content.note_to_self.as_deref().filter(|_| private),
        }
    }
}

/// Render one history turn. `own` marks turns written by the responding
/// assistant; only those carry their private fields and the assistant role.
pub(crate) fn turn(turn: &Turn, speaker: &str, own: bool) -> Result<ChatMessage, DomainError> {
    if turn.directive {
        return Ok(ChatMessage::user(format!(
            "(Out-of-character direction) {}",
            turn.content.performance.trim()
        )));
    }
    let body = serde_json::to_string(&Shown::new(&turn.content, speaker, own))?;
    Ok(if own {
        ChatMessage::assistant(body)
    } else {
        ChatMessage::user(body)
    })
}
