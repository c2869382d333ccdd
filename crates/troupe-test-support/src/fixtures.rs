//! Entity builders with deterministic defaults.

use chrono::{DateTime, TimeZone, Utc};
use troupe_cast::domain::{Assistant, Model, Persona};
use troupe_core::truth::Truth;
use troupe_production::domain::Production;
use uuid::Uuid;

/// 2026-01-15 10:00:00 UTC.
#[must_use]
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

/// A persona with the given truth layers.
#[must_use]
pub fn persona(
    user_id: Uuid,
    name: &str,
    universal: &str,
    internal: &str,
    external: &str,
) -> Persona {
    Persona::new(
        user_id,
        name,
        Truth::new(universal, internal, external),
        fixed_time(),
    )
}

/// A model served from a local OpenAI-compatible endpoint.
#[must_use]
pub fn model(user_id: Uuid, name: &str) -> Model {
    Model::new(user_id, name, "http://localhost:11434/v1", "llama3", fixed_time())
}

/// An assistant pairing `persona` with `model`.
#[must_use]
pub fn assistant(persona: &Persona, model: &Model) -> Assistant {
    Assistant::new(persona.user_id, persona.id, model.id, fixed_time())
}

/// A production casting `assistants`, without world or scenario.
#[must_use]
pub fn production(user_id: Uuid, assistants: &[&Assistant]) -> Production {
    let mut production = Production::new(user_id, "Rehearsal", fixed_time());
    production.assistant_ids = assistants.iter().map(|assistant| assistant.id).collect();
    production
}
