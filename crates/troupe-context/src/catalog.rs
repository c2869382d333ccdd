//! Read access to the entities a context is built from.

use troupe_cast::domain::{Assistant, Model, Persona, Relation};
use troupe_entity_store::EntityStore;
use troupe_production::domain::{Production, Scenario, Turn, World};
use uuid::Uuid;

/// Synchronous lookups over already loaded entities.
pub trait Catalog: Send + Sync {
    /// An assistant.
    fn assistant(&self, id: Uuid) -> Option<Assistant>;
    /// A persona.
    fn persona(&self, id: Uuid) -> Option<Persona>;
    /// A model.
    fn model(&self, id: Uuid) -> Option<Model>;
    /// A relation.
    fn relation(&self, id: Uuid) -> Option<Relation>;
    /// A world.
    fn world(&self, id: Uuid) -> Option<World>;
    /// A scenario.
    fn scenario(&self, id: Uuid) -> Option<Scenario>;
    /// A production.
    fn production(&self, id: Uuid) -> Option<Production>;
    /// Every turn of a production.
    fn turns_of(&self, production_id: Uuid) -> Vec<Turn>;
}

/// Served from the store's cache; call
/// [`EntityStore::load_all`] first.
impl Catalog for EntityStore {
    fn assistant(&self, id: Uuid) -> Option<Assistant> {
        self.assistants.get(id)
    }

    fn persona(&self, id: Uuid) -> Option<Persona> {
        self.personas.get(id)
    }

    fn model(&self, id: Uuid) -> Option<Model> {
        self.models.get(id)
    }

    fn relation(&self, id: Uuid) -> Option<Relation> {
        self.relations.get(id)
    }

    fn world(&self, id: Uuid) -> Option<World> {
        self.worlds.get(id)
    }

    fn scenario(&self, id: Uuid) -> Option<Scenario> {
        self.scenarios.get(id)
    }

    fn production(&self, id: Uuid) -> Option<Production> {
        self.productions.get(id)
    }

    fn turns_of(&self, production_id: Uuid) -> Vec<Turn> {
        EntityStore::turns_of(self, production_id)
    }
}
