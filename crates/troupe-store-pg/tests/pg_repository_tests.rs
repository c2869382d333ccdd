//! Integration tests for `PgRepository`.

use sqlx::PgPool;
use troupe_cast::domain::{Assistant, Model, Persona, Relation};
use troupe_core::entity::EntityKind;
use troupe_core::error::DomainError;
use troupe_core::repository::EntityRepository;
use troupe_core::truth::Truth;
use troupe_production::domain::{Production, Turn, TurnContent};
use troupe_store_pg::PgRepository;
use troupe_test_support::fixtures::{assistant, fixed_time, model, persona, production};
use uuid::Uuid;

const USER: Uuid = Uuid::from_u128(1);

async fn seed_cast(pool: &PgPool) -> (Persona, Model, Assistant) {
    let personas = PgRepository::<Persona>::new(pool.clone());
    let models = PgRepository::<Model>::new(pool.clone());
    let assistants = PgRepository::<Assistant>::new(pool.clone());
    let bob = personas
        .insert(USER, &persona(USER, "Bob", "a patient", "an undercover cop", "nervous"))
        .await
        .unwrap();
    let llama = models.insert(USER, &model(USER, "llama")).await.unwrap();
    let bob_assistant = assistants.insert(USER, &assistant(&bob, &llama)).await.unwrap();
    (bob, llama, bob_assistant)
}

// --- personas ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_insert_assigns_a_new_id_and_lists_it(pool: PgPool) {
    let repo = PgRepository::<Persona>::new(pool);
    let draft = persona(USER, "Alice", "a therapist", "anxious", "composed");

    let stored = repo.insert(USER, &draft).await.unwrap();

    assert_ne!(stored.id, draft.id);
    let listed = repo.list(USER).await.unwrap();
    assert_eq!(listed, vec![stored]);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_list_is_scoped_to_the_user(pool: PgPool) {
    let repo = PgRepository::<Persona>::new(pool);
    let other = Uuid::from_u128(2);
    repo.insert(USER, &persona(USER, "Alice", "", "", "")).await.unwrap();

    let listed = repo.list(other).await.unwrap();

    assert!(listed.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_update_of_missing_row_is_not_found(pool: PgPool) {
    let repo = PgRepository::<Persona>::new(pool);
    let ghost = persona(USER, "Ghost", "", "", "");

    let result = repo.update(USER, &ghost).await;

    assert_eq!(result, Err(DomainError::not_found(EntityKind::Persona, ghost.id)));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_update_by_another_user_is_not_found(pool: PgPool) {
    let repo = PgRepository::<Persona>::new(pool);
    let mut stored = repo.insert(USER, &persona(USER, "Alice", "", "", "")).await.unwrap();
    stored.name = "Mallory".into();

    let result = repo.update(Uuid::from_u128(2), &stored).await;

    assert!(matches!(result, Err(DomainError::NotFound { .. })));
    assert_eq!(repo.list(USER).await.unwrap()[0].name, "Alice");
}

// --- relations ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_relation_members_keep_their_order(pool: PgPool) {
    // Arrange
    let personas = PgRepository::<Persona>::new(pool.clone());
    let relations = PgRepository::<Relation>::new(pool);
    let alice = personas.insert(USER, &persona(USER, "Alice", "", "", "")).await.unwrap();
    let bob = personas.insert(USER, &persona(USER, "Bob", "", "", "")).await.unwrap();
    let draft = Relation::new(
        USER,
        Some("Therapy".into()),
        vec![bob.id, alice.id],
        Truth::new("weekly sessions", "mutual suspicion", "a routine appointment"),
        fixed_time(),
    );

    // Act
    let mut stored = relations.insert(USER, &draft).await.unwrap();
    stored.persona_ids = vec![alice.id, bob.id];
    relations.update(USER, &stored).await.unwrap();

    // Assert
    let listed = relations.list(USER).await.unwrap();
    assert_eq!(listed[0].persona_ids, vec![alice.id, bob.id]);
    assert_eq!(listed[0].truth.internal, "mutual suspicion");
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_deleting_a_persona_cascades_to_assistants_and_memberships(pool: PgPool) {
    // Arrange
    let (bob, _, _) = seed_cast(&pool).await;
    let personas = PgRepository::<Persona>::new(pool.clone());
    let relations = PgRepository::<Relation>::new(pool.clone());
    let assistants = PgRepository::<Assistant>::new(pool);
    let alice = personas.insert(USER, &persona(USER, "Alice", "", "", "")).await.unwrap();
    let pair = Relation::new(USER, None, vec![alice.id, bob.id], Truth::default(), fixed_time());
    relations.insert(USER, &pair).await.unwrap();

    // Act
    personas.delete(USER, bob.id).await.unwrap();

    // Assert
    assert!(assistants.list(USER).await.unwrap().is_empty());
    assert_eq!(relations.list(USER).await.unwrap()[0].persona_ids, vec![alice.id]);
}

// --- models ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_deleting_a_model_in_use_is_a_conflict(pool: PgPool) {
    let (_, llama, _) = seed_cast(&pool).await;
    let models = PgRepository::<Model>::new(pool);

    let result = models.delete(USER, llama.id).await;

    assert!(matches!(result, Err(DomainError::Conflict(_))));
    assert_eq!(models.list(USER).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_model_parameters_survive_storage(pool: PgPool) {
    let models = PgRepository::<Model>::new(pool);
    let mut draft = model(USER, "tuned");
    draft.parameters.temperature = Some(0.25);
    draft.parameters.max_tokens = Some(512);
    draft.api_key = Some("sk-local".into());

    let stored = models.insert(USER, &draft).await.unwrap();

    let listed = models.list(USER).await.unwrap();
    assert_eq!(listed, vec![stored]);
    assert_eq!(listed[0].parameters.max_tokens, Some(512));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_delete_of_missing_row_is_not_found(pool: PgPool) {
    let models = PgRepository::<Model>::new(pool);
    let id = Uuid::from_u128(99);

    let result = models.delete(USER, id).await;

    assert_eq!(result, Err(DomainError::not_found(EntityKind::Model, id)));
}

// --- assistants ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_duplicate_pairing_is_a_conflict(pool: PgPool) {
    let (bob, llama, _) = seed_cast(&pool).await;
    let assistants = PgRepository::<Assistant>::new(pool);

    let result = assistants.insert(USER, &assistant(&bob, &llama)).await;

    assert!(matches!(result, Err(DomainError::Conflict(_))));
}

// --- productions and turns ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_production_cast_round_trips(pool: PgPool) {
    let (bob, _, bob_assistant) = seed_cast(&pool).await;
    let productions = PgRepository::<Production>::new(pool);
    let mut draft = production(USER, &[&bob_assistant]);
    draft.persona_ids = vec![bob.id];

    let stored = productions.insert(USER, &draft).await.unwrap();

    assert_eq!(productions.list(USER).await.unwrap(), vec![stored]);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_deleting_a_turn_removes_its_descendants(pool: PgPool) {
    // Arrange
    let (_, _, bob_assistant) = seed_cast(&pool).await;
    let productions = PgRepository::<Production>::new(pool.clone());
    let turns = PgRepository::<Turn>::new(pool);
    let stage = productions
        .insert(USER, &production(USER, &[&bob_assistant]))
        .await
        .unwrap();
    let say = |parent: Option<Uuid>, text: &str| {
        Turn::user(USER, stage.id, parent, TurnContent::performance("User", text), fixed_time())
    };
    let root = turns.insert(USER, &say(None, "Begin.")).await.unwrap();
    let middle = turns.insert(USER, &say(Some(root.id), "Go on.")).await.unwrap();
    turns.insert(USER, &say(Some(middle.id), "And then?")).await.unwrap();

    // Act
    turns.delete(USER, middle.id).await.unwrap();

    // Assert
    assert_eq!(turns.list(USER).await.unwrap(), vec![root]);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_turn_with_unknown_production_is_rejected(pool: PgPool) {
    let turns = PgRepository::<Turn>::new(pool);
    let orphan = Turn::user(
        USER,
        Uuid::from_u128(404),
        None,
        TurnContent::performance("User", "Hello?"),
        fixed_time(),
    );

    let result = turns.insert(USER, &orphan).await;

    assert!(matches!(result, Err(DomainError::Validation(_))));
}
