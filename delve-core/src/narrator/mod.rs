//! Narrator collaborator.
//!
//! The narrator turns structured game facts into flavor text. It is never
//! load-bearing: every call is raced against a timeout, and any failure is
//! logged through `tracing` and replaced by static fallback text built
//! here at the call site. Mechanics are always decided before a narrator
//! call is awaited.

mod claude_narrator;
mod memory;

pub use claude_narrator::ClaudeNarrator;
pub use memory::{NarratorMemory, MAX_RECENT_EVENTS};

use crate::generator;
use crate::world::{Enemy, PartyMember, Room};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors from a narrator backend. Never surfaced to the player.
#[derive(Debug, Error)]
pub enum NarratorError {
    #[error("Narrator unavailable: {0}")]
    Unavailable(String),

    #[error("Narrator timed out after {0:?}")]
    Timeout(Duration),

    #[error("Narrator API error: {0}")]
    Api(String),

    #[error("Malformed narrator response: {0}")]
    Malformed(String),
}

impl From<::claude::Error> for NarratorError {
    fn from(err: ::claude::Error) -> Self {
        match err {
            ::claude::Error::MissingKey => NarratorError::Unavailable(err.to_string()),
            other => NarratorError::Api(other.to_string()),
        }
    }
}

/// Configuration for narrator calls.
#[derive(Debug, Clone)]
pub struct NarratorConfig {
    /// Model override; the client default is used when `None`.
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Upper bound on every narrator call.
    pub timeout: Duration,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 400,
            temperature: Some(0.9),
            timeout: Duration::from_secs(8),
        }
    }
}

impl NarratorConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Two-part room description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDescription {
    /// What the party sees.
    pub description: String,
    /// What the place means.
    pub symbolic: String,
}

/// Mechanical result handed to the narrator for a combat line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombatOutcome {
    pub hit: bool,
    pub damage: u32,
    pub critical: bool,
}

/// A source of narrative text.
#[async_trait]
pub trait Narrator: Send + Sync {
    /// Describe a freshly generated room.
    async fn describe_room(
        &self,
        room: &Room,
        character: &PartyMember,
        memory: &NarratorMemory,
    ) -> Result<RoomDescription, NarratorError>;

    /// One sentence describing a resolved combat action.
    async fn narrate_combat(
        &self,
        action: &str,
        character: &PartyMember,
        enemy: &Enemy,
        outcome: CombatOutcome,
        memory: &NarratorMemory,
    ) -> Result<String, NarratorError>;

    /// Invent an enemy for a room.
    async fn generate_enemy(
        &self,
        room_type: &str,
        depth: u32,
        character: &PartyMember,
    ) -> Result<Enemy, NarratorError>;

    fn name(&self) -> &str {
        "narrator"
    }
}

/// A narrator that is never available. Used when no API key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineNarrator;

#[async_trait]
impl Narrator for OfflineNarrator {
    async fn describe_room(
        &self,
        _room: &Room,
        _character: &PartyMember,
        _memory: &NarratorMemory,
    ) -> Result<RoomDescription, NarratorError> {
        Err(NarratorError::Unavailable("offline".to_string()))
    }

    async fn narrate_combat(
        &self,
        _action: &str,
        _character: &PartyMember,
        _enemy: &Enemy,
        _outcome: CombatOutcome,
        _memory: &NarratorMemory,
    ) -> Result<String, NarratorError> {
        Err(NarratorError::Unavailable("offline".to_string()))
    }

    async fn generate_enemy(
        &self,
        _room_type: &str,
        _depth: u32,
        _character: &PartyMember,
    ) -> Result<Enemy, NarratorError> {
        Err(NarratorError::Unavailable("offline".to_string()))
    }

    fn name(&self) -> &str {
        "offline"
    }
}

// ============================================================================
// Bounded calls with fallbacks
// ============================================================================

/// Race a narrator call against `limit`.
pub async fn consult<T, F>(limit: Duration, call: F) -> Result<T, NarratorError>
where
    F: Future<Output = Result<T, NarratorError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(NarratorError::Timeout(limit)),
    }
}

pub fn fallback_room_description(room: &Room) -> RoomDescription {
    let exits: Vec<&str> = room.exits.iter().map(|d| d.name()).collect();
    RoomDescription {
        description: format!(
            "A dim {} at depth {}. Passages lead {}.",
            room.room_type,
            room.depth,
            if exits.is_empty() {
                "nowhere".to_string()
            } else {
                exits.join(", ")
            }
        ),
        symbolic: "The dark here remembers those who came before.".to_string(),
    }
}

pub fn fallback_combat_line(
    action: &str,
    character: &PartyMember,
    enemy: &Enemy,
    outcome: CombatOutcome,
) -> String {
    match (outcome.hit, outcome.critical) {
        (true, true) => format!(
            "{} lands a devastating {action} on the {} for {} damage!",
            character.name, enemy.name, outcome.damage
        ),
        (true, false) => format!(
            "{}'s {action} strikes the {} for {} damage.",
            character.name, enemy.name, outcome.damage
        ),
        (false, _) => format!("{}'s {action} misses the {}.", character.name, enemy.name),
    }
}

pub async fn describe_room_or_fallback(
    narrator: &dyn Narrator,
    limit: Duration,
    room: &Room,
    character: &PartyMember,
    memory: &NarratorMemory,
) -> RoomDescription {
    match consult(limit, narrator.describe_room(room, character, memory)).await {
        Ok(description) => description,
        Err(err) => {
            tracing::warn!(narrator = narrator.name(), room = %room.id, error = %err, "room description fell back");
            fallback_room_description(room)
        }
    }
}

pub async fn narrate_combat_or_fallback(
    narrator: &dyn Narrator,
    limit: Duration,
    action: &str,
    character: &PartyMember,
    enemy: &Enemy,
    outcome: CombatOutcome,
    memory: &NarratorMemory,
) -> String {
    match consult(
        limit,
        narrator.narrate_combat(action, character, enemy, outcome, memory),
    )
    .await
    {
        Ok(line) if !line.trim().is_empty() => line.trim().to_string(),
        Ok(_) => {
            tracing::warn!(narrator = narrator.name(), "empty combat narration");
            fallback_combat_line(action, character, enemy, outcome)
        }
        Err(err) => {
            tracing::warn!(narrator = narrator.name(), error = %err, "combat narration fell back");
            fallback_combat_line(action, character, enemy, outcome)
        }
    }
}

/// Ask for an enemy; the fixed depth-scaled enemy replaces any failure.
pub async fn generate_enemy_or_fallback(
    narrator: &dyn Narrator,
    limit: Duration,
    room_type: &str,
    depth: u32,
    character: &PartyMember,
) -> Enemy {
    match consult(limit, narrator.generate_enemy(room_type, depth, character)).await {
        Ok(mut enemy) if enemy.is_well_formed() => {
            enemy.ai_generated = true;
            enemy
        }
        Ok(enemy) => {
            tracing::warn!(
                narrator = narrator.name(),
                name = %enemy.name,
                hp = enemy.max_hp,
                attack = enemy.attack,
                defense = enemy.defense,
                "rejected malformed enemy"
            );
            generator::fallback_enemy(depth)
        }
        Err(err) => {
            tracing::warn!(narrator = narrator.name(), error = %err, "enemy generation fell back");
            generator::fallback_enemy(depth)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_data::CharacterClass;
    use crate::world::{AbilityScores, MAX_ENEMY_STAT};

    fn hero() -> PartyMember {
        PartyMember::new("Ayla", CharacterClass::Rogue, AbilityScores::default(), 8)
    }

    struct SlowNarrator;

    #[async_trait]
    impl Narrator for SlowNarrator {
        async fn describe_room(
            &self,
            _room: &Room,
            _character: &PartyMember,
            _memory: &NarratorMemory,
        ) -> Result<RoomDescription, NarratorError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(RoomDescription {
                description: "late".to_string(),
                symbolic: "late".to_string(),
            })
        }

        async fn narrate_combat(
            &self,
            _action: &str,
            _character: &PartyMember,
            _enemy: &Enemy,
            _outcome: CombatOutcome,
            _memory: &NarratorMemory,
        ) -> Result<String, NarratorError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }

        async fn generate_enemy(
            &self,
            _room_type: &str,
            _depth: u32,
            _character: &PartyMember,
        ) -> Result<Enemy, NarratorError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Enemy::new("Late Thing", 5, 1, 1, 1))
        }
    }

    #[tokio::test]
    async fn test_consult_times_out() {
        let result = consult(
            Duration::from_millis(10),
            SlowNarrator.narrate_combat(
                "attack",
                &hero(),
                &Enemy::new("Rat", 3, 1, 0, 5),
                CombatOutcome {
                    hit: true,
                    damage: 2,
                    critical: false,
                },
                &NarratorMemory::default(),
            ),
        )
        .await;
        assert!(matches!(result, Err(NarratorError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_slow_enemy_falls_back() {
        let enemy =
            generate_enemy_or_fallback(&SlowNarrator, Duration::from_millis(10), "crypt", 3, &hero())
                .await;
        assert_eq!(enemy.max_hp, 14);
        assert!(!enemy.ai_generated);
    }

    #[tokio::test]
    async fn test_out_of_range_enemy_falls_back() {
        let narrator = crate::testing::MockNarrator::new();
        narrator.queue_enemy(Enemy::new("Bulwark", 10, 1, i32::MAX as u32, 10));
        narrator.queue_enemy(Enemy::new("Titan", 10, 3_000_000_000, 0, 10));
        narrator.queue_enemy(Enemy::new("Colossus", MAX_ENEMY_STAT + 1, 1, 0, 10));

        for _ in 0..3 {
            let enemy =
                generate_enemy_or_fallback(&narrator, Duration::from_secs(1), "crypt", 2, &hero()).await;
            assert_eq!(enemy.name, generator::FALLBACK_ENEMY_NAME);
            assert_eq!(enemy.max_hp, 12);
        }

        narrator.queue_enemy(Enemy::new("Sentinel", MAX_ENEMY_STAT, MAX_ENEMY_STAT, MAX_ENEMY_STAT, 10));
        let enemy = generate_enemy_or_fallback(&narrator, Duration::from_secs(1), "crypt", 2, &hero()).await;
        assert_eq!(enemy.name, "Sentinel");
    }

    #[tokio::test]
    async fn test_offline_combat_line_is_templated() {
        let line = narrate_combat_or_fallback(
            &OfflineNarrator,
            Duration::from_secs(1),
            "attack",
            &hero(),
            &Enemy::new("Rat", 3, 1, 0, 5),
            CombatOutcome {
                hit: false,
                damage: 0,
                critical: false,
            },
            &NarratorMemory::default(),
        )
        .await;
        assert_eq!(line, "Ayla's attack misses the Rat.");
    }

    #[test]
    fn test_claude_errors_map() {
        assert!(matches!(
            NarratorError::from(::claude::Error::MissingKey),
            NarratorError::Unavailable(_)
        ));
        assert!(matches!(
            NarratorError::from(::claude::Error::Status {
                code: 529,
                body: "overloaded".into()
            }),
            NarratorError::Api(_)
        ));
    }
}
