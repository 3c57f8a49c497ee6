//! Testing utilities for the delve engine.
//!
//! This module provides tools for deterministic testing:
//! - `ScriptedDice` for exact die results
//! - `MockNarrator` for scripted (or failing) narration without API calls
//! - `TestHarness` for driving whole sessions
//! - Assertion helpers for verifying game state

use crate::class_data::{Background, CharacterClass};
use crate::dice::Roller;
use crate::narrator::{CombatOutcome, Narrator, NarratorError, NarratorMemory, RoomDescription};
use crate::session::{Command, GameSession, Outcome, Response, SessionConfig};
use crate::world::{Enemy, GamePhase, Party, PartyMember, Room};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

// ============================================================================
// Dice
// ============================================================================

/// A roller that replays scripted results, then falls back to a fixed-seed
/// RNG once a queue runs dry.
///
/// Scripted die results are clamped to `1..=sides`; picks to `0..len`.
pub struct ScriptedDice {
    rolls: VecDeque<u32>,
    chances: VecDeque<bool>,
    picks: VecDeque<usize>,
    fallback: StdRng,
}

impl ScriptedDice {
    /// Script die results in the order they will be rolled.
    pub fn new(rolls: impl IntoIterator<Item = u32>) -> Self {
        Self {
            rolls: rolls.into_iter().collect(),
            chances: VecDeque::new(),
            picks: VecDeque::new(),
            fallback: StdRng::seed_from_u64(0),
        }
    }

    /// Script the outcome of Bernoulli draws.
    pub fn with_chances(mut self, chances: impl IntoIterator<Item = bool>) -> Self {
        self.chances.extend(chances);
        self
    }

    /// Script collection picks.
    pub fn with_picks(mut self, picks: impl IntoIterator<Item = usize>) -> Self {
        self.picks.extend(picks);
        self
    }

    /// Append more die results.
    pub fn queue_rolls(&mut self, rolls: impl IntoIterator<Item = u32>) {
        self.rolls.extend(rolls);
    }

    /// Die results not yet consumed.
    pub fn remaining_rolls(&self) -> usize {
        self.rolls.len()
    }
}

impl Default for ScriptedDice {
    fn default() -> Self {
        Self::new([])
    }
}

impl Roller for ScriptedDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        let sides = sides.max(1);
        match self.rolls.pop_front() {
            Some(value) => value.clamp(1, sides),
            None => self.fallback.gen_range(1..=sides),
        }
    }

    fn chance(&mut self, probability: f64) -> bool {
        match self.chances.pop_front() {
            Some(value) => value,
            None => self.fallback.gen::<f64>() < probability,
        }
    }

    fn pick(&mut self, len: usize) -> usize {
        let len = len.max(1);
        match self.picks.pop_front() {
            Some(index) => index.min(len - 1),
            None => self.fallback.gen_range(0..len),
        }
    }
}

// ============================================================================
// Narrator
// ============================================================================

/// How many times each narrator operation was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NarratorCalls {
    pub rooms: usize,
    pub combat: usize,
    pub enemies: usize,
}

#[derive(Default)]
struct MockState {
    rooms: VecDeque<RoomDescription>,
    lines: VecDeque<String>,
    enemies: VecDeque<Enemy>,
    calls: NarratorCalls,
}

/// A narrator that returns scripted responses.
///
/// Clones share one script, so a test can keep a handle after passing a
/// clone to a session. Unscripted room and combat calls produce plain
/// placeholder text; unscripted enemy calls fail so the fallback enemy is
/// used.
#[derive(Clone, Default)]
pub struct MockNarrator {
    state: Arc<Mutex<MockState>>,
    failing: bool,
    delay: Option<Duration>,
}

impl MockNarrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with `Unavailable`.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Every call sleeps first; pair with a short timeout.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn queue_room(&self, description: impl Into<String>, symbolic: impl Into<String>) -> &Self {
        self.lock().rooms.push_back(RoomDescription {
            description: description.into(),
            symbolic: symbolic.into(),
        });
        self
    }

    pub fn queue_line(&self, line: impl Into<String>) -> &Self {
        self.lock().lines.push_back(line.into());
        self
    }

    pub fn queue_enemy(&self, enemy: Enemy) -> &Self {
        self.lock().enemies.push_back(enemy);
        self
    }

    pub fn calls(&self) -> NarratorCalls {
        self.lock().calls
    }

    async fn pause(&self) -> Result<(), NarratorError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(NarratorError::Unavailable("mock narrator set to fail".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Narrator for MockNarrator {
    async fn describe_room(
        &self,
        room: &Room,
        _character: &PartyMember,
        _memory: &NarratorMemory,
    ) -> Result<RoomDescription, NarratorError> {
        self.lock().calls.rooms += 1;
        self.pause().await?;
        let scripted = self.lock().rooms.pop_front();
        Ok(scripted.unwrap_or_else(|| RoomDescription {
            description: format!("A mock {}.", room.room_type),
            symbolic: "Nothing here means anything yet.".to_string(),
        }))
    }

    async fn narrate_combat(
        &self,
        action: &str,
        character: &PartyMember,
        enemy: &Enemy,
        outcome: CombatOutcome,
        _memory: &NarratorMemory,
    ) -> Result<String, NarratorError> {
        self.lock().calls.combat += 1;
        self.pause().await?;
        let scripted = self.lock().lines.pop_front();
        Ok(scripted.unwrap_or_else(|| {
            let verb = if outcome.hit { "lands" } else { "misses" };
            format!("{}'s {action} {verb} against the {}.", character.name, enemy.name)
        }))
    }

    async fn generate_enemy(
        &self,
        _room_type: &str,
        _depth: u32,
        _character: &PartyMember,
    ) -> Result<Enemy, NarratorError> {
        self.lock().calls.enemies += 1;
        self.pause().await?;
        let scripted = self.lock().enemies.pop_front();
        scripted.ok_or_else(|| NarratorError::Unavailable("no scripted enemy".to_string()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Test harness for running game scenarios against a mock narrator.
pub struct TestHarness {
    pub session: GameSession,
    pub narrator: MockNarrator,
}

impl TestHarness {
    /// A seeded session with a mock narrator.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::new().with_seed(7))
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let narrator = MockNarrator::new();
        let session = GameSession::new(config).with_narrator(Box::new(narrator.clone()));
        Self { session, narrator }
    }

    /// Replace the roller with scripted dice.
    pub fn with_dice(mut self, dice: ScriptedDice) -> Self {
        self.session = self.session.with_roller(Box::new(dice));
        self
    }

    /// Replace the narrator.
    pub fn with_narrator(mut self, narrator: MockNarrator) -> Self {
        self.session = self.session.with_narrator(Box::new(narrator.clone()));
        self.narrator = narrator;
        self
    }

    pub async fn send(&mut self, command: Command) -> Response {
        self.session.execute(command).await
    }

    /// Create a character with the class's standard scores.
    pub async fn create(&mut self, name: &str, class: CharacterClass, background: Background) -> Response {
        self.send(Command::CreateCharacter {
            name: name.to_string(),
            class,
            background,
            stats: None,
            portrait: None,
        })
        .await
    }

    /// Warrior soldier named "Test Hero".
    pub async fn quick_start(&mut self) -> Response {
        self.create("Test Hero", CharacterClass::Warrior, Background::Soldier)
            .await
    }

    pub fn phase(&self) -> GamePhase {
        self.session.phase()
    }

    pub fn party(&self) -> Option<&Party> {
        self.session.party()
    }

    /// Player hp as (current, max); (0, 0) without a party.
    pub fn player_hp(&self) -> (u32, u32) {
        self.party()
            .map(|p| (p.player().hp(), p.player().max_hp()))
            .unwrap_or((0, 0))
    }

    pub fn gold(&self) -> u32 {
        self.party().map(|p| p.gold()).unwrap_or(0)
    }

    pub fn party_size(&self) -> usize {
        self.party().map(|p| p.size()).unwrap_or(0)
    }

    pub fn in_combat(&self) -> bool {
        self.session.combat().is_some()
    }

    pub fn depth(&self) -> u32 {
        self.session
            .dungeon()
            .and_then(|d| d.current())
            .map(|r| r.depth)
            .unwrap_or(0)
    }

    pub fn current_room(&self) -> Option<&Room> {
        self.session.dungeon().and_then(|d| d.current())
    }

    /// The most recent log text.
    pub fn last_log(&self) -> Option<&str> {
        self.session.log().last().map(|e| e.text.as_str())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the session is in `phase`.
#[track_caller]
pub fn assert_phase(harness: &TestHarness, phase: GamePhase) {
    assert_eq!(
        harness.phase(),
        phase,
        "Expected phase {phase}, got {}",
        harness.phase()
    );
}

/// Assert player hp is at the expected values.
#[track_caller]
pub fn assert_hp(harness: &TestHarness, current: u32, max: u32) {
    let (actual_current, actual_max) = harness.player_hp();
    assert_eq!(
        (actual_current, actual_max),
        (current, max),
        "Expected HP {current}/{max}, got {actual_current}/{actual_max}"
    );
}

/// Assert the command was applied.
#[track_caller]
pub fn assert_applied(response: &Response) {
    assert_eq!(
        response.outcome,
        Outcome::Applied,
        "Expected command to apply; log:\n{}",
        response.text()
    );
}

/// Assert the command was rejected with a message containing `needle`.
#[track_caller]
pub fn assert_rejected(response: &Response, needle: &str) {
    match &response.outcome {
        Outcome::Rejected(reason) => assert!(
            reason.contains(needle),
            "Expected rejection mentioning '{needle}', got '{reason}'"
        ),
        Outcome::Applied => panic!("Expected rejection mentioning '{needle}', command applied"),
    }
}

/// Assert combat is running.
#[track_caller]
pub fn assert_in_combat(harness: &TestHarness) {
    assert!(harness.in_combat(), "Expected to be in combat");
}

/// Assert no combat is running.
#[track_caller]
pub fn assert_not_in_combat(harness: &TestHarness) {
    assert!(!harness.in_combat(), "Expected to NOT be in combat");
}
