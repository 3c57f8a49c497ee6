//! GameSession - the game phase controller.
//!
//! A session owns the [`GameState`] aggregate, the narrator and the roller.
//! Every player intent enters through [`GameSession::execute`], is routed by
//! phase to the generator, combat or progression engines, and comes back as
//! a [`Response`] carrying the log entries it produced. Rejected commands
//! leave the state untouched and explain themselves in a `system` entry.

use crate::character_builder::{BuilderError, CharacterBuilder};
use crate::class_data::{Background, CharacterClass};
use crate::combat::{self, CombatContext, CombatStatus, CombatTurn, PendingNarration};
use crate::content;
use crate::dice::{self, Roller};
use crate::events::{GameLog, LogEntry};
use crate::generator::{DungeonGenerator, RoomOdds};
use crate::narrator::{self, ClaudeNarrator, Narrator, NarratorConfig, NarratorError, NarratorMemory, OfflineNarrator};
use crate::progression;
use crate::recruitment;
use crate::world::{
    Ability, AbilityScores, Direction, Dungeon, GamePhase, GameState, ItemId, ItemType, MemberId,
    Party,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use thiserror::Error;

/// Errors from session construction.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Narrator error: {0}")]
    Narrator(#[from] NarratorError),

    #[error("Command rejected: {0}")]
    Rejected(String),
}

/// Why a player command was rejected. The message is shown to the player.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("You can't {command} during {phase}.")]
    WrongPhase {
        command: &'static str,
        phase: GamePhase,
    },

    #[error("There is no exit to the {0}.")]
    NoExit(Direction),

    #[error("You can't rest with the {0} nearby.")]
    EnemyPresent(String),

    #[error("There is nothing here to fight.")]
    NoEnemy,

    #[error("No adventure is under way.")]
    NoAdventure,

    #[error("It is not your turn.")]
    NotYourTurn,

    #[error("You are in no condition to act.")]
    PlayerDown,

    #[error("You don't have that item.")]
    UnknownItem,

    #[error("The {0} can't be used that way.")]
    ItemNotUsable(String),

    #[error("No party member matches '{0}'.")]
    UnknownMember(String),

    #[error("{0} has fallen and can't be healed.")]
    TargetDown(String),

    #[error("{0} is still alive.")]
    TargetAlive(String),

    #[error("Nobody needs resurrecting.")]
    NoneFallen,

    #[error("Not enough gold: {needed} needed, {available} available.")]
    NotEnoughGold { needed: u32, available: u32 },

    #[error("Your reputation ({current}) is too low; {needed} required.")]
    ReputationTooLow { needed: i32, current: i32 },

    #[error("The party is full.")]
    PartyFull,

    #[error("{0} has already joined the party.")]
    AlreadyRecruited(String),

    #[error("No ally called '{0}' is looking for work.")]
    UnknownRecruit(String),

    #[error("Invalid character: {0}")]
    InvalidCharacter(#[from] BuilderError),

    #[error("Unrecognized command: {0}")]
    Unrecognized(String),
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for a game session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deepest level; an enemy-free room here wins the run.
    pub max_depth: u32,
    pub odds: RoomOdds,
    pub narrator: NarratorConfig,
    /// Seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            odds: RoomOdds::default(),
            narrator: NarratorConfig::default(),
            seed: None,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from `DELVE_MODEL`, `DELVE_NARRATOR_TIMEOUT_MS` and
    /// `DELVE_SEED`.
    pub fn from_env() -> Result<Self, SessionError> {
        let mut config = Self::default();
        if let Ok(model) = std::env::var("DELVE_MODEL") {
            config.narrator = config.narrator.with_model(model);
        }
        if let Ok(ms) = std::env::var("DELVE_NARRATOR_TIMEOUT_MS") {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                SessionError::Config(format!("DELVE_NARRATOR_TIMEOUT_MS must be milliseconds, got '{ms}'"))
            })?;
            config.narrator = config.narrator.with_timeout(Duration::from_millis(ms));
        }
        if let Ok(seed) = std::env::var("DELVE_SEED") {
            let seed: u64 = seed
                .trim()
                .parse()
                .map_err(|_| SessionError::Config(format!("DELVE_SEED must be an integer, got '{seed}'")))?;
            config.seed = Some(seed);
        }
        Ok(config)
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn with_odds(mut self, odds: RoomOdds) -> Self {
        self.odds = odds;
        self
    }

    pub fn with_narrator(mut self, narrator: NarratorConfig) -> Self {
        self.narrator = narrator;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

// ============================================================================
// Commands and responses
// ============================================================================

/// A player intent.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateCharacter {
        name: String,
        class: CharacterClass,
        background: Background,
        /// Class standard array when `None`.
        stats: Option<AbilityScores>,
        portrait: Option<String>,
    },
    Move(Direction),
    Search,
    Rest,
    UseItem {
        item: ItemId,
        target: Option<MemberId>,
    },
    Attack,
    Defend,
    Flee,
    Recruit(String),
    Resurrect(Option<MemberId>),
    Surrender,
    NewAdventure,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateCharacter { .. } => "create a character",
            Command::Move(_) => "move",
            Command::Search => "search",
            Command::Rest => "rest",
            Command::UseItem { .. } => "use items",
            Command::Attack => "attack",
            Command::Defend => "defend",
            Command::Flee => "flee",
            Command::Recruit(_) => "recruit",
            Command::Resurrect(_) => "resurrect",
            Command::Surrender => "surrender",
            Command::NewAdventure => "start over",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Rejected(String),
}

/// What a command did.
#[derive(Debug, Clone)]
pub struct Response {
    /// Log entries appended while the command ran.
    pub entries: Vec<LogEntry>,
    pub phase: GamePhase,
    pub outcome: Outcome,
    /// Combat is suspended on the player's turn.
    pub awaiting_player: bool,
}

impl Response {
    pub fn is_applied(&self) -> bool {
        self.outcome == Outcome::Applied
    }

    /// All entry texts joined by newlines.
    pub fn text(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// Session
// ============================================================================

/// A single run of the game.
pub struct GameSession {
    state: GameState,
    narrator: Box<dyn Narrator>,
    roller: Box<dyn Roller>,
    config: SessionConfig,
}

impl GameSession {
    /// A session with the offline narrator.
    pub fn new(config: SessionConfig) -> Self {
        let roller: Box<dyn Roller> = match config.seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(StdRng::from_entropy()),
        };
        Self {
            state: GameState::new(),
            narrator: Box::new(OfflineNarrator),
            roller,
            config,
        }
    }

    /// Configure from the environment. Uses Claude when `ANTHROPIC_API_KEY`
    /// is set and the offline narrator otherwise.
    pub fn from_env() -> Result<Self, SessionError> {
        Ok(Self::new_with_env_narrator(SessionConfig::from_env()?))
    }

    /// A session with the given config, narrated by Claude when an API key
    /// is available.
    pub fn new_with_env_narrator(config: SessionConfig) -> Self {
        let narrator: Box<dyn Narrator> = match ClaudeNarrator::from_env(config.narrator.clone()) {
            Ok(narrator) => Box::new(narrator),
            Err(err) => {
                tracing::warn!(error = %err, "narrator offline; using fallback text");
                Box::new(OfflineNarrator)
            }
        };
        Self::new(config).with_narrator(narrator)
    }

    pub fn with_narrator(mut self, narrator: Box<dyn Narrator>) -> Self {
        self.narrator = narrator;
        self
    }

    pub fn with_roller(mut self, roller: Box<dyn Roller>) -> Self {
        self.roller = roller;
        self
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> GamePhase {
        self.state.phase
    }

    pub fn party(&self) -> Option<&Party> {
        self.state.party.as_ref()
    }

    pub fn dungeon(&self) -> Option<&Dungeon> {
        self.state.dungeon.as_ref()
    }

    pub fn combat(&self) -> Option<&combat::CombatState> {
        self.state.combat.as_ref()
    }

    pub fn log(&self) -> &GameLog {
        &self.state.log
    }

    pub fn narrator_name(&self) -> &str {
        self.narrator.name()
    }

    /// Combat is waiting on the player.
    pub fn awaiting_player(&self) -> bool {
        match (&self.state.combat, &self.state.party) {
            (Some(combat), Some(party)) => {
                self.state.phase == GamePhase::Combat && combat.awaiting_player(party)
            }
            _ => false,
        }
    }

    /// Run one command to completion.
    pub async fn execute(&mut self, command: Command) -> Response {
        let mark = self.state.log.len();
        let name = command.name();
        match self.dispatch(command).await {
            Ok(()) => self.respond(mark, Outcome::Applied),
            Err(err) => {
                tracing::debug!(command = name, error = %err, "command rejected");
                self.reject(err)
            }
        }
    }

    /// Record a rejection raised outside the session, such as by a text
    /// parser. Only the log changes.
    pub fn reject(&mut self, error: CommandError) -> Response {
        let mark = self.state.log.len();
        let reason = error.to_string();
        self.state.log.system(reason.clone());
        self.respond(mark, Outcome::Rejected(reason))
    }

    fn respond(&self, mark: usize, outcome: Outcome) -> Response {
        Response {
            entries: self.state.log.since(mark).to_vec(),
            phase: self.state.phase,
            outcome,
            awaiting_player: self.awaiting_player(),
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<(), CommandError> {
        let phase = self.state.phase;
        let wrong_phase = |command: &Command| CommandError::WrongPhase {
            command: command.name(),
            phase,
        };

        match (phase, command) {
            (
                GamePhase::CharacterCreation,
                Command::CreateCharacter {
                    name,
                    class,
                    background,
                    stats,
                    portrait,
                },
            ) => {
                let mut builder = CharacterBuilder::new()
                    .name(name)
                    .class(class)
                    .background(background);
                if let Some(stats) = stats {
                    builder = builder.ability_scores(stats);
                }
                if let Some(portrait) = portrait {
                    builder = builder.portrait(portrait);
                }
                self.start_adventure(builder.build_party()?).await;
                Ok(())
            }
            (GamePhase::Dungeon, Command::Move(direction)) => self.move_to(direction).await,
            (GamePhase::Dungeon, Command::Search) => self.search(),
            (GamePhase::Dungeon, Command::Rest) => self.rest(),
            (GamePhase::Dungeon, Command::UseItem { item, target }) => self.use_item_outside_combat(item, target),
            (GamePhase::Dungeon, Command::Attack) => self.engage_room_enemy().await,
            (GamePhase::Dungeon, Command::Recruit(id)) => self.recruit(&id),
            (GamePhase::Dungeon, Command::Resurrect(target)) => self.resurrect_one(target),
            (GamePhase::Combat, Command::Attack) => self.player_combat_turn(CombatTurn::attack).await,
            (GamePhase::Combat, Command::Defend) => self.player_combat_turn(CombatTurn::defend).await,
            (GamePhase::Combat, Command::Flee) => self.player_combat_turn(CombatTurn::flee).await,
            (GamePhase::Combat, Command::UseItem { item, target }) => {
                self.player_combat_turn(|actor| CombatTurn::use_item(actor, item, target))
                    .await
            }
            (GamePhase::Death, Command::Resurrect(_)) => self.resurrect_party(),
            (GamePhase::Death, Command::Surrender) => {
                self.state.log.death("You surrender to the dark. The adventure is over.");
                self.reset();
                Ok(())
            }
            (_, Command::NewAdventure) => {
                self.state.log.system("A new adventure begins.");
                self.reset();
                Ok(())
            }
            (_, command) => Err(wrong_phase(&command)),
        }
    }

    fn reset(&mut self) {
        self.state.party = None;
        self.state.dungeon = None;
        self.state.combat = None;
        self.set_phase(GamePhase::CharacterCreation);
    }

    fn set_phase(&mut self, phase: GamePhase) {
        if self.state.phase != phase {
            tracing::info!(from = %self.state.phase, to = %phase, "phase change");
            self.state.phase = phase;
        }
    }

    fn timeout(&self) -> Duration {
        self.config.narrator.timeout
    }

    // ------------------------------------------------------------------------
    // Exploration
    // ------------------------------------------------------------------------

    async fn start_adventure(&mut self, party: Party) {
        let generator = DungeonGenerator::new(&self.config.odds, self.narrator.as_ref(), self.config.narrator.timeout);
        let dungeon = generator
            .generate_dungeon(self.roller.as_mut(), self.config.max_depth, Some(party.player()))
            .await;

        let player = party.player();
        self.state.log.system(format!(
            "{} the {} {} descends into the {}.",
            player.name,
            party.background,
            player.class,
            dungeon.theme
        ));
        if let Some(room) = dungeon.current() {
            self.state.log.narrative(room.description.clone());
            self.state.log.narrative(room.symbolic.clone());
        }

        self.state.party = Some(party);
        self.state.dungeon = Some(dungeon);
        self.state.combat = None;
        self.set_phase(GamePhase::Dungeon);
        self.on_room_entered().await;
    }

    async fn move_to(&mut self, direction: Direction) -> Result<(), CommandError> {
        let dungeon = self.state.dungeon.as_ref().ok_or(CommandError::NoAdventure)?;
        let from = dungeon.current_room.clone();
        let current = dungeon.current().ok_or(CommandError::NoExit(direction))?;
        if !current.has_exit(direction) {
            return Err(CommandError::NoExit(direction));
        }

        let linked = current.links.get(&direction).cloned();
        if let Some(linked) = linked {
            let Some(dungeon) = self.state.dungeon.as_mut() else {
                return Ok(());
            };
            dungeon.current_room = linked;
            if let Some(room) = dungeon.current() {
                self.state
                    .log
                    .system(format!("You head {direction}, back to the {}.", room.room_type));
            }
            self.on_room_entered().await;
            return Ok(());
        }

        let depth = (current.depth + 1).min(dungeon.max_depth);
        let index = dungeon.next_index();
        let generator = DungeonGenerator::new(&self.config.odds, self.narrator.as_ref(), self.config.narrator.timeout);
        let character = self.state.party.as_ref().map(|p| p.player());
        let mut room = generator
            .generate_room(self.roller.as_mut(), depth, index, character, &dungeon.memory)
            .await;

        // Narration was awaited; make sure the party is still where it was.
        let Some(dungeon) = self.state.dungeon.as_mut() else {
            return Ok(());
        };
        if dungeon.current_room != from {
            tracing::warn!(room = %room.id, "party moved during generation; room discarded");
            return Ok(());
        }

        room.explored = true;
        let kind = room.room_type.clone();
        let description = room.description.clone();
        let symbolic = room.symbolic.clone();
        let id = dungeon.attach_room(direction, room);
        dungeon.current_room = id.clone();
        dungeon
            .memory
            .record(format!("Entered a {kind} at depth {depth}"));
        tracing::debug!(room = %id, depth, "entered new room");

        self.state
            .log
            .system(format!("You head {direction} into a {kind} (depth {depth})."));
        self.state.log.narrative(description);
        self.state.log.narrative(symbolic);
        self.on_room_entered().await;
        Ok(())
    }

    /// Start combat with a room enemy, or win at the bottom.
    async fn on_room_entered(&mut self) {
        let Some(dungeon) = self.state.dungeon.as_ref() else {
            return;
        };
        let Some(room) = dungeon.current() else {
            return;
        };
        if room.has_enemy() {
            self.begin_combat().await;
        } else {
            self.check_victory();
        }
    }

    fn check_victory(&mut self) {
        let Some(dungeon) = self.state.dungeon.as_ref() else {
            return;
        };
        let Some(room) = dungeon.current() else {
            return;
        };
        if self.state.phase == GamePhase::Dungeon && !room.has_enemy() && room.depth >= dungeon.max_depth {
            self.state.log.system(format!(
                "You stand at the bottom of the {}. The dungeon is conquered!",
                dungeon.theme
            ));
            self.set_phase(GamePhase::Victory);
        }
    }

    fn search(&mut self) -> Result<(), CommandError> {
        let (Some(party), Some(dungeon)) = (self.state.party.as_mut(), self.state.dungeon.as_mut()) else {
            return Err(CommandError::NoAdventure);
        };
        if !party.player().is_alive() {
            return Err(CommandError::PlayerDown);
        }
        let Some(room) = dungeon.current_mut() else {
            return Ok(());
        };
        let log = &mut self.state.log;
        let mut found_anything = false;

        if room.has_trap() {
            found_anything = true;
            room.trap = false;
            let player_id = party.player_id();
            let dex = party.player().modifier(Ability::Dexterity);
            let dc = 10 + room.depth as i32;
            let natural = dice::d(self.roller.as_mut(), 20) as i32;
            log.dice(format!(
                "Trap: d20 ({natural}) {dex:+} = {} vs {dc}",
                natural + dex
            ));
            if natural + dex >= dc {
                log.system("You spot a pressure plate and step around it.");
            } else {
                let damage = dice::d(self.roller.as_mut(), 6) + room.depth;
                if let Some(player) = party.member_mut(player_id) {
                    let result = player.take_damage(damage);
                    log.combat(format!(
                        "A hidden trap springs! {} takes {} damage. ({}/{} hp)",
                        player.name,
                        result.damage_taken,
                        player.hp(),
                        player.max_hp()
                    ));
                    if result.dropped_to_zero {
                        player.record_story("Fell to a trap");
                        log.death(format!("{} falls!", player.name));
                    }
                }
                if party.all_down() {
                    log.death("The whole party has fallen.");
                    tracing::info!("party wiped by trap");
                    self.set_phase(GamePhase::Death);
                    return Ok(());
                }
            }
        }

        if room.has_loot() {
            found_anything = true;
            let player_id = party.player_id();
            for item in std::mem::take(&mut room.loot) {
                if item.item_type == ItemType::Treasure {
                    let value = item.value.unwrap_or(0);
                    party.add_gold(value);
                    log.system(format!("You find {} worth {value} gold.", item.name));
                } else if let Some(player) = party.member_mut(player_id) {
                    log.system(format!("You find a {}.", item.name));
                    player.inventory.push(item);
                }
            }
        }

        if !found_anything {
            log.system("You search the room and find nothing of note.");
        }
        Ok(())
    }

    fn rest(&mut self) -> Result<(), CommandError> {
        let (Some(party), Some(dungeon)) = (self.state.party.as_mut(), self.state.dungeon.as_ref()) else {
            return Err(CommandError::NoAdventure);
        };
        if let Some(enemy) = dungeon.current().and_then(|r| r.enemy.as_ref()).filter(|e| !e.is_defeated()) {
            return Err(CommandError::EnemyPresent(enemy.name.clone()));
        }

        let log = &mut self.state.log;
        for member in party.members_mut().filter(|m| m.is_alive()) {
            let rolled = dice::d(self.roller.as_mut(), 8) as i32;
            let amount = (rolled + member.modifier(Ability::Constitution)).max(1) as u32;
            let restored = member.heal(amount);
            log.system(format!(
                "{} rests and recovers {restored} hp. ({}/{} hp)",
                member.name,
                member.hp(),
                member.max_hp()
            ));
        }
        party.adjust_morale(5);
        Ok(())
    }

    fn use_item_outside_combat(&mut self, item: ItemId, target: Option<MemberId>) -> Result<(), CommandError> {
        let party = self.state.party.as_mut().ok_or(CommandError::NoAdventure)?;
        let player_id = party.player_id();
        if !party.player().is_alive() {
            return Err(CommandError::PlayerDown);
        }
        combat::heal_with_item(
            party,
            self.roller.as_mut(),
            &mut self.state.log,
            player_id,
            item,
            target.unwrap_or(player_id),
        )?;
        Ok(())
    }

    fn recruit(&mut self, id: &str) -> Result<(), CommandError> {
        let template = content::recruit(id).ok_or_else(|| CommandError::UnknownRecruit(id.to_string()))?;
        let party = self.state.party.as_mut().ok_or(CommandError::NoAdventure)?;
        recruitment::recruit(party, template, &mut self.state.log)?;
        if let Some(dungeon) = self.state.dungeon.as_mut() {
            dungeon.memory.record(format!("{} joined the party", template.name));
        }
        Ok(())
    }

    fn resurrect_one(&mut self, target: Option<MemberId>) -> Result<(), CommandError> {
        let party = self.state.party.as_mut().ok_or(CommandError::NoAdventure)?;
        let id = match target {
            Some(id) => id,
            None => party
                .members()
                .iter()
                .find(|m| !m.is_alive())
                .map(|m| m.id)
                .ok_or(CommandError::NoneFallen)?,
        };
        progression::resurrect_member(party, id, &mut self.state.log)?;
        Ok(())
    }

    fn resurrect_party(&mut self) -> Result<(), CommandError> {
        let party = self.state.party.as_mut().ok_or(CommandError::NoAdventure)?;
        progression::resurrect_party(party, &mut self.state.log)?;
        self.set_phase(GamePhase::Dungeon);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Combat
    // ------------------------------------------------------------------------

    /// Re-engage an enemy the party fled from.
    async fn engage_room_enemy(&mut self) -> Result<(), CommandError> {
        let has_enemy = self
            .state
            .dungeon
            .as_ref()
            .and_then(|d| d.current())
            .is_some_and(|r| r.has_enemy());
        if !has_enemy {
            return Err(CommandError::NoEnemy);
        }
        if !self.state.party.as_ref().is_some_and(|p| p.player().is_alive()) {
            return Err(CommandError::PlayerDown);
        }
        self.begin_combat().await;
        Ok(())
    }

    async fn begin_combat(&mut self) {
        let (Some(party), Some(dungeon)) = (self.state.party.as_ref(), self.state.dungeon.as_mut()) else {
            return;
        };
        let Some(enemy) = dungeon.current_mut().and_then(|r| r.enemy.take()) else {
            return;
        };
        self.state.log.combat(format!(
            "A {} blocks the way! ({}/{} hp)",
            enemy.name,
            enemy.hp(),
            enemy.max_hp
        ));
        if !enemy.symbolic.is_empty() {
            self.state.log.narrative(enemy.symbolic.clone());
        }
        dungeon.memory.record(format!("Fought the {}", enemy.name));
        self.state.combat = Some(combat::initiate(enemy, party));
        self.set_phase(GamePhase::Combat);
        self.run_combat().await;
    }

    async fn player_combat_turn(&mut self, make_turn: impl FnOnce(MemberId) -> CombatTurn) -> Result<(), CommandError> {
        let (Some(party), Some(combat_state)) = (self.state.party.as_mut(), self.state.combat.as_mut()) else {
            return Err(CommandError::NoAdventure);
        };
        let turn = make_turn(party.player_id());
        let mut ctx = CombatContext {
            party,
            combat: combat_state,
            roller: self.roller.as_mut(),
            log: &mut self.state.log,
        };
        let step = combat::player_turn(&mut ctx, turn)?;
        self.narrate(step.narration).await;
        self.run_combat().await;
        Ok(())
    }

    /// Run non-player turns until the player must act or the fight ends.
    async fn run_combat(&mut self) {
        loop {
            let step = {
                let (Some(party), Some(combat_state)) = (self.state.party.as_mut(), self.state.combat.as_mut()) else {
                    return;
                };
                let mut ctx = CombatContext {
                    party,
                    combat: combat_state,
                    roller: self.roller.as_mut(),
                    log: &mut self.state.log,
                };
                combat::advance(&mut ctx)
            };
            match step {
                Some(step) => self.narrate(step.narration).await,
                None => break,
            }
        }
        self.settle_combat();
    }

    async fn narrate(&mut self, pending: Option<PendingNarration>) {
        let Some(pending) = pending else {
            return;
        };
        let default_memory = NarratorMemory::default();
        let memory = self
            .state
            .dungeon
            .as_ref()
            .map(|d| &d.memory)
            .unwrap_or(&default_memory);
        let line = narrator::narrate_combat_or_fallback(
            self.narrator.as_ref(),
            self.timeout(),
            &pending.action,
            &pending.character,
            &pending.enemy,
            pending.outcome,
            memory,
        )
        .await;
        self.state.log.narrative(line);
        if pending.outcome.hit {
            if let Some(dungeon) = self.state.dungeon.as_mut() {
                dungeon.memory.record(format!(
                    "{} struck the {} for {}",
                    pending.character.name, pending.enemy.name, pending.outcome.damage
                ));
            }
        }
    }

    /// Apply a resolved fight to the room and phase.
    fn settle_combat(&mut self) {
        let status = match &self.state.combat {
            Some(combat) if combat.status().is_resolved() => combat.status(),
            _ => return,
        };
        let Some(combat) = self.state.combat.take() else {
            return;
        };
        let mut enemy = combat.into_enemy();
        let room = self.state.dungeon.as_mut().and_then(|d| d.current_mut());

        match status {
            CombatStatus::Victory => {
                if let Some(room) = room {
                    for item in std::mem::take(&mut enemy.loot) {
                        self.state
                            .log
                            .system(format!("The {} dropped a {}.", enemy.name, item.name));
                        room.loot.push(item);
                    }
                }
                if let Some(dungeon) = self.state.dungeon.as_mut() {
                    dungeon.memory.record(format!("Defeated the {}", enemy.name));
                }
                self.set_phase(GamePhase::Dungeon);
                self.check_victory();
            }
            CombatStatus::Fled => {
                if let Some(room) = room {
                    room.enemy = Some(enemy);
                }
                self.set_phase(GamePhase::Dungeon);
            }
            CombatStatus::Defeat => {
                if let Some(room) = room {
                    room.enemy = Some(enemy);
                }
                let cost = self
                    .state
                    .party
                    .as_ref()
                    .map(progression::party_resurrection_cost)
                    .unwrap_or(0);
                self.state.log.death(format!(
                    "Darkness takes the party. Resurrect for {cost} gold, or surrender."
                ));
                self.set_phase(GamePhase::Death);
            }
            CombatStatus::AwaitingPartyTurn | CombatStatus::AwaitingEnemyTurn => {}
        }
    }
}
