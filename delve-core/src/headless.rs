//! Headless game interface for programmatic use.
//!
//! This module provides a text-command interface over [`GameSession`]
//! without any UI. It's designed for:
//! - The line-oriented terminal runner
//! - Scripted sessions and automated testing
//!
//! # Example
//!
//! ```ignore
//! use delve_core::headless::{HeadlessConfig, HeadlessGame};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut game = HeadlessGame::new(HeadlessConfig::quick_start("Roland")).await?;
//!
//!     let response = game.send("north").await;
//!     println!("{}", response.text);
//!     println!("HP: {}/{}", game.current_hp(), game.max_hp());
//!     Ok(())
//! }
//! ```

use crate::class_data::{Background, CharacterClass};
use crate::recruitment;
use crate::session::{Command, CommandError, GameSession, Response, SessionConfig, SessionError};
use crate::world::{AbilityScores, Direction, GamePhase, MemberId, Party};

/// Configuration for a headless game.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    pub name: String,
    pub class: CharacterClass,
    pub background: Background,
    /// Class standard array when `None`.
    pub stats: Option<AbilityScores>,
    pub portrait: Option<String>,
    pub session: SessionConfig,
}

impl HeadlessConfig {
    /// Warrior soldier with the standard array.
    pub fn quick_start(name: impl Into<String>) -> Self {
        Self::custom(name, CharacterClass::Warrior, Background::Soldier)
    }

    pub fn custom(name: impl Into<String>, class: CharacterClass, background: Background) -> Self {
        Self {
            name: name.into(),
            class,
            background,
            stats: None,
            portrait: None,
            session: SessionConfig::default(),
        }
    }

    pub fn with_stats(mut self, stats: AbilityScores) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_portrait(mut self, portrait: impl Into<String>) -> Self {
        self.portrait = Some(portrait.into());
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    fn create_command(&self) -> Command {
        Command::CreateCharacter {
            name: self.name.clone(),
            class: self.class,
            background: self.background,
            stats: self.stats,
            portrait: self.portrait.clone(),
        }
    }
}

/// A simplified response from the game.
#[derive(Debug, Clone)]
pub struct GameResponse {
    /// Log lines produced by the command, one per line.
    pub text: String,
    pub applied: bool,
    pub phase: GamePhase,
    /// Combat is waiting on the player.
    pub awaiting_player: bool,
    pub current_hp: u32,
    pub max_hp: u32,
}

/// An entry in the game transcript.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub input: String,
    pub output: String,
    pub turn: usize,
}

/// A game driven by text commands.
pub struct HeadlessGame {
    session: GameSession,
    config: HeadlessConfig,
    transcript: Vec<TranscriptEntry>,
}

impl HeadlessGame {
    /// Start a game, narrated by Claude when `ANTHROPIC_API_KEY` is set.
    pub async fn new(config: HeadlessConfig) -> Result<Self, SessionError> {
        let session = GameSession::new_with_env_narrator(config.session.clone());
        Self::start(session, config).await
    }

    /// Start a game on an existing session, creating the character.
    pub async fn start(session: GameSession, config: HeadlessConfig) -> Result<Self, SessionError> {
        let mut game = Self {
            session,
            config,
            transcript: Vec::new(),
        };
        let response = game.begin().await;
        if !response.applied {
            return Err(SessionError::Rejected(response.text));
        }
        Ok(game)
    }

    /// Create the configured character. Used again after `new` or
    /// `surrender` returns the session to character creation.
    pub async fn begin(&mut self) -> GameResponse {
        let response = self.session.execute(self.config.create_command()).await;
        self.finish("(create character)", response)
    }

    /// Parse and run one line of input.
    pub async fn send(&mut self, input: &str) -> GameResponse {
        let response = match parse_command(input, self.session.party()) {
            Ok(command) => self.session.execute(command).await,
            Err(err) => self.session.reject(err),
        };
        self.finish(input, response)
    }

    fn finish(&mut self, input: &str, response: Response) -> GameResponse {
        self.record(input, &response);
        let (current_hp, max_hp) = self.hp_status();
        GameResponse {
            text: response.text(),
            applied: response.is_applied(),
            phase: response.phase,
            awaiting_player: response.awaiting_player,
            current_hp,
            max_hp,
        }
    }

    fn record(&mut self, input: &str, response: &Response) {
        self.transcript.push(TranscriptEntry {
            input: input.to_string(),
            output: response.text(),
            turn: self.transcript.len() + 1,
        });
    }

    // ========================================================================
    // Game State Queries
    // ========================================================================

    pub fn phase(&self) -> GamePhase {
        self.session.phase()
    }

    fn hp_status(&self) -> (u32, u32) {
        self.session
            .party()
            .map(|p| (p.player().hp(), p.player().max_hp()))
            .unwrap_or((0, 0))
    }

    pub fn current_hp(&self) -> u32 {
        self.hp_status().0
    }

    pub fn max_hp(&self) -> u32 {
        self.hp_status().1
    }

    pub fn gold(&self) -> u32 {
        self.session.party().map(|p| p.gold()).unwrap_or(0)
    }

    /// Depth of the current room.
    pub fn depth(&self) -> u32 {
        self.session
            .dungeon()
            .and_then(|d| d.current())
            .map(|r| r.depth)
            .unwrap_or(0)
    }

    pub fn party_size(&self) -> usize {
        self.session.party().map(|p| p.size()).unwrap_or(0)
    }

    pub fn in_combat(&self) -> bool {
        self.session.phase() == GamePhase::Combat
    }

    pub fn awaiting_player(&self) -> bool {
        self.session.awaiting_player()
    }

    /// The player's inventory, numbered as `use <n>` expects.
    pub fn inventory(&self) -> Vec<String> {
        self.session
            .party()
            .map(|p| {
                p.player()
                    .inventory
                    .iter()
                    .enumerate()
                    .map(|(i, item)| format!("{}. {}", i + 1, item.name))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Allies still looking for work, with cost and reputation gate.
    pub fn recruits(&self) -> Vec<String> {
        let Some(party) = self.session.party() else {
            return Vec::new();
        };
        recruitment::available(party)
            .into_iter()
            .map(|(template, affordable)| {
                format!(
                    "{} ({}): {} gold, reputation {}{}",
                    template.name,
                    template.id,
                    template.cost,
                    template.reputation_required,
                    if affordable { "" } else { " [unavailable]" }
                )
            })
            .collect()
    }

    /// Exits of the current room.
    pub fn exits(&self) -> Vec<Direction> {
        self.session
            .dungeon()
            .and_then(|d| d.current())
            .map(|r| r.exits.clone())
            .unwrap_or_default()
    }

    /// One-line summary for prompts.
    pub fn status_line(&self) -> String {
        let exits: Vec<&str> = self.exits().iter().map(|d| d.name()).collect();
        format!(
            "[{}] HP {}/{} | Gold {} | Depth {} | Party {} | Exits: {}",
            self.phase(),
            self.current_hp(),
            self.max_hp(),
            self.gold(),
            self.depth(),
            self.party_size(),
            if exits.is_empty() { "none".to_string() } else { exits.join(", ") }
        )
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn last_response(&self) -> Option<&str> {
        self.transcript.last().map(|e| e.output.as_str())
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut GameSession {
        &mut self.session
    }

    pub fn config(&self) -> &HeadlessConfig {
        &self.config
    }
}

/// Turn a line of player text into a command.
///
/// `use <n> [member]` takes a 1-based index into the player's inventory;
/// member names match case-insensitively.
pub fn parse_command(input: &str, party: Option<&Party>) -> Result<Command, CommandError> {
    let unrecognized = || CommandError::Unrecognized(input.trim().to_string());
    let lowered = input.trim().to_lowercase();
    let mut words = lowered.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(unrecognized());
    };
    let rest: Vec<&str> = words.collect();
    let rest_joined = rest.join(" ");

    if let Ok(direction) = verb.parse::<Direction>() {
        return if rest.is_empty() {
            Ok(Command::Move(direction))
        } else {
            Err(unrecognized())
        };
    }

    match verb {
        "move" | "go" => rest_joined
            .parse::<Direction>()
            .map(Command::Move)
            .map_err(|_| unrecognized()),
        "search" => Ok(Command::Search),
        "rest" => Ok(Command::Rest),
        "attack" => Ok(Command::Attack),
        "defend" => Ok(Command::Defend),
        "flee" => Ok(Command::Flee),
        "use" => {
            let party = party.ok_or(CommandError::NoAdventure)?;
            let (index, target) = rest.split_first().ok_or_else(unrecognized)?;
            let index: usize = index.parse().map_err(|_| unrecognized())?;
            let item = index
                .checked_sub(1)
                .and_then(|i| party.player().inventory.get(i))
                .ok_or(CommandError::UnknownItem)?;
            let target = match target {
                [] => None,
                names => Some(member_named(party, &names.join(" "))?),
            };
            Ok(Command::UseItem {
                item: item.id,
                target,
            })
        }
        "recruit" if !rest.is_empty() => Ok(Command::Recruit(rest_joined)),
        "resurrect" | "revive" => {
            if rest.is_empty() {
                return Ok(Command::Resurrect(None));
            }
            let party = party.ok_or(CommandError::NoAdventure)?;
            Ok(Command::Resurrect(Some(member_named(party, &rest_joined)?)))
        }
        "surrender" => Ok(Command::Surrender),
        "new" | "restart" => Ok(Command::NewAdventure),
        _ => Err(unrecognized()),
    }
}

fn member_named(party: &Party, name: &str) -> Result<MemberId, CommandError> {
    party
        .member_by_name(name)
        .map(|m| m.id)
        .ok_or_else(|| CommandError::UnknownMember(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character_builder::CharacterBuilder;
    use crate::generator::RoomOdds;
    use crate::narrator::OfflineNarrator;

    fn party() -> Party {
        CharacterBuilder::new()
            .name("Roland")
            .class(CharacterClass::Warrior)
            .background(Background::Soldier)
            .build_party()
            .unwrap()
    }

    #[test]
    fn test_quick_start_config() {
        let config = HeadlessConfig::quick_start("Thorin");
        assert_eq!(config.name, "Thorin");
        assert_eq!(config.class, CharacterClass::Warrior);
        assert_eq!(config.background, Background::Soldier);
        assert!(config.stats.is_none());
    }

    #[test]
    fn test_parse_movement() {
        assert_eq!(parse_command("n", None), Ok(Command::Move(Direction::North)));
        assert_eq!(parse_command("  West ", None), Ok(Command::Move(Direction::West)));
        assert_eq!(parse_command("move east", None), Ok(Command::Move(Direction::East)));
        assert!(matches!(
            parse_command("move up", None),
            Err(CommandError::Unrecognized(_))
        ));
    }

    #[test]
    fn test_parse_use_item() {
        let party = party();
        let first = party.player().inventory[0].id;
        assert_eq!(
            parse_command("use 1", Some(&party)),
            Ok(Command::UseItem {
                item: first,
                target: None
            })
        );
        assert_eq!(
            parse_command("use 1 roland", Some(&party)),
            Ok(Command::UseItem {
                item: first,
                target: Some(party.player_id())
            })
        );
        assert_eq!(parse_command("use 99", Some(&party)), Err(CommandError::UnknownItem));
        assert_eq!(parse_command("use 0", Some(&party)), Err(CommandError::UnknownItem));
        assert_eq!(
            parse_command("use 1 nobody", Some(&party)),
            Err(CommandError::UnknownMember("nobody".into()))
        );
    }

    #[test]
    fn test_parse_misc() {
        assert_eq!(parse_command("recruit Bram", None), Ok(Command::Recruit("bram".into())));
        assert_eq!(parse_command("resurrect", None), Ok(Command::Resurrect(None)));
        assert_eq!(parse_command("new", None), Ok(Command::NewAdventure));
        assert!(matches!(parse_command("dance", None), Err(CommandError::Unrecognized(_))));
        assert!(matches!(parse_command("", None), Err(CommandError::Unrecognized(_))));
    }

    #[tokio::test]
    async fn test_headless_flow_offline() {
        let config = HeadlessConfig::quick_start("Roland")
            .with_session(SessionConfig::new().with_seed(9).with_odds(RoomOdds::empty()));
        let session = GameSession::new(config.session.clone()).with_narrator(Box::new(OfflineNarrator));
        let mut game = HeadlessGame::start(session, config).await.unwrap();

        assert_eq!(game.phase(), GamePhase::Dungeon);
        assert_eq!(game.party_size(), 1);
        assert_eq!(game.gold(), 50);
        assert_eq!(game.depth(), 1);
        assert_eq!((game.current_hp(), game.max_hp()), (14, 14));

        let response = game.send("dance wildly").await;
        assert!(!response.applied);
        assert_eq!(response.text, "Unrecognized command: dance wildly");

        let response = game.send("rest").await;
        assert!(response.applied);
        assert_eq!(game.transcript().len(), 3);
        assert!(game.status_line().starts_with("[dungeon] HP 14/14"));

        game.send("new").await;
        assert_eq!(game.phase(), GamePhase::CharacterCreation);
        assert!(game.begin().await.applied);
        assert_eq!(game.phase(), GamePhase::Dungeon);
    }
}
