//! Party dungeon-crawler engine with an AI narrator.
//!
//! This crate provides:
//! - Procedural dungeon generation with depth-scaled loot, traps and enemies
//! - A turn-scheduled combat engine with ally policies
//! - Progression, recruitment and resurrection
//! - A narrator capability backed by Claude, with offline fallbacks
//!
//! # Quick Start
//!
//! ```ignore
//! use delve_core::{Command, GameSession, SessionConfig};
//! use delve_core::{Background, CharacterClass};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = GameSession::from_env()?;
//!     let response = session
//!         .execute(Command::CreateCharacter {
//!             name: "Roland".into(),
//!             class: CharacterClass::Warrior,
//!             background: Background::Soldier,
//!             stats: None,
//!             portrait: None,
//!         })
//!         .await;
//!     println!("{}", response.text());
//!     Ok(())
//! }
//! ```

pub mod ai;
pub mod character_builder;
pub mod class_data;
pub mod combat;
pub mod content;
pub mod dice;
pub mod events;
pub mod generator;
pub mod headless;
pub mod items;
pub mod narrator;
pub mod progression;
pub mod recruitment;
pub mod session;
pub mod testing;
pub mod world;

// Primary public API
pub use character_builder::{BuilderError, CharacterBuilder};
pub use class_data::{Background, CharacterClass};
pub use events::{GameLog, LogCategory, LogEntry};
pub use headless::{HeadlessConfig, HeadlessGame};
pub use narrator::{ClaudeNarrator, Narrator, NarratorConfig, NarratorError, OfflineNarrator};
pub use session::{Command, CommandError, GameSession, Outcome, Response, SessionConfig, SessionError};
pub use testing::{MockNarrator, ScriptedDice, TestHarness};
pub use world::{Direction, GamePhase, GameState};
