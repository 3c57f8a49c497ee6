//! Procedural dungeon generation.
//!
//! Rooms are built on demand. Every random draw for a room happens before
//! the narrator is consulted, so a seeded roller yields the same layout,
//! loot, traps and enemy placement whether or not narration succeeds.

use crate::content::{ROOM_TEMPLATES, THEMES};
use crate::dice::Roller;
use crate::items;
use crate::narrator::{self, Narrator, NarratorMemory};
use crate::world::{Dungeon, Enemy, PartyMember, Room, RoomId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Flavor text for the synthesized enemy.
pub const FALLBACK_ENEMY_NAME: &str = "Lurking Horror";
pub const FALLBACK_ENEMY_FLAVOR: &str = "A shape detaches from the dark, patient and hungry.";

/// Linear, depth-scaled Bernoulli odds for room contents.
///
/// Probabilities are not clamped; anything at or above 1.0 is certain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomOdds {
    pub loot_base: f64,
    pub loot_per_depth: f64,
    pub trap_base: f64,
    pub trap_per_depth: f64,
    pub enemy_base: f64,
    pub enemy_per_depth: f64,
    /// Chance a spawned enemy carries one item, dropped when it dies.
    pub enemy_loot: f64,
}

impl Default for RoomOdds {
    fn default() -> Self {
        Self {
            loot_base: 0.3,
            loot_per_depth: 0.1,
            trap_base: 0.2,
            trap_per_depth: 0.05,
            enemy_base: 0.4,
            enemy_per_depth: 0.1,
            enemy_loot: 0.5,
        }
    }
}

impl RoomOdds {
    pub fn loot(&self, depth: u32) -> f64 {
        self.loot_base + self.loot_per_depth * depth as f64
    }

    pub fn trap(&self, depth: u32) -> f64 {
        self.trap_base + self.trap_per_depth * depth as f64
    }

    pub fn enemy(&self, depth: u32) -> f64 {
        self.enemy_base + self.enemy_per_depth * depth as f64
    }

    /// Odds that never place anything.
    pub fn empty() -> Self {
        Self {
            loot_base: 0.0,
            loot_per_depth: 0.0,
            trap_base: 0.0,
            trap_per_depth: 0.0,
            enemy_base: 0.0,
            enemy_per_depth: 0.0,
            enemy_loot: 0.0,
        }
    }
}

/// The fixed enemy used whenever the narrator cannot supply one.
pub fn fallback_enemy(depth: u32) -> Enemy {
    Enemy::new(
        FALLBACK_ENEMY_NAME,
        8 + 2 * depth,
        3 + depth,
        depth / 2,
        20 + 15 * depth,
    )
    .with_symbolic(FALLBACK_ENEMY_FLAVOR)
}

/// Result of the mechanical half of room generation.
#[derive(Debug, Clone)]
pub struct RoomRoll {
    pub room: Room,
    /// The enemy draw succeeded; an enemy still has to be supplied.
    pub enemy_rolled: bool,
}

/// Draw a room's template and contents. Pure apart from the roller.
pub fn roll_room(roller: &mut dyn Roller, odds: &RoomOdds, depth: u32, index: u32) -> RoomRoll {
    let template = &ROOM_TEMPLATES[roller.pick(ROOM_TEMPLATES.len())];

    let has_loot = roller.chance(odds.loot(depth));
    let has_trap = roller.chance(odds.trap(depth));
    let enemy_rolled = roller.chance(odds.enemy(depth));

    let loot = if has_loot {
        let count = if roller.chance(0.7) { 1 } else { 2 };
        (0..count).map(|_| items::random_loot(roller)).collect()
    } else {
        Vec::new()
    };

    tracing::debug!(
        depth,
        index,
        room_type = template.room_type,
        has_loot,
        has_trap,
        enemy_rolled,
        "rolled room"
    );

    RoomRoll {
        room: Room {
            id: RoomId::new(depth, index),
            room_type: template.room_type.to_string(),
            layout: template.layout.to_string(),
            exits: template.exits.to_vec(),
            description: String::new(),
            symbolic: String::new(),
            explored: false,
            loot,
            trap: has_trap,
            enemy: None,
            depth,
            links: HashMap::new(),
        },
        enemy_rolled,
    }
}

/// Builds rooms and dungeons, consulting the narrator for flavor.
pub struct DungeonGenerator<'a> {
    pub odds: &'a RoomOdds,
    pub narrator: &'a dyn Narrator,
    pub timeout: Duration,
}

impl<'a> DungeonGenerator<'a> {
    pub fn new(odds: &'a RoomOdds, narrator: &'a dyn Narrator, timeout: Duration) -> Self {
        Self {
            odds,
            narrator,
            timeout,
        }
    }

    /// Generate the room with id `depth_index`.
    ///
    /// Without a character there is nobody to describe the room to, so the
    /// narrator is skipped and fallbacks are used directly.
    pub async fn generate_room(
        &self,
        roller: &mut dyn Roller,
        depth: u32,
        index: u32,
        character: Option<&PartyMember>,
        memory: &NarratorMemory,
    ) -> Room {
        let RoomRoll {
            mut room,
            enemy_rolled,
        } = roll_room(roller, self.odds, depth, index);

        if enemy_rolled {
            let mut enemy = match character {
                Some(character) => {
                    narrator::generate_enemy_or_fallback(
                        self.narrator,
                        self.timeout,
                        &room.room_type,
                        depth,
                        character,
                    )
                    .await
                }
                None => fallback_enemy(depth),
            };
            // Zero odds draw nothing, so scripted dice stay aligned.
            if self.odds.enemy_loot > 0.0 && roller.chance(self.odds.enemy_loot) {
                enemy.loot.push(items::random_loot(roller));
            }
            room.enemy = Some(enemy);
        }

        let text = match character {
            Some(character) => {
                narrator::describe_room_or_fallback(
                    self.narrator,
                    self.timeout,
                    &room,
                    character,
                    memory,
                )
                .await
            }
            None => narrator::fallback_room_description(&room),
        };
        room.description = text.description;
        room.symbolic = text.symbolic;
        room
    }

    /// A new dungeon holding one explored room at depth 1.
    pub async fn generate_dungeon(
        &self,
        roller: &mut dyn Roller,
        max_depth: u32,
        character: Option<&PartyMember>,
    ) -> Dungeon {
        let theme = THEMES[roller.pick(THEMES.len())];
        let mut memory = NarratorMemory::default();
        memory.record(format!("The party descends into the {theme}"));

        let mut start = self.generate_room(roller, 1, 0, character, &memory).await;
        start.explored = true;

        tracing::debug!(theme, max_depth, start = %start.id, "generated dungeon");
        Dungeon::new(start, max_depth.max(1), theme, memory)
    }
}
