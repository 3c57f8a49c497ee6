//! Game-state types.
//!
//! Party members, the party, items, enemies, rooms, the dungeon, and the
//! [`GameState`] aggregate that a session owns. Fields that carry
//! invariants (hit points, experience, gold, morale) are private and change
//! only through the methods here and the combat/progression engines.

use crate::class_data::{Background, CharacterClass};
use crate::combat::CombatState;
use crate::dice::modifier;
use crate::events::GameLog;
use crate::narrator::NarratorMemory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Largest party the game allows.
pub const MAX_PARTY_SIZE: usize = 4;

/// Experience needed for level 2; each level adds [`XP_STEP`].
pub const BASE_XP_TO_NEXT: u32 = 100;
pub const XP_STEP: u32 = 50;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for party members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberId(pub Uuid);

impl MemberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a single item instance. Two potions with the same name are
/// still different items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

/// Room handle in the `depth_index` format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(depth: u32, index: u32) -> Self {
        Self(format!("{depth}_{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the handle back into `(depth, index)`.
    pub fn parts(&self) -> Option<(u32, u32)> {
        let (depth, index) = self.0.split_once('_')?;
        Some((depth.parse().ok()?, index.parse().ok()?))
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }

    pub fn all() -> [Ability; 6] {
        [
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

/// Ability scores container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl AbilityScores {
    pub fn new(str: u8, dex: u8, con: u8, int: u8, wis: u8, cha: u8) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    pub fn get(&self, ability: Ability) -> u8 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn set(&mut self, ability: Ability, value: u8) {
        match ability {
            Ability::Strength => self.strength = value,
            Ability::Dexterity => self.dexterity = value,
            Ability::Constitution => self.constitution = value,
            Ability::Intelligence => self.intelligence = value,
            Ability::Wisdom => self.wisdom = value,
            Ability::Charisma => self.charisma = value,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        modifier(self.get(ability))
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

// ============================================================================
// Items
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemType {
    Weapon,
    Armor,
    Consumable,
    Treasure,
    Tool,
}

/// Name of the consumable that deals damage instead of healing.
pub const SPELL_SCROLL: &str = "Spell Scroll";

/// An item instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub item_type: ItemType,
    pub damage: Option<u32>,
    pub healing: Option<u32>,
    pub value: Option<u32>,
    pub effect: Option<String>,
}

impl Item {
    pub fn new(name: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            id: ItemId::new(),
            name: name.into(),
            item_type,
            damage: None,
            healing: None,
            value: None,
            effect: None,
        }
    }

    pub fn with_damage(mut self, damage: u32) -> Self {
        self.damage = Some(damage);
        self
    }

    pub fn with_healing(mut self, healing: u32) -> Self {
        self.healing = Some(healing);
        self
    }

    pub fn with_value(mut self, value: u32) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_effect(mut self, effect: impl Into<String>) -> Self {
        self.effect = Some(effect.into());
        self
    }

    pub fn is_healing(&self) -> bool {
        self.item_type == ItemType::Consumable && self.healing.is_some()
    }

    pub fn is_spell_scroll(&self) -> bool {
        self.item_type == ItemType::Consumable && self.name == SPELL_SCROLL
    }
}

// ============================================================================
// Status effects and ally policy
// ============================================================================

/// A timed effect on a party member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub name: String,
    pub remaining: u32,
    pub effect: String,
}

impl StatusEffect {
    pub const DEFENDING: &'static str = "Defending";

    pub fn defending() -> Self {
        Self {
            name: Self::DEFENDING.to_string(),
            remaining: 1,
            effect: "+2 Defense".to_string(),
        }
    }
}

/// How a non-player ally picks its combat action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatAi {
    Aggressive,
    Defensive,
    Support,
    Balanced,
}

impl CombatAi {
    pub fn name(&self) -> &'static str {
        match self {
            CombatAi::Aggressive => "aggressive",
            CombatAi::Defensive => "defensive",
            CombatAi::Support => "support",
            CombatAi::Balanced => "balanced",
        }
    }
}

impl fmt::Display for CombatAi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Party members
// ============================================================================

/// Outcome of applying damage to a creature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageResult {
    pub damage_taken: u32,
    pub dropped_to_zero: bool,
}

/// A character in the party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyMember {
    pub id: MemberId,
    pub name: String,
    pub class: CharacterClass,
    level: u32,
    hp: u32,
    max_hp: u32,
    xp: u32,
    xp_to_next: u32,
    pub stats: AbilityScores,
    pub inventory: Vec<Item>,
    pub tags: Vec<String>,
    pub status_effects: Vec<StatusEffect>,
    pub traits: Vec<String>,
    pub is_player: bool,
    pub loyalty: u8,
    pub relationships: HashMap<MemberId, i8>,
    pub combat_ai: CombatAi,
    pub portrait: String,
    pub joined_at: DateTime<Utc>,
    pub backstory: String,
    story_events: Vec<String>,
    /// Recruitment template this member was created from, if any.
    pub recruited_from: Option<String>,
}

impl PartyMember {
    /// A level 1 member at full health.
    pub fn new(
        name: impl Into<String>,
        class: CharacterClass,
        stats: AbilityScores,
        max_hp: u32,
    ) -> Self {
        let max_hp = max_hp.max(1);
        Self {
            id: MemberId::new(),
            name: name.into(),
            class,
            level: 1,
            hp: max_hp,
            max_hp,
            xp: 0,
            xp_to_next: BASE_XP_TO_NEXT,
            stats,
            inventory: Vec::new(),
            tags: Vec::new(),
            status_effects: Vec::new(),
            traits: Vec::new(),
            is_player: false,
            loyalty: 100,
            relationships: HashMap::new(),
            combat_ai: class.data().default_ai,
            portrait: class.data().portrait.to_string(),
            joined_at: Utc::now(),
            backstory: String::new(),
            story_events: Vec::new(),
            recruited_from: None,
        }
    }

    /// Start at a later level with the matching experience threshold.
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level.max(1);
        self.xp_to_next = BASE_XP_TO_NEXT + XP_STEP * (self.level - 1);
        self
    }

    pub fn as_player(mut self) -> Self {
        self.is_player = true;
        self
    }

    pub fn with_ai(mut self, ai: CombatAi) -> Self {
        self.combat_ai = ai;
        self
    }

    pub fn with_items(mut self, items: impl IntoIterator<Item = Item>) -> Self {
        self.inventory.extend(items);
        self
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn hp(&self) -> u32 {
        self.hp
    }

    pub fn max_hp(&self) -> u32 {
        self.max_hp
    }

    pub fn xp(&self) -> u32 {
        self.xp
    }

    pub fn xp_to_next(&self) -> u32 {
        self.xp_to_next
    }

    pub fn story_events(&self) -> &[String] {
        &self.story_events
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Whether hp is strictly below `percent` of max.
    pub fn below_percent(&self, percent: u32) -> bool {
        self.hp * 100 < self.max_hp * percent
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        self.stats.modifier(ability)
    }

    /// The first weapon in the inventory counts as equipped.
    pub fn equipped_weapon(&self) -> Option<&Item> {
        self.inventory
            .iter()
            .find(|item| item.item_type == ItemType::Weapon)
    }

    pub fn healing_item(&self) -> Option<&Item> {
        self.inventory.iter().find(|item| item.is_healing())
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.inventory.iter().find(|item| item.id == id)
    }

    /// Remove an item by identity.
    pub fn take_item(&mut self, id: ItemId) -> Option<Item> {
        let index = self.inventory.iter().position(|item| item.id == id)?;
        Some(self.inventory.remove(index))
    }

    pub fn has_status(&self, name: &str) -> bool {
        self.status_effects.iter().any(|s| s.name == name)
    }

    pub fn add_status(&mut self, status: StatusEffect) {
        self.status_effects.retain(|s| s.name != status.name);
        self.status_effects.push(status);
    }

    /// Count down timed effects at the start of the member's turn and drop
    /// the expired ones. Returns the names of expired effects.
    pub fn tick_status_effects(&mut self) -> Vec<String> {
        let mut expired = Vec::new();
        self.status_effects.retain_mut(|s| {
            s.remaining = s.remaining.saturating_sub(1);
            if s.remaining == 0 {
                expired.push(s.name.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn take_damage(&mut self, amount: u32) -> DamageResult {
        let was_alive = self.hp > 0;
        let taken = amount.min(self.hp);
        self.hp -= taken;
        DamageResult {
            damage_taken: taken,
            dropped_to_zero: was_alive && self.hp == 0,
        }
    }

    /// Heal up to max hp; returns hp actually restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let old = self.hp;
        self.hp = (self.hp + amount).min(self.max_hp);
        self.hp - old
    }

    /// Set hp to `floor(max_hp * percent / 100)`, at least 1.
    pub(crate) fn restore_to_percent(&mut self, percent: u32) {
        self.hp = (self.max_hp * percent / 100).clamp(1, self.max_hp);
    }

    pub(crate) fn add_xp(&mut self, amount: u32) {
        self.xp += amount;
    }

    /// Apply one level: consumes `xp_to_next` experience. A fallen member
    /// gains max hp but stays down.
    pub(crate) fn apply_level_up(&mut self, hp_gain: u32) {
        self.xp -= self.xp_to_next;
        self.xp_to_next += XP_STEP;
        self.level += 1;
        self.max_hp += hp_gain;
        if self.hp > 0 {
            self.hp += hp_gain;
        }
    }

    pub(crate) fn clear_status_effects(&mut self) {
        self.status_effects.clear();
    }

    pub fn record_story(&mut self, event: impl Into<String>) {
        self.story_events.push(event.into());
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }
}

// ============================================================================
// Party
// ============================================================================

/// The adventuring party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    members: Vec<PartyMember>,
    gold: u32,
    pub shared_inventory: Vec<Item>,
    formation: Vec<MemberId>,
    morale: u8,
    pub reputation: i32,
    pub background: Background,
}

impl Party {
    /// A party containing only the player character.
    pub fn new(player: PartyMember, background: Background, gold: u32) -> Self {
        let player = PartyMember {
            is_player: true,
            ..player
        };
        Self {
            formation: vec![player.id],
            members: vec![player],
            gold,
            shared_inventory: Vec::new(),
            morale: 75,
            reputation: 0,
            background,
        }
    }

    pub fn members(&self) -> &[PartyMember] {
        &self.members
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= MAX_PARTY_SIZE
    }

    pub fn formation(&self) -> &[MemberId] {
        &self.formation
    }

    pub fn member(&self, id: MemberId) -> Option<&PartyMember> {
        self.members.iter().find(|m| m.id == id)
    }

    pub(crate) fn member_mut(&mut self, id: MemberId) -> Option<&mut PartyMember> {
        self.members.iter_mut().find(|m| m.id == id)
    }

    pub(crate) fn members_mut(&mut self) -> impl Iterator<Item = &mut PartyMember> {
        self.members.iter_mut()
    }

    pub fn member_by_name(&self, name: &str) -> Option<&PartyMember> {
        self.members
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn player(&self) -> &PartyMember {
        // A party is only ever constructed around a player.
        self.members
            .iter()
            .find(|m| m.is_player)
            .unwrap_or(&self.members[0])
    }

    pub fn player_id(&self) -> MemberId {
        self.player().id
    }

    pub fn living(&self) -> impl Iterator<Item = &PartyMember> {
        self.members.iter().filter(|m| m.is_alive())
    }

    pub fn all_down(&self) -> bool {
        self.members.iter().all(|m| !m.is_alive())
    }

    pub fn gold(&self) -> u32 {
        self.gold
    }

    pub fn add_gold(&mut self, amount: u32) {
        self.gold += amount;
    }

    /// Debit gold; fails without change when the party cannot afford it.
    pub fn spend_gold(&mut self, amount: u32) -> bool {
        if self.gold < amount {
            return false;
        }
        self.gold -= amount;
        true
    }

    pub fn morale(&self) -> u8 {
        self.morale
    }

    pub fn adjust_morale(&mut self, delta: i32) {
        self.morale = (self.morale as i32 + delta).clamp(0, 100) as u8;
    }

    /// Add a member at the back of the formation. Relationship bookkeeping
    /// and cost checks live in recruitment.
    pub(crate) fn push_member(&mut self, member: PartyMember) {
        self.formation.push(member.id);
        self.members.push(member);
    }
}

// ============================================================================
// Enemies
// ============================================================================

/// Largest hp, attack or defense a narrator-supplied enemy may have.
pub const MAX_ENEMY_STAT: u32 = 1000;

/// A hostile creature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enemy {
    pub name: String,
    hp: u32,
    pub max_hp: u32,
    pub attack: u32,
    pub defense: u32,
    pub xp_reward: u32,
    pub loot: Vec<Item>,
    pub symbolic: String,
    pub ai_generated: bool,
}

impl Enemy {
    pub fn new(name: impl Into<String>, max_hp: u32, attack: u32, defense: u32, xp_reward: u32) -> Self {
        let max_hp = max_hp.max(1);
        Self {
            name: name.into(),
            hp: max_hp,
            max_hp,
            attack,
            defense,
            xp_reward,
            loot: Vec::new(),
            symbolic: String::new(),
            ai_generated: false,
        }
    }

    pub fn with_symbolic(mut self, text: impl Into<String>) -> Self {
        self.symbolic = text.into();
        self
    }

    pub fn hp(&self) -> u32 {
        self.hp
    }

    /// Named, alive, and hp/attack/defense within [`MAX_ENEMY_STAT`].
    pub fn is_well_formed(&self) -> bool {
        !self.name.trim().is_empty()
            && (1..=MAX_ENEMY_STAT).contains(&self.max_hp)
            && self.attack <= MAX_ENEMY_STAT
            && self.defense <= MAX_ENEMY_STAT
    }

    pub fn is_defeated(&self) -> bool {
        self.hp == 0
    }

    pub fn take_damage(&mut self, amount: u32) -> DamageResult {
        let was_alive = self.hp > 0;
        let taken = amount.min(self.hp);
        self.hp -= taken;
        DamageResult {
            damage_taken: taken,
            dropped_to_zero: was_alive && self.hp == 0,
        }
    }
}

// ============================================================================
// Rooms and the dungeon
// ============================================================================

/// Compass exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        }
    }

    pub fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "n" | "north" => Ok(Direction::North),
            "e" | "east" => Ok(Direction::East),
            "s" | "south" => Ok(Direction::South),
            "w" | "west" => Ok(Direction::West),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// A generated room. The loot/trap/enemy flags are derived from the
/// contents, so an exhausted loot pile or a defeated enemy clears its flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub room_type: String,
    pub layout: String,
    pub exits: Vec<Direction>,
    pub description: String,
    pub symbolic: String,
    pub explored: bool,
    pub loot: Vec<Item>,
    pub trap: bool,
    pub enemy: Option<Enemy>,
    pub depth: u32,
    /// Rooms already generated behind each exit.
    pub links: HashMap<Direction, RoomId>,
}

impl Room {
    pub fn has_loot(&self) -> bool {
        !self.loot.is_empty()
    }

    pub fn has_trap(&self) -> bool {
        self.trap
    }

    pub fn has_enemy(&self) -> bool {
        self.enemy.as_ref().is_some_and(|e| !e.is_defeated())
    }

    pub fn has_exit(&self, direction: Direction) -> bool {
        self.exits.contains(&direction)
    }

    pub fn add_exit(&mut self, direction: Direction) {
        if !self.exits.contains(&direction) {
            self.exits.push(direction);
            self.exits.sort();
        }
    }
}

/// The dungeon for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dungeon {
    rooms: HashMap<RoomId, Room>,
    pub current_room: RoomId,
    pub depth: u32,
    pub max_depth: u32,
    pub theme: String,
    pub memory: NarratorMemory,
    rooms_generated: u32,
}

impl Dungeon {
    /// A dungeon whose only room is `start`.
    pub fn new(start: Room, max_depth: u32, theme: impl Into<String>, memory: NarratorMemory) -> Self {
        let current_room = start.id.clone();
        let depth = start.depth;
        let mut rooms = HashMap::new();
        rooms.insert(start.id.clone(), start);
        Self {
            rooms,
            current_room,
            depth,
            max_depth,
            theme: theme.into(),
            memory,
            rooms_generated: 1,
        }
    }

    pub fn room(&self, id: &RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn current(&self) -> Option<&Room> {
        self.rooms.get(&self.current_room)
    }

    pub(crate) fn current_mut(&mut self) -> Option<&mut Room> {
        self.rooms.get_mut(&self.current_room)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Generation index for the next new room.
    pub fn next_index(&self) -> u32 {
        self.rooms_generated
    }

    /// Store a freshly generated room behind `direction` of the current
    /// room and link both sides.
    pub(crate) fn attach_room(&mut self, direction: Direction, mut room: Room) -> RoomId {
        let id = room.id.clone();
        room.add_exit(direction.opposite());
        room.links.insert(direction.opposite(), self.current_room.clone());
        if let Some(from) = self.rooms.get_mut(&self.current_room) {
            from.links.insert(direction, id.clone());
        }
        self.depth = self.depth.max(room.depth);
        self.rooms.insert(id.clone(), room);
        self.rooms_generated += 1;
        id
    }
}

// ============================================================================
// Game state aggregate
// ============================================================================

/// Which engine is currently in charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    CharacterCreation,
    Dungeon,
    Combat,
    Death,
    Victory,
}

impl GamePhase {
    pub fn name(&self) -> &'static str {
        match self {
            GamePhase::CharacterCreation => "character-creation",
            GamePhase::Dungeon => "dungeon",
            GamePhase::Combat => "combat",
            GamePhase::Death => "death",
            GamePhase::Victory => "victory",
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Everything a run consists of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub phase: GamePhase,
    pub party: Option<Party>,
    pub dungeon: Option<Dungeon>,
    pub combat: Option<CombatState>,
    pub log: GameLog,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            phase: GamePhase::CharacterCreation,
            party: None,
            dungeon: None,
            combat: None,
            log: GameLog::new(),
        }
    }

    /// Snapshot as JSON for frontends.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
