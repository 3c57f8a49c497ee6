//! Static reference tables: room templates, dungeon themes, level-up tags
//! and recruitable allies.

use crate::class_data::CharacterClass;
use crate::items;
use crate::world::{AbilityScores, CombatAi, Direction, PartyMember};

/// A room blueprint. The layout is only for rendering.
#[derive(Debug, Clone, Copy)]
pub struct RoomTemplate {
    pub room_type: &'static str,
    pub layout: &'static str,
    pub exits: &'static [Direction],
}

pub const ROOM_TEMPLATES: &[RoomTemplate] = &[
    RoomTemplate {
        room_type: "chamber",
        layout: "+-----+\n|     |\n|  .  |\n|     |\n+-- --+",
        exits: &[Direction::North, Direction::South],
    },
    RoomTemplate {
        room_type: "corridor",
        layout: "+---------+\n          \n+---------+",
        exits: &[Direction::East, Direction::West],
    },
    RoomTemplate {
        room_type: "crypt",
        layout: "+--- ---+\n| [] [] |\n|       |\n| [] [] |\n+-------+",
        exits: &[Direction::North, Direction::East],
    },
    RoomTemplate {
        room_type: "cavern",
        layout: " .~~~~~. \n(       )\n (  *   \n  `~~~~' ",
        exits: &[Direction::North, Direction::East, Direction::West],
    },
    RoomTemplate {
        room_type: "shrine",
        layout: "+-- --+\n|  ^  |\n| /_\\ |\n+-----+",
        exits: &[Direction::South, Direction::West],
    },
    RoomTemplate {
        room_type: "vault",
        layout: "#########\n#  $ $  #\n#       \n#########",
        exits: &[Direction::East],
    },
    RoomTemplate {
        room_type: "library",
        layout: "+--- ---+\n|=|   |=|\n|=|   |=|\n+--- ---+",
        exits: &[Direction::North, Direction::South],
    },
    RoomTemplate {
        room_type: "intersection",
        layout: "   | |   \n---   ---\n---   ---\n   | |   ",
        exits: &[
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ],
    },
];

pub fn room_template(room_type: &str) -> Option<&'static RoomTemplate> {
    ROOM_TEMPLATES.iter().find(|t| t.room_type == room_type)
}

pub const THEMES: &[&str] = &[
    "Sunken Catacombs",
    "Halls of the Hollow King",
    "The Weeping Mines",
    "Ashen Monastery",
];

/// Symbolic tags awarded on level-up.
pub const LEVEL_TAGS: &[&str] = &[
    "Tempered",
    "Unbowed",
    "Shadow-Touched",
    "Oathbound",
    "Ember-Hearted",
    "Far-Seeing",
];

/// Starting narrator voice for every dungeon.
pub const NARRATOR_TONE: &str = "ominous";
pub const NARRATOR_FOCUS: &[&str] = &["atmosphere", "mystery", "consequence"];

/// A recruitable non-player character.
#[derive(Debug, Clone)]
pub struct AllyTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub class: CharacterClass,
    pub level: u32,
    pub stats: AbilityScores,
    pub max_hp: u32,
    pub cost: u32,
    pub reputation_required: i32,
    pub traits: &'static [&'static str],
    pub backstory: &'static str,
    pub combat_ai: CombatAi,
    pub portrait: &'static str,
    pub items: &'static [&'static str],
}

impl AllyTemplate {
    /// Build a fresh party member from this template.
    pub fn to_member(&self) -> PartyMember {
        let mut member = PartyMember::new(self.name, self.class, self.stats, self.max_hp)
            .with_level(self.level)
            .with_ai(self.combat_ai)
            .with_items(self.items.iter().filter_map(|name| items::create(name)));
        member.traits = self.traits.iter().map(|t| t.to_string()).collect();
        member.backstory = self.backstory.to_string();
        member.portrait = self.portrait.to_string();
        member.recruited_from = Some(self.id.to_string());
        member
    }
}

lazy_static::lazy_static! {
    /// Allies that can join the party.
    pub static ref RECRUITS: Vec<AllyTemplate> = vec![
        AllyTemplate {
            id: "bram",
            name: "Bram Ironhide",
            class: CharacterClass::Warrior,
            level: 1,
            stats: AbilityScores::new(16, 11, 15, 9, 10, 10),
            max_hp: 14,
            cost: 50,
            reputation_required: 0,
            traits: &["stubborn", "loyal"],
            backstory: "A dockside brawler who owes a debt to the dark below.",
            combat_ai: CombatAi::Aggressive,
            portrait: "🛡",
            items: &["Battleaxe"],
        },
        AllyTemplate {
            id: "sister-elowen",
            name: "Sister Elowen",
            class: CharacterClass::Cleric,
            level: 2,
            stats: AbilityScores::new(12, 10, 13, 11, 16, 14),
            max_hp: 16,
            cost: 120,
            reputation_required: 5,
            traits: &["gentle", "unyielding"],
            backstory: "She tends the wounded of every expedition, and buries the rest.",
            combat_ai: CombatAi::Support,
            portrait: "✚",
            items: &["Mace", "Healing Potion", "Healing Potion"],
        },
        AllyTemplate {
            id: "vex",
            name: "Vex",
            class: CharacterClass::Rogue,
            level: 2,
            stats: AbilityScores::new(11, 17, 12, 13, 10, 14),
            max_hp: 13,
            cost: 150,
            reputation_required: 10,
            traits: &["sardonic", "greedy"],
            backstory: "Picked the wrong lock in the wrong city. Now picks dungeon locks.",
            combat_ai: CombatAi::Balanced,
            portrait: "🗡",
            items: &["Dagger", "Healing Potion"],
        },
        AllyTemplate {
            id: "magister-quill",
            name: "Magister Quill",
            class: CharacterClass::Mage,
            level: 3,
            stats: AbilityScores::new(8, 13, 12, 17, 13, 10),
            max_hp: 15,
            cost: 250,
            reputation_required: 25,
            traits: &["pedantic", "fearless"],
            backstory: "Expelled from the academy for asking what the sealed doors hid.",
            combat_ai: CombatAi::Defensive,
            portrait: "✦",
            items: &["Quarterstaff", "Spell Scroll"],
        },
        AllyTemplate {
            id: "tamsin",
            name: "Tamsin Reedwalker",
            class: CharacterClass::Ranger,
            level: 3,
            stats: AbilityScores::new(14, 15, 13, 10, 14, 9),
            max_hp: 22,
            cost: 300,
            reputation_required: 40,
            traits: &["quiet", "watchful"],
            backstory: "Hunts whatever came up out of the mines and took her village.",
            combat_ai: CombatAi::Balanced,
            portrait: "➶",
            items: &["Hunting Spear", "Greater Healing Potion"],
        },
    ];
}

pub fn recruit(id: &str) -> Option<&'static AllyTemplate> {
    RECRUITS.iter().find(|r| r.id.eq_ignore_ascii_case(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_have_exits() {
        assert!(ROOM_TEMPLATES.iter().all(|t| !t.exits.is_empty()));
        assert!(room_template("vault").is_some());
    }

    #[test]
    fn test_recruit_to_member() {
        let template = recruit("VEX").unwrap();
        let member = template.to_member();
        assert_eq!(member.level(), 2);
        assert_eq!(member.xp_to_next(), 150);
        assert_eq!(member.hp(), 13);
        assert!(!member.is_player);
        assert_eq!(member.combat_ai, CombatAi::Balanced);
        assert_eq!(member.inventory.len(), 2);
        assert_eq!(member.recruited_from.as_deref(), Some("vex"));
    }
}
