//! Class and background data for character creation.

use crate::dice::{DiceExpression, Keep, Roller};
use crate::world::{Ability, AbilityScores, CombatAi};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Standard array values.
pub const STANDARD_ARRAY: [u8; 6] = [15, 14, 13, 12, 10, 8];

/// Playable classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterClass {
    Warrior,
    Rogue,
    Mage,
    Cleric,
    Ranger,
}

impl CharacterClass {
    pub fn all() -> &'static [CharacterClass] {
        &[
            CharacterClass::Warrior,
            CharacterClass::Rogue,
            CharacterClass::Mage,
            CharacterClass::Cleric,
            CharacterClass::Ranger,
        ]
    }

    pub fn name(&self) -> &'static str {
        self.data().name
    }

    pub fn data(&self) -> &'static ClassData {
        match self {
            CharacterClass::Warrior => &WARRIOR,
            CharacterClass::Rogue => &ROGUE,
            CharacterClass::Mage => &MAGE,
            CharacterClass::Cleric => &CLERIC,
            CharacterClass::Ranger => &RANGER,
        }
    }

    /// Assign the standard array following the class's ability priority.
    pub fn standard_scores(&self) -> AbilityScores {
        assign_by_priority(STANDARD_ARRAY, &self.data().ability_priority)
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for CharacterClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CharacterClass::all()
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown class '{s}'"))
    }
}

/// Static data for a class.
#[derive(Debug)]
pub struct ClassData {
    pub name: &'static str,
    pub description: &'static str,
    /// Max hp at level 1 before the CON modifier.
    pub base_hp: u32,
    /// Item catalog names handed out at creation.
    pub starting_items: &'static [&'static str],
    /// Highest score goes to the first ability.
    pub ability_priority: [Ability; 6],
    pub default_ai: CombatAi,
    pub portrait: &'static str,
}

impl ClassData {
    /// Level 1 max hp for the given scores.
    pub fn starting_hp(&self, scores: &AbilityScores) -> u32 {
        (self.base_hp as i32 + scores.modifier(Ability::Constitution)).max(1) as u32
    }
}

const WARRIOR: ClassData = ClassData {
    name: "Warrior",
    description: "A front-line fighter who trusts steel over sorcery.",
    base_hp: 12,
    starting_items: &["Longsword", "Healing Potion"],
    ability_priority: [
        Ability::Strength,
        Ability::Constitution,
        Ability::Dexterity,
        Ability::Wisdom,
        Ability::Charisma,
        Ability::Intelligence,
    ],
    default_ai: CombatAi::Aggressive,
    portrait: "⚔",
};

const ROGUE: ClassData = ClassData {
    name: "Rogue",
    description: "Quick hands, quicker blades, and an eye for loose coins.",
    base_hp: 8,
    starting_items: &["Dagger", "Lockpicks", "Healing Potion"],
    ability_priority: [
        Ability::Dexterity,
        Ability::Strength,
        Ability::Constitution,
        Ability::Charisma,
        Ability::Intelligence,
        Ability::Wisdom,
    ],
    default_ai: CombatAi::Balanced,
    portrait: "🗡",
};

const MAGE: ClassData = ClassData {
    name: "Mage",
    description: "A scholar of the arcane who carries fire on paper.",
    base_hp: 6,
    starting_items: &["Quarterstaff", "Spell Scroll", "Spell Scroll"],
    ability_priority: [
        Ability::Intelligence,
        Ability::Dexterity,
        Ability::Constitution,
        Ability::Wisdom,
        Ability::Charisma,
        Ability::Strength,
    ],
    default_ai: CombatAi::Defensive,
    portrait: "✦",
};

const CLERIC: ClassData = ClassData {
    name: "Cleric",
    description: "A keeper of faith who mends what the dark breaks.",
    base_hp: 8,
    starting_items: &["Mace", "Healing Potion", "Healing Potion"],
    ability_priority: [
        Ability::Wisdom,
        Ability::Strength,
        Ability::Constitution,
        Ability::Charisma,
        Ability::Dexterity,
        Ability::Intelligence,
    ],
    default_ai: CombatAi::Support,
    portrait: "✚",
};

const RANGER: ClassData = ClassData {
    name: "Ranger",
    description: "A tracker at home in places without roads.",
    base_hp: 10,
    starting_items: &["Hunting Spear", "Healing Potion"],
    ability_priority: [
        Ability::Strength,
        Ability::Dexterity,
        Ability::Wisdom,
        Ability::Constitution,
        Ability::Intelligence,
        Ability::Charisma,
    ],
    default_ai: CombatAi::Balanced,
    portrait: "➶",
};

/// Put the highest value on the first ability in `priority`.
pub fn assign_by_priority(mut values: [u8; 6], priority: &[Ability; 6]) -> AbilityScores {
    values.sort_by(|a, b| b.cmp(a));
    let mut scores = AbilityScores::default();
    for (value, ability) in values.into_iter().zip(priority.iter()) {
        scores.set(*ability, value);
    }
    scores
}

/// Roll six scores with 4d6, dropping the lowest die.
pub fn roll_ability_scores(roller: &mut dyn Roller) -> [u8; 6] {
    let expr = DiceExpression::pool(4, 6, Some(Keep::Highest(3)));
    std::array::from_fn(|_| expr.roll_with(roller).total as u8)
}

// ============================================================================
// Backgrounds
// ============================================================================

/// Character backgrounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Background {
    Soldier,
    Scholar,
    Urchin,
    Acolyte,
    Noble,
    Wanderer,
}

/// Static data for a background.
#[derive(Debug)]
pub struct BackgroundData {
    pub name: &'static str,
    pub description: &'static str,
    /// Narrative tag given to the player.
    pub tag: &'static str,
    pub starting_gold: u32,
    pub traits: &'static [&'static str],
}

impl Background {
    pub fn all() -> &'static [Background] {
        &[
            Background::Soldier,
            Background::Scholar,
            Background::Urchin,
            Background::Acolyte,
            Background::Noble,
            Background::Wanderer,
        ]
    }

    pub fn name(&self) -> &'static str {
        self.data().name
    }

    pub fn data(&self) -> &'static BackgroundData {
        match self {
            Background::Soldier => &BackgroundData {
                name: "Soldier",
                description: "You marched under a banner that no longer flies.",
                tag: "veteran",
                starting_gold: 50,
                traits: &["disciplined", "blunt"],
            },
            Background::Scholar => &BackgroundData {
                name: "Scholar",
                description: "You came for the inscriptions, not the treasure.",
                tag: "learned",
                starting_gold: 40,
                traits: &["curious", "meticulous"],
            },
            Background::Urchin => &BackgroundData {
                name: "Urchin",
                description: "Gutters taught you every trick worth knowing.",
                tag: "streetwise",
                starting_gold: 15,
                traits: &["wary", "resourceful"],
            },
            Background::Acolyte => &BackgroundData {
                name: "Acolyte",
                description: "Your temple sent you to cleanse the deep places.",
                tag: "devout",
                starting_gold: 30,
                traits: &["pious", "patient"],
            },
            Background::Noble => &BackgroundData {
                name: "Noble",
                description: "A fallen house, and a purse that remembers better days.",
                tag: "highborn",
                starting_gold: 120,
                traits: &["proud", "generous"],
            },
            Background::Wanderer => &BackgroundData {
                name: "Wanderer",
                description: "Every road ended somewhere. This one ends below.",
                tag: "rootless",
                starting_gold: 25,
                traits: &["restless", "self-reliant"],
            },
        }
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Background {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Background::all()
            .iter()
            .copied()
            .find(|b| b.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown background '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDice;

    #[test]
    fn test_standard_scores_follow_priority() {
        let scores = CharacterClass::Warrior.standard_scores();
        assert_eq!(scores.strength, 15);
        assert_eq!(scores.constitution, 14);
        assert_eq!(scores.intelligence, 8);

        let scores = CharacterClass::Mage.standard_scores();
        assert_eq!(scores.intelligence, 15);
        assert_eq!(scores.strength, 8);
    }

    #[test]
    fn test_starting_hp_uses_con() {
        let data = CharacterClass::Warrior.data();
        let scores = AbilityScores::new(10, 10, 14, 10, 10, 10);
        assert_eq!(data.starting_hp(&scores), 14);

        let frail = AbilityScores::new(10, 10, 3, 10, 10, 10);
        assert_eq!(CharacterClass::Mage.data().starting_hp(&frail), 2);
    }

    #[test]
    fn test_starting_items_exist_in_catalog() {
        for class in CharacterClass::all() {
            for name in class.data().starting_items {
                assert!(
                    crate::items::find_template(name).is_some(),
                    "{name} missing from catalog"
                );
            }
        }
    }

    #[test]
    fn test_rolled_scores_drop_lowest() {
        let mut dice = ScriptedDice::new([6, 6, 6, 1].repeat(6));
        assert_eq!(roll_ability_scores(&mut dice), [18; 6]);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("cleric".parse::<CharacterClass>(), Ok(CharacterClass::Cleric));
        assert_eq!("NOBLE".parse::<Background>(), Ok(Background::Noble));
        assert!("bard".parse::<CharacterClass>().is_err());
    }
}
