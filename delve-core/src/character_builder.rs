//! Character builder for the player character.
//!
//! Collects name, class, background, scores and portrait, validates them,
//! and produces the player and the starting party.

use crate::class_data::{roll_ability_scores, Background, CharacterClass};
use crate::dice::Roller;
use crate::items;
use crate::world::{Ability, AbilityScores, Party, PartyMember};
use thiserror::Error;

/// Lowest and highest legal ability score at creation.
pub const MIN_SCORE: u8 = 3;
pub const MAX_SCORE: u8 = 18;

/// Starting morale for a new party.
pub const STARTING_MORALE: u8 = 75;

/// Error from character building.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuilderError {
    #[error("Character name is required")]
    MissingName,

    #[error("Class selection is required")]
    MissingClass,

    #[error("Background selection is required")]
    MissingBackground,

    #[error("{ability} score {value} is outside 3-18")]
    ScoreOutOfRange { ability: Ability, value: u8 },
}

/// Builder for the player character.
#[derive(Debug, Clone, Default)]
pub struct CharacterBuilder {
    name: Option<String>,
    class: Option<CharacterClass>,
    background: Option<Background>,
    ability_scores: Option<AbilityScores>,
    portrait: Option<String>,
    backstory: Option<String>,
}

impl CharacterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn class(mut self, class: CharacterClass) -> Self {
        self.class = Some(class);
        self
    }

    pub fn background(mut self, background: Background) -> Self {
        self.background = Some(background);
        self
    }

    /// Explicit scores. Without them the class's standard-array assignment
    /// is used.
    pub fn ability_scores(mut self, scores: AbilityScores) -> Self {
        self.ability_scores = Some(scores);
        self
    }

    /// Roll 4d6-drop-lowest and assign by the class priority.
    pub fn rolled_scores(mut self, roller: &mut dyn Roller) -> Self {
        let values = roll_ability_scores(roller);
        let priority = self
            .class
            .map(|c| c.data().ability_priority)
            .unwrap_or_else(Ability::all);
        self.ability_scores = Some(crate::class_data::assign_by_priority(values, &priority));
        self
    }

    pub fn portrait(mut self, portrait: impl Into<String>) -> Self {
        self.portrait = Some(portrait.into());
        self
    }

    pub fn backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = Some(backstory.into());
        self
    }

    /// Build the player character.
    pub fn build(self) -> Result<(PartyMember, Background), BuilderError> {
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or(BuilderError::MissingName)?;
        let class = self.class.ok_or(BuilderError::MissingClass)?;
        let background = self.background.ok_or(BuilderError::MissingBackground)?;
        let scores = self
            .ability_scores
            .unwrap_or_else(|| class.standard_scores());
        validate_scores(&scores)?;

        let class_data = class.data();
        let background_data = background.data();

        let mut player = PartyMember::new(name, class, scores, class_data.starting_hp(&scores))
            .as_player()
            .with_items(class_data.starting_items.iter().filter_map(|n| items::create(n)));
        player.add_tag(background_data.tag);
        player.traits = background_data.traits.iter().map(|t| t.to_string()).collect();
        if let Some(portrait) = self.portrait.filter(|p| !p.trim().is_empty()) {
            player.portrait = portrait;
        }
        player.backstory = self
            .backstory
            .unwrap_or_else(|| background_data.description.to_string());
        player.record_story(format!(
            "Set out as a {} {}",
            background_data.name.to_lowercase(),
            class_data.name.to_lowercase()
        ));

        Ok((player, background))
    }

    /// Build the player and wrap them in a fresh party.
    pub fn build_party(self) -> Result<Party, BuilderError> {
        let (player, background) = self.build()?;
        let gold = background.data().starting_gold;
        Ok(Party::new(player, background, gold))
    }
}

/// Every score must lie in `MIN_SCORE..=MAX_SCORE`.
pub fn validate_scores(scores: &AbilityScores) -> Result<(), BuilderError> {
    for ability in Ability::all() {
        let value = scores.get(ability);
        if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
            return Err(BuilderError::ScoreOutOfRange { ability, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDice;
    use crate::world::ItemType;

    #[test]
    fn test_missing_name() {
        let result = CharacterBuilder::new()
            .name("   ")
            .class(CharacterClass::Rogue)
            .background(Background::Urchin)
            .build();
        assert!(matches!(result, Err(BuilderError::MissingName)));
    }

    #[test]
    fn test_score_range() {
        let result = CharacterBuilder::new()
            .name("Ayla")
            .class(CharacterClass::Rogue)
            .background(Background::Urchin)
            .ability_scores(AbilityScores::new(10, 19, 10, 10, 10, 10))
            .build();
        assert_eq!(
            result.unwrap_err(),
            BuilderError::ScoreOutOfRange {
                ability: Ability::Dexterity,
                value: 19
            }
        );
    }

    #[test]
    fn test_build_party() {
        let party = CharacterBuilder::new()
            .name("Roland")
            .class(CharacterClass::Warrior)
            .background(Background::Soldier)
            .portrait("🦁")
            .build_party()
            .unwrap();

        let player = party.player();
        assert!(player.is_player);
        assert_eq!(player.level(), 1);
        // Base 12 + CON 14 (+2).
        assert_eq!(player.max_hp(), 14);
        assert_eq!(player.portrait, "🦁");
        assert!(player.tags.contains(&"veteran".to_string()));
        assert_eq!(player.traits, vec!["disciplined", "blunt"]);
        assert_eq!(
            player.equipped_weapon().map(|w| w.name.as_str()),
            Some("Longsword")
        );
        assert!(player
            .inventory
            .iter()
            .any(|i| i.item_type == ItemType::Consumable));

        assert_eq!(party.gold(), 50);
        assert_eq!(party.morale(), STARTING_MORALE);
        assert_eq!(party.reputation, 0);
        assert_eq!(party.size(), 1);
    }

    #[test]
    fn test_rolled_scores_follow_class() {
        let mut dice = ScriptedDice::new(
            [
                [6, 6, 6, 6],
                [5, 5, 5, 5],
                [4, 4, 4, 4],
                [3, 3, 3, 3],
                [2, 2, 2, 2],
                [1, 1, 1, 1],
            ]
            .concat(),
        );
        let (player, _) = CharacterBuilder::new()
            .name("Ida")
            .class(CharacterClass::Mage)
            .background(Background::Scholar)
            .rolled_scores(&mut dice)
            .build()
            .unwrap();
        assert_eq!(player.stats.intelligence, 18);
        assert_eq!(player.stats.strength, 3);
    }
}
