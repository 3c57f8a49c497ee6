//! Item catalog.
//!
//! Templates for everything that can end up in an inventory. Rooms draw
//! loot uniformly from [`LOOT_TABLE`]; classes start with [`GEAR`] plus
//! loot-table entries.

use crate::dice::Roller;
use crate::world::{Item, ItemType, SPELL_SCROLL};

/// An item blueprint. Instantiating it mints a fresh [`Item`] identity.
#[derive(Debug, Clone, Copy)]
pub struct ItemTemplate {
    pub name: &'static str,
    pub item_type: ItemType,
    pub damage: Option<u32>,
    pub healing: Option<u32>,
    pub value: Option<u32>,
    pub effect: Option<&'static str>,
}

impl ItemTemplate {
    const fn weapon(name: &'static str, damage: u32, value: u32) -> Self {
        Self {
            name,
            item_type: ItemType::Weapon,
            damage: Some(damage),
            healing: None,
            value: Some(value),
            effect: None,
        }
    }

    const fn armor(name: &'static str, value: u32, effect: &'static str) -> Self {
        Self {
            name,
            item_type: ItemType::Armor,
            damage: None,
            healing: None,
            value: Some(value),
            effect: Some(effect),
        }
    }

    const fn potion(name: &'static str, healing: u32, value: u32) -> Self {
        Self {
            name,
            item_type: ItemType::Consumable,
            damage: None,
            healing: Some(healing),
            value: Some(value),
            effect: None,
        }
    }

    const fn treasure(name: &'static str, value: u32) -> Self {
        Self {
            name,
            item_type: ItemType::Treasure,
            damage: None,
            healing: None,
            value: Some(value),
            effect: None,
        }
    }

    const fn tool(name: &'static str, value: u32, effect: &'static str) -> Self {
        Self {
            name,
            item_type: ItemType::Tool,
            damage: None,
            healing: None,
            value: Some(value),
            effect: Some(effect),
        }
    }

    pub fn instantiate(&self) -> Item {
        Item {
            damage: self.damage,
            healing: self.healing,
            value: self.value,
            effect: self.effect.map(str::to_string),
            ..Item::new(self.name, self.item_type)
        }
    }
}

/// Items that can be found in rooms.
pub const LOOT_TABLE: &[ItemTemplate] = &[
    ItemTemplate::weapon("Rusty Sword", 6, 5),
    ItemTemplate::weapon("Battleaxe", 10, 30),
    ItemTemplate::weapon("Shortbow", 6, 25),
    ItemTemplate::armor("Leather Armor", 10, "Supple hide, scarred by old claws"),
    ItemTemplate::armor("Chain Shirt", 50, "Rings of dull iron"),
    ItemTemplate::potion("Healing Potion", 8, 25),
    ItemTemplate::potion("Greater Healing Potion", 15, 60),
    ItemTemplate {
        name: SPELL_SCROLL,
        item_type: ItemType::Consumable,
        damage: None,
        healing: None,
        value: Some(40),
        effect: Some("Unleashes 3d6 arcane fire on a foe"),
    },
    ItemTemplate::treasure("Gold Coins", 30),
    ItemTemplate::treasure("Silver Chalice", 45),
    ItemTemplate::treasure("Jeweled Ring", 80),
    ItemTemplate::tool("Torch", 1, "Pushes the dark back a few steps"),
    ItemTemplate::tool("Rope", 2, "Fifty feet of hemp"),
];

/// Class starting equipment that never drops as loot.
pub const GEAR: &[ItemTemplate] = &[
    ItemTemplate::weapon("Longsword", 8, 15),
    ItemTemplate::weapon("Dagger", 4, 2),
    ItemTemplate::weapon("Quarterstaff", 6, 1),
    ItemTemplate::weapon("Mace", 6, 5),
    ItemTemplate::weapon("Hunting Spear", 8, 3),
    ItemTemplate::tool("Lockpicks", 25, "Thieves' tools wrapped in oilcloth"),
];

/// Look up a template by name (case-insensitive) in loot and gear.
pub fn find_template(name: &str) -> Option<&'static ItemTemplate> {
    LOOT_TABLE
        .iter()
        .chain(GEAR.iter())
        .find(|t| t.name.eq_ignore_ascii_case(name))
}

/// Instantiate a catalog item by name.
pub fn create(name: &str) -> Option<Item> {
    find_template(name).map(ItemTemplate::instantiate)
}

/// Draw one loot item uniformly.
pub fn random_loot(roller: &mut dyn Roller) -> Item {
    LOOT_TABLE[roller.pick(LOOT_TABLE.len())].instantiate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instances_are_distinct() {
        let a = create("Healing Potion").unwrap();
        let b = create("healing potion").unwrap();
        assert_eq!(a.name, b.name);
        assert_ne!(a.id, b.id);
        assert!(a.is_healing());
    }

    #[test]
    fn test_spell_scroll_is_not_healing() {
        let scroll = create(SPELL_SCROLL).unwrap();
        assert!(scroll.is_spell_scroll());
        assert!(!scroll.is_healing());
    }

    #[test]
    fn test_gear_lookup() {
        let sword = create("Longsword").unwrap();
        assert_eq!(sword.item_type, ItemType::Weapon);
        assert_eq!(sword.damage, Some(8));
        assert!(create("Vorpal Blade").is_none());
    }
}
