//! Ally combat policy.
//!
//! A pure function from an ally's policy kind and the party's condition to
//! the action it takes this turn.

use crate::combat::CombatTurn;
use crate::world::{CombatAi, Party, PartyMember};

/// Hp percentages at which policies react.
pub const DEFENSIVE_THRESHOLD: u32 = 30;
pub const SUPPORT_HEAL_THRESHOLD: u32 = 50;
pub const BALANCED_DEFEND_THRESHOLD: u32 = 20;
pub const BALANCED_HEAL_THRESHOLD: u32 = 30;

/// Choose `actor`'s action.
pub fn policy(kind: CombatAi, party: &Party, actor: &PartyMember) -> CombatTurn {
    match kind {
        CombatAi::Aggressive => CombatTurn::attack(actor.id),
        CombatAi::Defensive => {
            if actor.below_percent(DEFENSIVE_THRESHOLD) {
                CombatTurn::defend(actor.id)
            } else {
                CombatTurn::attack(actor.id)
            }
        }
        CombatAi::Support => heal_turn(party, actor, SUPPORT_HEAL_THRESHOLD)
            .unwrap_or_else(|| CombatTurn::attack(actor.id)),
        CombatAi::Balanced => {
            if actor.below_percent(BALANCED_DEFEND_THRESHOLD) {
                CombatTurn::defend(actor.id)
            } else {
                heal_turn(party, actor, BALANCED_HEAL_THRESHOLD)
                    .unwrap_or_else(|| CombatTurn::attack(actor.id))
            }
        }
    }
}

/// Heal the most wounded living member under `percent`, if the actor
/// carries a healing item.
fn heal_turn(party: &Party, actor: &PartyMember, percent: u32) -> Option<CombatTurn> {
    let item = actor.healing_item()?;
    let target = most_wounded(party, percent)?;
    Some(CombatTurn::use_item(actor.id, item.id, Some(target.id)))
}

fn most_wounded(party: &Party, percent: u32) -> Option<&PartyMember> {
    party
        .living()
        .filter(|m| m.below_percent(percent))
        .min_by(|a, b| {
            let lhs = a.hp() as u64 * b.max_hp() as u64;
            let rhs = b.hp() as u64 * a.max_hp() as u64;
            lhs.cmp(&rhs)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_data::{Background, CharacterClass};
    use crate::combat::CombatAction;
    use crate::items;
    use crate::world::AbilityScores;

    fn member(name: &str, ai: CombatAi, max_hp: u32) -> PartyMember {
        PartyMember::new(name, CharacterClass::Cleric, AbilityScores::default(), max_hp).with_ai(ai)
    }

    fn setup(ally_ai: CombatAi, potion: bool) -> (Party, crate::world::MemberId) {
        let player = member("Hero", CombatAi::Balanced, 20).as_player();
        let mut party = Party::new(player, Background::Acolyte, 0);
        let mut ally = member("Ally", ally_ai, 10);
        if potion {
            ally = ally.with_items(items::create("Healing Potion"));
        }
        let id = ally.id;
        party.push_member(ally);
        (party, id)
    }

    #[test]
    fn test_aggressive_always_attacks() {
        let (mut party, ally) = setup(CombatAi::Aggressive, true);
        party.member_mut(ally).unwrap().take_damage(9);
        let actor = party.member(ally).unwrap();
        assert_eq!(policy(actor.combat_ai, &party, actor).action, CombatAction::Attack);
    }

    #[test]
    fn test_defensive_defends_when_low() {
        let (mut party, ally) = setup(CombatAi::Defensive, false);
        let actor = party.member(ally).unwrap();
        assert_eq!(policy(actor.combat_ai, &party, actor).action, CombatAction::Attack);

        party.member_mut(ally).unwrap().take_damage(8);
        let actor = party.member(ally).unwrap();
        assert_eq!(policy(actor.combat_ai, &party, actor).action, CombatAction::Defend);
    }

    #[test]
    fn test_support_heals_wounded_member() {
        let (mut party, ally) = setup(CombatAi::Support, true);
        let hero = party.player_id();
        party.member_mut(hero).unwrap().take_damage(12); // 8/20 = 40%
        let actor = party.member(ally).unwrap();
        let turn = policy(actor.combat_ai, &party, actor);
        assert_eq!(turn.action, CombatAction::UseItem);
        assert_eq!(turn.target, Some(hero));
        assert!(turn.item.is_some());
    }

    #[test]
    fn test_support_without_potion_attacks() {
        let (mut party, ally) = setup(CombatAi::Support, false);
        let hero = party.player_id();
        party.member_mut(hero).unwrap().take_damage(12);
        let actor = party.member(ally).unwrap();
        assert_eq!(policy(actor.combat_ai, &party, actor).action, CombatAction::Attack);
    }

    #[test]
    fn test_support_ignores_fallen_members() {
        let (mut party, ally) = setup(CombatAi::Support, true);
        let hero = party.player_id();
        party.member_mut(hero).unwrap().take_damage(20);
        let actor = party.member(ally).unwrap();
        assert_eq!(policy(actor.combat_ai, &party, actor).action, CombatAction::Attack);
    }

    #[test]
    fn test_balanced_priorities() {
        let (mut party, ally) = setup(CombatAi::Balanced, true);
        let hero = party.player_id();

        // Hero at 40%: above the balanced heal line.
        party.member_mut(hero).unwrap().take_damage(12);
        let actor = party.member(ally).unwrap();
        assert_eq!(policy(actor.combat_ai, &party, actor).action, CombatAction::Attack);

        // Hero at 25%: heal.
        party.member_mut(hero).unwrap().take_damage(3);
        let actor = party.member(ally).unwrap();
        let turn = policy(actor.combat_ai, &party, actor);
        assert_eq!(turn.action, CombatAction::UseItem);
        assert_eq!(turn.target, Some(hero));

        // Ally itself at 10%: defend wins.
        party.member_mut(ally).unwrap().take_damage(9);
        let actor = party.member(ally).unwrap();
        assert_eq!(policy(actor.combat_ai, &party, actor).action, CombatAction::Defend);
    }
}
