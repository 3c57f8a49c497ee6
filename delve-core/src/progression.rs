//! Experience, leveling, and resurrection.

use crate::content::LEVEL_TAGS;
use crate::dice::{self, Roller};
use crate::events::GameLog;
use crate::session::CommandError;
use crate::world::{Ability, MemberId, Party, PartyMember};

/// Gold per level to bring a member back.
pub const RESURRECTION_COST_PER_LEVEL: u32 = 100;
/// Resurrected members return at this percentage of max hp.
pub const RESURRECTION_HP_PERCENT: u32 = 50;
/// Morale lost when the whole party is brought back.
pub const PARTY_RESURRECTION_MORALE: i32 = -25;

/// Apply every level-up the member has earned. Returns levels gained.
pub fn check_level_up(member: &mut PartyMember, roller: &mut dyn Roller, log: &mut GameLog) -> u32 {
    let mut gained = 0;
    while member.xp() >= member.xp_to_next() {
        let rolled = dice::d(roller, 8) as i32;
        let hp_gain = (rolled + member.modifier(Ability::Constitution)).max(1) as u32;
        member.apply_level_up(hp_gain);

        let tag = LEVEL_TAGS[roller.pick(LEVEL_TAGS.len())];
        member.add_tag(tag);
        member.record_story(format!("Reached level {} and became {tag}", member.level()));

        log.dice(format!(
            "{} hit die: d8 ({rolled}) {:+} = {hp_gain}",
            member.name,
            member.modifier(Ability::Constitution)
        ));
        log.level(format!(
            "{} reaches level {}! (+{hp_gain} max hp) [{tag}]",
            member.name,
            member.level()
        ));
        tracing::info!(member = %member.name, level = member.level(), "level up");
        gained += 1;
    }
    gained
}

/// Give one member experience and resolve level-ups.
pub fn award_xp(
    party: &mut Party,
    id: MemberId,
    amount: u32,
    roller: &mut dyn Roller,
    log: &mut GameLog,
) -> u32 {
    let Some(member) = party.member_mut(id) else {
        return 0;
    };
    member.add_xp(amount);
    check_level_up(member, roller, log)
}

/// Split `total` evenly (floor) across every member, fallen included.
/// Returns the per-member share.
pub fn distribute_xp(party: &mut Party, total: u32, roller: &mut dyn Roller, log: &mut GameLog) -> u32 {
    let size = party.size().max(1) as u32;
    let share = total / size;
    let ids: Vec<MemberId> = party.members().iter().map(|m| m.id).collect();
    for id in ids {
        award_xp(party, id, share, roller, log);
    }
    share
}

// ============================================================================
// Resurrection
// ============================================================================

pub fn member_resurrection_cost(member: &PartyMember) -> u32 {
    member.level() * RESURRECTION_COST_PER_LEVEL
}

/// Cost to raise the whole party: every member's level, alive or not.
pub fn party_resurrection_cost(party: &Party) -> u32 {
    party.members().iter().map(member_resurrection_cost).sum()
}

/// Bring the whole party back after a wipe. Returns the gold spent.
pub fn resurrect_party(party: &mut Party, log: &mut GameLog) -> Result<u32, CommandError> {
    let cost = party_resurrection_cost(party);
    if !party.spend_gold(cost) {
        return Err(CommandError::NotEnoughGold {
            needed: cost,
            available: party.gold(),
        });
    }
    for member in party.members_mut() {
        member.restore_to_percent(RESURRECTION_HP_PERCENT);
        member.clear_status_effects();
        member.record_story("Returned from death");
    }
    party.adjust_morale(PARTY_RESURRECTION_MORALE);
    log.level(format!(
        "The party is pulled back from death for {cost} gold. Morale suffers."
    ));
    tracing::info!(cost, "party resurrected");
    Ok(cost)
}

/// Raise one fallen member. Returns the gold spent.
pub fn resurrect_member(party: &mut Party, id: MemberId, log: &mut GameLog) -> Result<u32, CommandError> {
    let member = party
        .member(id)
        .ok_or_else(|| CommandError::UnknownMember(id.to_string()))?;
    if member.is_alive() {
        return Err(CommandError::TargetAlive(member.name.clone()));
    }
    let cost = member_resurrection_cost(member);
    if !party.spend_gold(cost) {
        return Err(CommandError::NotEnoughGold {
            needed: cost,
            available: party.gold(),
        });
    }
    let Some(member) = party.member_mut(id) else {
        return Err(CommandError::UnknownMember(id.to_string()));
    };
    member.restore_to_percent(RESURRECTION_HP_PERCENT);
    member.clear_status_effects();
    member.record_story("Returned from death");
    log.level(format!(
        "{} is restored to life for {cost} gold. ({}/{} hp)",
        member.name,
        member.hp(),
        member.max_hp()
    ));
    Ok(cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_data::{Background, CharacterClass};
    use crate::testing::ScriptedDice;
    use crate::world::AbilityScores;

    fn hero(con: u8) -> PartyMember {
        PartyMember::new(
            "Ayla",
            CharacterClass::Ranger,
            AbilityScores::new(10, 10, con, 10, 10, 10),
            10,
        )
    }

    #[test]
    fn test_level_up_consumes_xp() {
        let mut member = hero(14);
        let mut dice = ScriptedDice::new([5]).with_picks([0]);
        let mut log = GameLog::new();
        member.add_xp(130);

        assert_eq!(check_level_up(&mut member, &mut dice, &mut log), 1);
        assert_eq!(member.level(), 2);
        assert_eq!(member.xp(), 30);
        assert_eq!(member.xp_to_next(), 150);
        assert_eq!(member.max_hp(), 17);
        assert_eq!(member.hp(), 17);
        assert_eq!(member.tags, vec![LEVEL_TAGS[0].to_string()]);
    }

    #[test]
    fn test_multiple_levels_at_once() {
        let mut member = hero(10);
        let mut dice = ScriptedDice::new([4, 4, 4]);
        let mut log = GameLog::new();
        member.add_xp(260); // 100 + 150, leaves 10

        assert_eq!(check_level_up(&mut member, &mut dice, &mut log), 2);
        assert_eq!(member.level(), 3);
        assert_eq!(member.xp(), 10);
        assert_eq!(member.xp_to_next(), 200);
    }

    #[test]
    fn test_hp_gain_at_least_one() {
        let mut member = hero(3);
        let mut dice = ScriptedDice::new([1]);
        let mut log = GameLog::new();
        member.add_xp(100);
        check_level_up(&mut member, &mut dice, &mut log);
        assert_eq!(member.max_hp(), 11);
    }

    #[test]
    fn test_xp_split_floors() {
        let player = hero(10);
        let mut party = Party::new(player, Background::Wanderer, 0);
        party.push_member(hero(10));
        party.push_member(hero(10));
        let mut dice = ScriptedDice::default();
        let mut log = GameLog::new();

        assert_eq!(distribute_xp(&mut party, 65, &mut dice, &mut log), 21);
        assert!(party.members().iter().all(|m| m.xp() == 21));
    }

    #[test]
    fn test_party_resurrection() {
        let mut party = Party::new(hero(10).with_level(2), Background::Noble, 350);
        party.push_member(hero(10));
        for member in party.members_mut() {
            member.take_damage(100);
        }
        let mut log = GameLog::new();

        assert_eq!(party_resurrection_cost(&party), 300);
        assert_eq!(resurrect_party(&mut party, &mut log).unwrap(), 300);
        assert_eq!(party.gold(), 50);
        assert!(party.members().iter().all(|m| m.hp() == 5));
        assert_eq!(party.morale(), 50);
    }

    #[test]
    fn test_party_resurrection_needs_gold() {
        let mut party = Party::new(hero(10), Background::Urchin, 99);
        party.members_mut().for_each(|m| {
            m.take_damage(100);
        });
        let mut log = GameLog::new();

        let err = resurrect_party(&mut party, &mut log).unwrap_err();
        assert!(matches!(
            err,
            CommandError::NotEnoughGold {
                needed: 100,
                available: 99
            }
        ));
        assert_eq!(party.gold(), 99);
        assert_eq!(party.player().hp(), 0);
    }

    #[test]
    fn test_single_resurrection() {
        let mut party = Party::new(hero(10), Background::Noble, 500);
        let mut ally = hero(10).with_level(3);
        ally.take_damage(100);
        let ally_id = ally.id;
        party.push_member(ally);
        let mut log = GameLog::new();
        let player_id = party.player_id();

        assert!(matches!(
            resurrect_member(&mut party, player_id, &mut log),
            Err(CommandError::TargetAlive(_))
        ));
        assert_eq!(resurrect_member(&mut party, ally_id, &mut log).unwrap(), 300);
        assert_eq!(party.member(ally_id).unwrap().hp(), 5);
        assert_eq!(party.gold(), 200);
    }

    #[test]
    fn test_resurrection_leaves_at_least_one_hp() {
        let mut party = Party::new(hero(10), Background::Noble, 500);
        let mut frail = PartyMember::new(
            "Wisp",
            CharacterClass::Mage,
            AbilityScores::new(8, 10, 8, 14, 10, 10),
            1,
        );
        frail.take_damage(1);
        let frail_id = frail.id;
        party.push_member(frail);
        let mut log = GameLog::new();

        // Half of 1 hp floors to 0; the member still comes back standing.
        resurrect_member(&mut party, frail_id, &mut log).unwrap();
        let frail = party.member(frail_id).unwrap();
        assert_eq!(frail.hp(), 1);
        assert!(frail.is_alive());
    }
}
