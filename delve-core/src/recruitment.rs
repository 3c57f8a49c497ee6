//! Hiring allies into the party.

use crate::content::{AllyTemplate, RECRUITS};
use crate::events::GameLog;
use crate::session::CommandError;
use crate::world::{MemberId, Party};

/// Loyalty of a freshly hired ally.
pub const RECRUIT_LOYALTY: u8 = 60;
pub const RECRUIT_MORALE: i32 = 10;

/// Whether `template` has already joined this party.
pub fn already_recruited(party: &Party, template: &AllyTemplate) -> bool {
    party
        .members()
        .iter()
        .any(|m| m.recruited_from.as_deref() == Some(template.id))
}

/// Allies not yet in the party, with whether each is affordable now.
pub fn available(party: &Party) -> Vec<(&'static AllyTemplate, bool)> {
    RECRUITS
        .iter()
        .filter(|t| !already_recruited(party, t))
        .map(|t| (t, check(party, t).is_ok()))
        .collect()
}

/// All the reasons a hire can fail, checked before anything changes.
pub fn check(party: &Party, template: &AllyTemplate) -> Result<(), CommandError> {
    if already_recruited(party, template) {
        return Err(CommandError::AlreadyRecruited(template.name.to_string()));
    }
    if party.gold() < template.cost {
        return Err(CommandError::NotEnoughGold {
            needed: template.cost,
            available: party.gold(),
        });
    }
    if party.reputation < template.reputation_required {
        return Err(CommandError::ReputationTooLow {
            needed: template.reputation_required,
            current: party.reputation,
        });
    }
    if party.is_full() {
        return Err(CommandError::PartyFull);
    }
    Ok(())
}

/// Hire `template`. On failure nothing changes.
pub fn recruit(party: &mut Party, template: &AllyTemplate, log: &mut GameLog) -> Result<MemberId, CommandError> {
    check(party, template)?;
    if !party.spend_gold(template.cost) {
        return Err(CommandError::NotEnoughGold {
            needed: template.cost,
            available: party.gold(),
        });
    }

    let mut recruit = template.to_member();
    recruit.loyalty = RECRUIT_LOYALTY;
    let recruit_id = recruit.id;
    for existing in party.members_mut() {
        existing.relationships.insert(recruit_id, 0);
        recruit.relationships.insert(existing.id, 0);
    }
    recruit.record_story(format!("Joined the party for {} gold", template.cost));
    party.push_member(recruit);
    party.adjust_morale(RECRUIT_MORALE);

    log.system(format!(
        "{} the {} joins the party for {} gold.",
        template.name,
        template.class,
        template.cost
    ));
    tracing::info!(ally = template.id, size = party.size(), "ally recruited");
    Ok(recruit_id)
}
