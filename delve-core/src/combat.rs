//! Combat engine: the turn scheduler and action resolution.
//!
//! Turn order is the party formation followed by the enemy. The scheduler
//! resolves one actor per step and hands control back to the caller at the
//! player's turn. Fallen members keep their slot and are skipped.
//!
//! Resolution here is synchronous. Steps that want narration return a
//! [`PendingNarration`] built from post-resolution snapshots; the session
//! awaits the narrator afterwards, so narration can never change an outcome.

use crate::ai;
use crate::dice::{self, Roller};
use crate::events::GameLog;
use crate::narrator::CombatOutcome;
use crate::progression;
use crate::session::CommandError;
use crate::world::{
    Ability, Enemy, ItemId, MemberId, Party, PartyMember, StatusEffect,
};
use serde::{Deserialize, Serialize};

/// Base to-hit threshold before modifiers.
pub const HIT_THRESHOLD: i32 = 10;
/// Attack totals at or above this are critical hits.
pub const CRITICAL_THRESHOLD: i32 = 20;
/// Damage die when no weapon is equipped.
pub const UNARMED_DAMAGE: u32 = 4;
/// Flee succeeds on a d20 at or above this.
pub const FLEE_DC: u32 = 12;
/// Extra hit threshold enemies face against a defending member.
pub const DEFEND_BONUS: i32 = 2;

// ============================================================================
// Types
// ============================================================================

/// A slot in the turn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    Member(MemberId),
    Enemy,
}

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatStatus {
    AwaitingPartyTurn,
    AwaitingEnemyTurn,
    Victory,
    Defeat,
    Fled,
}

impl CombatStatus {
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            CombatStatus::Victory | CombatStatus::Defeat | CombatStatus::Fled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatAction {
    Attack,
    Defend,
    UseItem,
    Flee,
    Wait,
}

/// One actor's chosen action. Consumed immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombatTurn {
    pub actor: MemberId,
    pub action: CombatAction,
    pub target: Option<MemberId>,
    pub item: Option<ItemId>,
}

impl CombatTurn {
    pub fn attack(actor: MemberId) -> Self {
        Self {
            actor,
            action: CombatAction::Attack,
            target: None,
            item: None,
        }
    }

    pub fn defend(actor: MemberId) -> Self {
        Self {
            action: CombatAction::Defend,
            ..Self::attack(actor)
        }
    }

    pub fn flee(actor: MemberId) -> Self {
        Self {
            action: CombatAction::Flee,
            ..Self::attack(actor)
        }
    }

    pub fn wait(actor: MemberId) -> Self {
        Self {
            action: CombatAction::Wait,
            ..Self::attack(actor)
        }
    }

    pub fn use_item(actor: MemberId, item: ItemId, target: Option<MemberId>) -> Self {
        Self {
            actor,
            action: CombatAction::UseItem,
            target,
            item: Some(item),
        }
    }
}

/// An active fight against one enemy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatState {
    enemy: Enemy,
    turn_order: Vec<Actor>,
    turn_index: usize,
    round: u32,
    status: CombatStatus,
}

impl CombatState {
    pub fn enemy(&self) -> &Enemy {
        &self.enemy
    }

    pub(crate) fn into_enemy(self) -> Enemy {
        self.enemy
    }

    pub fn turn_order(&self) -> &[Actor] {
        &self.turn_order
    }

    pub fn turn_index(&self) -> usize {
        self.turn_index
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn status(&self) -> CombatStatus {
        self.status
    }

    pub fn current_actor(&self) -> Actor {
        self.turn_order[self.turn_index]
    }

    /// The scheduler is suspended on a living player's turn.
    pub fn awaiting_player(&self, party: &Party) -> bool {
        match (self.status, self.current_actor()) {
            (CombatStatus::AwaitingPartyTurn, Actor::Member(id)) => party
                .member(id)
                .is_some_and(|m| m.is_player && m.is_alive()),
            _ => false,
        }
    }

    fn advance_index(&mut self) {
        self.turn_index = (self.turn_index + 1) % self.turn_order.len();
        if self.turn_index == 0 {
            self.round += 1;
        }
        self.status = match self.current_actor() {
            Actor::Enemy => CombatStatus::AwaitingEnemyTurn,
            Actor::Member(_) => CombatStatus::AwaitingPartyTurn,
        };
    }
}

/// Narration request produced by a resolved attack.
#[derive(Debug, Clone)]
pub struct PendingNarration {
    pub action: String,
    pub character: PartyMember,
    pub enemy: Enemy,
    pub outcome: CombatOutcome,
}

/// Result of resolving one actor.
#[derive(Debug, Clone)]
pub struct Step {
    pub actor: Actor,
    pub narration: Option<PendingNarration>,
}

/// Mutable view the engine resolves against.
pub struct CombatContext<'a> {
    pub party: &'a mut Party,
    pub combat: &'a mut CombatState,
    pub roller: &'a mut dyn Roller,
    pub log: &'a mut GameLog,
}

// ============================================================================
// Scheduler
// ============================================================================

/// Start a fight: formation order, then the enemy, index 0.
pub fn initiate(enemy: Enemy, party: &Party) -> CombatState {
    let mut turn_order: Vec<Actor> = party.formation().iter().copied().map(Actor::Member).collect();
    turn_order.push(Actor::Enemy);
    let status = match turn_order[0] {
        Actor::Enemy => CombatStatus::AwaitingEnemyTurn,
        Actor::Member(_) => CombatStatus::AwaitingPartyTurn,
    };
    tracing::debug!(enemy = %enemy.name, order = turn_order.len(), "combat initiated");
    CombatState {
        enemy,
        turn_order,
        turn_index: 0,
        round: 1,
        status,
    }
}

/// Resolve the current actor unless it is the living player.
///
/// Returns `None` when the scheduler is suspended (player's turn) or the
/// fight is over.
pub fn advance(ctx: &mut CombatContext<'_>) -> Option<Step> {
    if ctx.combat.status.is_resolved() || ctx.combat.awaiting_player(ctx.party) {
        return None;
    }

    let actor = ctx.combat.current_actor();
    let narration = match actor {
        Actor::Enemy => {
            enemy_turn(ctx);
            None
        }
        Actor::Member(id) => match ctx.party.member(id) {
            Some(member) if member.is_alive() => {
                let turn = ai::policy(member.combat_ai, ctx.party, member);
                ctx.log.ai(describe_ally_choice(member, &turn, ctx.party));
                begin_member_turn(ctx, id);
                // Policy only proposes items the ally carries.
                resolve_turn(ctx, turn).unwrap_or_else(|err| {
                    tracing::debug!(error = %err, "ally action rejected");
                    None
                })
            }
            // Fallen or departed: skip.
            _ => None,
        },
    };

    if !ctx.combat.status.is_resolved() {
        ctx.combat.advance_index();
    }
    Some(Step { actor, narration })
}

/// Resolve the player's chosen action and move the index past them.
pub fn player_turn(
    ctx: &mut CombatContext<'_>,
    turn: CombatTurn,
) -> Result<Step, CommandError> {
    if !ctx.combat.awaiting_player(ctx.party) || ctx.combat.current_actor() != Actor::Member(turn.actor) {
        return Err(CommandError::NotYourTurn);
    }
    validate_turn(ctx.party, &turn)?;

    begin_member_turn(ctx, turn.actor);
    let narration = resolve_turn(ctx, turn)?;
    if !ctx.combat.status.is_resolved() {
        ctx.combat.advance_index();
    }
    Ok(Step {
        actor: Actor::Member(turn.actor),
        narration,
    })
}

fn begin_member_turn(ctx: &mut CombatContext<'_>, id: MemberId) {
    if let Some(member) = ctx.party.member_mut(id) {
        for expired in member.tick_status_effects() {
            tracing::debug!(member = %member.name, status = %expired, "status expired");
        }
    }
}

/// Check a turn can be carried out before anything mutates.
fn validate_turn(party: &Party, turn: &CombatTurn) -> Result<(), CommandError> {
    let actor = party
        .member(turn.actor)
        .ok_or_else(|| CommandError::UnknownMember(turn.actor.to_string()))?;
    if turn.action != CombatAction::UseItem {
        return Ok(());
    }
    let item_id = turn.item.ok_or(CommandError::UnknownItem)?;
    let item = actor.item(item_id).ok_or(CommandError::UnknownItem)?;
    if item.is_spell_scroll() {
        return Ok(());
    }
    if !item.is_healing() {
        return Err(CommandError::ItemNotUsable(item.name.clone()));
    }
    let target_id = turn.target.unwrap_or(turn.actor);
    let target = party
        .member(target_id)
        .ok_or_else(|| CommandError::UnknownMember(target_id.to_string()))?;
    if !target.is_alive() {
        return Err(CommandError::TargetDown(target.name.clone()));
    }
    Ok(())
}

fn resolve_turn(
    ctx: &mut CombatContext<'_>,
    turn: CombatTurn,
) -> Result<Option<PendingNarration>, CommandError> {
    validate_turn(ctx.party, &turn)?;
    match turn.action {
        CombatAction::Attack => Ok(execute_attack(ctx, turn.actor)),
        CombatAction::Defend => {
            defend(ctx, turn.actor);
            Ok(None)
        }
        CombatAction::UseItem => {
            let item = turn.item.ok_or(CommandError::UnknownItem)?;
            use_item(ctx, turn.actor, item, turn.target.unwrap_or(turn.actor))
        }
        CombatAction::Flee => {
            flee(ctx, turn.actor);
            Ok(None)
        }
        CombatAction::Wait => Ok(None),
    }
}

fn describe_ally_choice(member: &PartyMember, turn: &CombatTurn, party: &Party) -> String {
    let what = match turn.action {
        CombatAction::Attack => "attacks".to_string(),
        CombatAction::Defend => "takes a defensive stance".to_string(),
        CombatAction::UseItem => {
            let target = turn
                .target
                .and_then(|id| party.member(id))
                .map(|m| m.name.as_str())
                .unwrap_or("themself");
            format!("reaches for a potion for {target}")
        }
        CombatAction::Flee => "looks for a way out".to_string(),
        CombatAction::Wait => "waits".to_string(),
    };
    format!("{} ({}) {}.", member.name, member.combat_ai, what)
}

// ============================================================================
// Actions
// ============================================================================

/// A party member attacks the enemy.
pub fn execute_attack(ctx: &mut CombatContext<'_>, attacker: MemberId) -> Option<PendingNarration> {
    let member = ctx.party.member(attacker)?;
    let str_mod = member.modifier(Ability::Strength);
    let weapon = member.equipped_weapon();
    let base_damage = weapon.and_then(|w| w.damage).unwrap_or(UNARMED_DAMAGE);
    let action = weapon
        .map(|w| format!("{} attack", w.name))
        .unwrap_or_else(|| "unarmed attack".to_string());
    let name = member.name.clone();

    let natural = dice::d(ctx.roller, 20) as i64;
    let attack_roll = natural + str_mod as i64;
    let target = HIT_THRESHOLD as i64 + ctx.combat.enemy.defense as i64;
    let hit = attack_roll >= target;
    ctx.log.dice(format!(
        "{name} attack roll: d20 ({natural}) {} = {attack_roll} vs {target}",
        signed(str_mod)
    ));

    let mut damage = 0;
    let mut critical = false;
    if hit {
        let rolled = dice::d(ctx.roller, base_damage);
        damage = (rolled as i64 + str_mod as i64).clamp(0, u32::MAX as i64) as u32;
        critical = attack_roll >= CRITICAL_THRESHOLD as i64;
        if critical {
            damage = damage.saturating_mul(2);
        }
        ctx.log.dice(format!(
            "Damage: d{base_damage} ({rolled}) {}{} = {damage}",
            signed(str_mod),
            if critical { " x2 critical" } else { "" }
        ));
        let result = ctx.combat.enemy.take_damage(damage);
        ctx.log.combat(format!(
            "{name} hits the {} for {} damage{}. ({}/{} hp)",
            ctx.combat.enemy.name,
            result.damage_taken,
            if critical { " (critical!)" } else { "" },
            ctx.combat.enemy.hp(),
            ctx.combat.enemy.max_hp
        ));
    } else {
        ctx.log
            .combat(format!("{name} misses the {}.", ctx.combat.enemy.name));
    }

    let narration = ctx.party.member(attacker).map(|character| PendingNarration {
        action,
        character: character.clone(),
        enemy: ctx.combat.enemy.clone(),
        outcome: CombatOutcome {
            hit,
            damage,
            critical,
        },
    });

    if ctx.combat.enemy.is_defeated() {
        defeat_enemy(ctx);
    }
    narration
}

/// Apply the victory path: experience, reputation and morale.
fn defeat_enemy(ctx: &mut CombatContext<'_>) {
    let enemy_name = ctx.combat.enemy.name.clone();
    ctx.log.combat(format!("The {enemy_name} is defeated!"));
    let share = progression::distribute_xp(
        ctx.party,
        ctx.combat.enemy.xp_reward,
        ctx.roller,
        ctx.log,
    );
    ctx.log.system(format!("Each party member gains {share} XP."));
    ctx.party.reputation += 5;
    ctx.party.adjust_morale(5);
    for member in ctx.party.members_mut() {
        member.record_story(format!("Helped defeat the {enemy_name}"));
    }
    ctx.combat.status = CombatStatus::Victory;
    tracing::info!(enemy = %enemy_name, share, "combat won");
}

/// The enemy attacks a random living member.
fn enemy_turn(ctx: &mut CombatContext<'_>) {
    let living: Vec<MemberId> = ctx.party.living().map(|m| m.id).collect();
    if living.is_empty() {
        ctx.combat.status = CombatStatus::Defeat;
        return;
    }
    let target_id = living[ctx.roller.pick(living.len())];
    let Some(target) = ctx.party.member(target_id) else {
        return;
    };

    let enemy = &ctx.combat.enemy;
    let natural = dice::d(ctx.roller, 20) as i64;
    let attack_roll = natural + enemy.attack as i64;
    let defending = target.has_status(StatusEffect::DEFENDING);
    let threshold = (HIT_THRESHOLD
        + target.modifier(Ability::Dexterity)
        + if defending { DEFEND_BONUS } else { 0 }) as i64;
    let target_name = target.name.clone();
    let enemy_name = enemy.name.clone();
    let enemy_attack = enemy.attack;

    ctx.log.dice(format!(
        "{enemy_name} attack roll: d20 ({natural}) + {enemy_attack} = {attack_roll} vs {threshold}{}",
        if defending { " (defending)" } else { "" }
    ));

    if attack_roll < threshold {
        ctx.log
            .combat(format!("The {enemy_name} lunges at {target_name} and misses."));
        return;
    }

    let rolled = dice::d(ctx.roller, 6);
    let damage = rolled.saturating_add(enemy_attack / 2);
    ctx.log.dice(format!(
        "Damage: d6 ({rolled}) + {} = {damage}",
        enemy_attack / 2
    ));

    let Some(target) = ctx.party.member_mut(target_id) else {
        return;
    };
    let result = target.take_damage(damage);
    ctx.log.combat(format!(
        "The {enemy_name} hits {target_name} for {} damage. ({}/{} hp)",
        result.damage_taken,
        target.hp(),
        target.max_hp()
    ));

    if result.dropped_to_zero {
        target.record_story(format!("Fell to the {enemy_name}"));
        ctx.log.death(format!("{target_name} falls!"));
        ctx.party.adjust_morale(-10);
        if ctx.party.all_down() {
            ctx.log.death("The whole party has fallen.");
            ctx.combat.status = CombatStatus::Defeat;
            tracing::info!(enemy = %enemy_name, "party wiped");
        }
    }
}

fn defend(ctx: &mut CombatContext<'_>, actor: MemberId) {
    if let Some(member) = ctx.party.member_mut(actor) {
        member.add_status(StatusEffect::defending());
        ctx.log
            .combat(format!("{} braces for the next blow (+2 Defense).", member.name));
    }
}

/// Use an item from `user`'s inventory on `target`.
pub fn use_item(
    ctx: &mut CombatContext<'_>,
    user: MemberId,
    item_id: ItemId,
    target: MemberId,
) -> Result<Option<PendingNarration>, CommandError> {
    let member = ctx
        .party
        .member(user)
        .ok_or_else(|| CommandError::UnknownMember(user.to_string()))?;
    let item = member.item(item_id).ok_or(CommandError::UnknownItem)?;

    if item.is_spell_scroll() {
        let user_name = member.name.clone();
        let scroll_name = item.name.clone();
        if let Some(member) = ctx.party.member_mut(user) {
            member.take_item(item_id);
        }
        let damage = dice::sum(ctx.roller, 3, 6);
        ctx.log.dice(format!("{scroll_name}: 3d6 = {damage}"));
        let result = ctx.combat.enemy.take_damage(damage);
        ctx.log.combat(format!(
            "{user_name} reads the {scroll_name}; arcane fire sears the {} for {} damage.",
            ctx.combat.enemy.name, result.damage_taken
        ));
        let narration = ctx.party.member(user).map(|character| PendingNarration {
            action: scroll_name,
            character: character.clone(),
            enemy: ctx.combat.enemy.clone(),
            outcome: CombatOutcome {
                hit: true,
                damage: result.damage_taken,
                critical: false,
            },
        });
        if ctx.combat.enemy.is_defeated() {
            defeat_enemy(ctx);
        }
        return Ok(narration);
    }

    heal_with_item(ctx.party, ctx.roller, ctx.log, user, item_id, target)?;
    Ok(None)
}

/// Drink or administer a healing consumable. Shared by combat and the
/// dungeon phase.
pub fn heal_with_item(
    party: &mut Party,
    roller: &mut dyn Roller,
    log: &mut GameLog,
    user: MemberId,
    item_id: ItemId,
    target: MemberId,
) -> Result<u32, CommandError> {
    let member = party
        .member(user)
        .ok_or_else(|| CommandError::UnknownMember(user.to_string()))?;
    let item = member.item(item_id).ok_or(CommandError::UnknownItem)?;
    let Some(healing) = item.healing.filter(|_| item.is_healing()) else {
        return Err(CommandError::ItemNotUsable(item.name.clone()));
    };
    let item_name = item.name.clone();
    let user_name = member.name.clone();
    let recipient = party
        .member(target)
        .ok_or_else(|| CommandError::UnknownMember(target.to_string()))?;
    if !recipient.is_alive() {
        return Err(CommandError::TargetDown(recipient.name.clone()));
    }

    if let Some(member) = party.member_mut(user) {
        member.take_item(item_id);
    }
    let bonus = dice::d(roller, 4);
    log.dice(format!("{item_name}: {healing} + d4 ({bonus})"));
    let Some(recipient) = party.member_mut(target) else {
        return Err(CommandError::UnknownMember(target.to_string()));
    };
    let restored = recipient.heal(healing + bonus);
    let line = if user == target {
        format!(
            "{user_name} drinks a {item_name} and recovers {restored} hp. ({}/{} hp)",
            recipient.hp(),
            recipient.max_hp()
        )
    } else {
        format!(
            "{user_name} gives {} a {item_name}, restoring {restored} hp. ({}/{} hp)",
            recipient.name,
            recipient.hp(),
            recipient.max_hp()
        )
    };
    log.combat(line);
    Ok(restored)
}

fn flee(ctx: &mut CombatContext<'_>, actor: MemberId) {
    let name = ctx
        .party
        .member(actor)
        .map(|m| m.name.clone())
        .unwrap_or_default();
    let roll = dice::d(ctx.roller, 20);
    ctx.log.dice(format!("Flee: d20 ({roll}) vs {FLEE_DC}"));
    if roll >= FLEE_DC {
        ctx.log.combat(format!(
            "{name} leads the party away from the {}.",
            ctx.combat.enemy.name
        ));
        ctx.combat.status = CombatStatus::Fled;
    } else {
        ctx.log
            .combat(format!("{name} tries to escape, but the way is blocked!"));
    }
}

fn signed(value: i32) -> String {
    if value < 0 {
        format!("- {}", value.abs())
    } else {
        format!("+ {value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_data::{Background, CharacterClass};
    use crate::items;
    use crate::testing::ScriptedDice;
    use crate::world::{AbilityScores, CombatAi};

    fn player(str: u8) -> PartyMember {
        PartyMember::new(
            "Roland",
            CharacterClass::Warrior,
            AbilityScores::new(str, 10, 14, 10, 10, 10),
            20,
        )
        .with_items(items::create("Longsword"))
    }

    fn party_of(player: PartyMember) -> Party {
        Party::new(player, Background::Soldier, 0)
    }

    fn with_ally(party: &mut Party, ai: CombatAi) -> MemberId {
        let ally = PartyMember::new(
            "Bram",
            CharacterClass::Warrior,
            AbilityScores::new(14, 10, 10, 10, 10, 10),
            10,
        )
        .with_ai(ai)
        .with_items(items::create("Mace"));
        let id = ally.id;
        party.push_member(ally);
        id
    }

    #[test]
    fn test_turn_order_is_formation_then_enemy() {
        let mut party = party_of(player(14));
        let ally = with_ally(&mut party, CombatAi::Aggressive);
        let combat = initiate(Enemy::new("Rat", 5, 1, 0, 10), &party);

        assert_eq!(combat.turn_order().len(), party.size() + 1);
        assert_eq!(combat.turn_order()[0], Actor::Member(party.player_id()));
        assert_eq!(combat.turn_order()[1], Actor::Member(ally));
        assert_eq!(combat.turn_order()[2], Actor::Enemy);
        assert!(combat.awaiting_player(&party));
    }

    #[test]
    fn test_kill_scenario_awards_full_xp() {
        // STR 14, longsword d8, enemy defense 2 and 10 hp.
        let mut party = party_of(player(14));
        let mut combat = initiate(Enemy::new("Ghoul", 10, 3, 2, 80), &party);
        let mut dice = ScriptedDice::new([15, 8]);
        let mut log = GameLog::new();
        let id = party.player_id();

        let mut ctx = CombatContext {
            party: &mut party,
            combat: &mut combat,
            roller: &mut dice,
            log: &mut log,
        };
        let step = player_turn(&mut ctx, CombatTurn::attack(id)).unwrap();

        let narration = step.narration.unwrap();
        assert!(narration.outcome.hit);
        assert_eq!(narration.outcome.damage, 10);
        assert!(!narration.outcome.critical);
        assert_eq!(combat.status(), CombatStatus::Victory);
        assert!(combat.enemy().is_defeated());
        assert_eq!(party.player().xp(), 80);
        assert_eq!(party.reputation, 5);
    }

    #[test]
    fn test_critical_doubles_damage() {
        let mut party = party_of(player(14));
        let mut combat = initiate(Enemy::new("Troll", 100, 3, 2, 80), &party);
        // 18 + 2 = 20: critical. d8 = 5, +2 = 7, doubled = 14.
        let mut dice = ScriptedDice::new([18, 5]);
        let mut log = GameLog::new();
        let id = party.player_id();

        let mut ctx = CombatContext {
            party: &mut party,
            combat: &mut combat,
            roller: &mut dice,
            log: &mut log,
        };
        let step = player_turn(&mut ctx, CombatTurn::attack(id)).unwrap();
        let outcome = step.narration.unwrap().outcome;
        assert!(outcome.critical);
        assert_eq!(outcome.damage, 14);
        assert_eq!(combat.enemy().hp(), 86);
    }

    #[test]
    fn test_weak_attacker_damage_never_negative() {
        let mut party = party_of(player(3).with_items(Vec::new()));
        let mut combat = initiate(Enemy::new("Rat", 5, 1, 0, 10), &party);
        // 20 - 4 = 16 hits defense 0; d8 = 1, -4 -> 0.
        let mut dice = ScriptedDice::new([20, 1]);
        let mut log = GameLog::new();
        let id = party.player_id();

        let mut ctx = CombatContext {
            party: &mut party,
            combat: &mut combat,
            roller: &mut dice,
            log: &mut log,
        };
        let step = player_turn(&mut ctx, CombatTurn::attack(id)).unwrap();
        assert_eq!(step.narration.unwrap().outcome.damage, 0);
        assert_eq!(combat.enemy().hp(), 5);
    }

    #[test]
    fn test_index_wraps_and_round_advances() {
        let mut party = party_of(player(14));
        let mut combat = initiate(Enemy::new("Rat", 50, 0, 20, 10), &party);
        // Player misses (2+2 < 30); enemy misses (1 < 10).
        let mut dice = ScriptedDice::new([2, 1]).with_picks([0]);
        let mut log = GameLog::new();
        let id = party.player_id();

        let mut ctx = CombatContext {
            party: &mut party,
            combat: &mut combat,
            roller: &mut dice,
            log: &mut log,
        };
        player_turn(&mut ctx, CombatTurn::attack(id)).unwrap();
        assert_eq!(ctx.combat.turn_index(), 1);
        assert_eq!(ctx.combat.status(), CombatStatus::AwaitingEnemyTurn);

        let step = advance(&mut ctx).unwrap();
        assert_eq!(step.actor, Actor::Enemy);
        assert_eq!(ctx.combat.turn_index(), 0);
        assert_eq!(ctx.combat.round(), 2);
        assert!(advance(&mut ctx).is_none());
    }

    #[test]
    fn test_defending_raises_enemy_threshold() {
        let mut party = party_of(player(14));
        let mut combat = initiate(Enemy::new("Rat", 50, 0, 20, 10), &party);
        // Enemy rolls 11: hits an undefended DEX 10 target, misses a defender.
        let mut dice = ScriptedDice::new([11]).with_picks([0]);
        let mut log = GameLog::new();
        let id = party.player_id();

        let mut ctx = CombatContext {
            party: &mut party,
            combat: &mut combat,
            roller: &mut dice,
            log: &mut log,
        };
        player_turn(&mut ctx, CombatTurn::defend(id)).unwrap();
        advance(&mut ctx).unwrap();
        assert_eq!(party.player().hp(), 20);
        assert!(log.entries().iter().any(|e| e.text.contains("misses")));
    }

    #[test]
    fn test_extreme_enemy_stats_resolve() {
        // Unvalidated stats still resolve: an impenetrable defense is
        // missed, an enormous attack hits and fells the target.
        let mut party = party_of(player(14));
        let mut combat = initiate(Enemy::new("Bulwark", 10, u32::MAX, u32::MAX, 10), &party);
        let mut dice = ScriptedDice::new([20, 20, 6]).with_picks([0]);
        let mut log = GameLog::new();
        let id = party.player_id();

        let mut ctx = CombatContext {
            party: &mut party,
            combat: &mut combat,
            roller: &mut dice,
            log: &mut log,
        };
        let step = player_turn(&mut ctx, CombatTurn::attack(id)).unwrap();
        assert!(!step.narration.unwrap().outcome.hit);
        advance(&mut ctx).unwrap();
        assert_eq!(combat.enemy().hp(), 10);
        assert_eq!(party.player().hp(), 0);
        assert_eq!(combat.status(), CombatStatus::Defeat);
    }

    #[test]
    fn test_fallen_ally_is_skipped() {
        let mut party = party_of(player(14));
        let ally = with_ally(&mut party, CombatAi::Aggressive);
        party.member_mut(ally).unwrap().take_damage(100);
        let mut combat = initiate(Enemy::new("Rat", 50, 0, 20, 10), &party);
        let mut dice = ScriptedDice::new([2]);
        let mut log = GameLog::new();
        let id = party.player_id();

        let mut ctx = CombatContext {
            party: &mut party,
            combat: &mut combat,
            roller: &mut dice,
            log: &mut log,
        };
        player_turn(&mut ctx, CombatTurn::attack(id)).unwrap();
        let step = advance(&mut ctx).unwrap();
        assert_eq!(step.actor, Actor::Member(ally));
        assert!(step.narration.is_none());
        assert_eq!(ctx.combat.current_actor(), Actor::Enemy);
    }

    #[test]
    fn test_party_wipe_is_defeat() {
        let mut party = party_of(player(14));
        party.member_mut(party.player_id()).unwrap().take_damage(17);
        let mut combat = initiate(Enemy::new("Ogre", 50, 10, 20, 10), &party);
        let mut dice = ScriptedDice::new([1, 15, 6]).with_picks([0]);
        let mut log = GameLog::new();
        let id = party.player_id();

        let mut ctx = CombatContext {
            party: &mut party,
            combat: &mut combat,
            roller: &mut dice,
            log: &mut log,
        };
        player_turn(&mut ctx, CombatTurn::attack(id)).unwrap();
        advance(&mut ctx).unwrap();
        assert_eq!(combat.status(), CombatStatus::Defeat);
        assert_eq!(party.player().hp(), 0);
        assert!(party.all_down());
    }

    #[test]
    fn test_healing_potion_removed_by_identity() {
        let potion_a = items::create("Healing Potion").unwrap();
        let potion_b = items::create("Healing Potion").unwrap();
        let (a, b) = (potion_a.id, potion_b.id);
        let mut party = party_of(player(14).with_items([potion_a, potion_b]));
        let id = party.player_id();
        party.member_mut(id).unwrap().take_damage(15);
        let mut dice = ScriptedDice::new([3]);
        let mut log = GameLog::new();

        let restored = heal_with_item(&mut party, &mut dice, &mut log, id, b, id).unwrap();
        assert_eq!(restored, 11);
        assert_eq!(party.player().hp(), 16);
        assert!(party.player().item(a).is_some());
        assert!(party.player().item(b).is_none());
    }

    #[test]
    fn test_spell_scroll_damages_enemy() {
        let scroll = items::create("Spell Scroll").unwrap();
        let scroll_id = scroll.id;
        let mut party = party_of(player(14).with_items([scroll]));
        let mut combat = initiate(Enemy::new("Wraith", 30, 2, 5, 10), &party);
        let mut dice = ScriptedDice::new([6, 5, 4]);
        let mut log = GameLog::new();
        let id = party.player_id();

        let mut ctx = CombatContext {
            party: &mut party,
            combat: &mut combat,
            roller: &mut dice,
            log: &mut log,
        };
        player_turn(&mut ctx, CombatTurn::use_item(id, scroll_id, None)).unwrap();
        assert_eq!(combat.enemy().hp(), 15);
        assert!(party.player().item(scroll_id).is_none());
    }

    #[test]
    fn test_rejected_item_changes_nothing() {
        let mut party = party_of(player(14));
        let sword = party.player().equipped_weapon().unwrap().id;
        let mut combat = initiate(Enemy::new("Rat", 5, 1, 0, 10), &party);
        let mut dice = ScriptedDice::default();
        let mut log = GameLog::new();
        let id = party.player_id();

        let mut ctx = CombatContext {
            party: &mut party,
            combat: &mut combat,
            roller: &mut dice,
            log: &mut log,
        };
        let result = player_turn(&mut ctx, CombatTurn::use_item(id, sword, None));
        assert!(matches!(result, Err(CommandError::ItemNotUsable(_))));
        assert_eq!(combat.turn_index(), 0);
        assert!(party.player().item(sword).is_some());
    }

    #[test]
    fn test_flee_threshold() {
        let mut party = party_of(player(14));
        let mut combat = initiate(Enemy::new("Rat", 5, 1, 0, 10), &party);
        let mut dice = ScriptedDice::new([11]);
        let mut log = GameLog::new();
        let id = party.player_id();

        let mut ctx = CombatContext {
            party: &mut party,
            combat: &mut combat,
            roller: &mut dice,
            log: &mut log,
        };
        player_turn(&mut ctx, CombatTurn::flee(id)).unwrap();
        assert_eq!(ctx.combat.status(), CombatStatus::AwaitingEnemyTurn);

        let mut combat = initiate(Enemy::new("Rat", 5, 1, 0, 10), &party);
        let mut dice = ScriptedDice::new([12]);
        let mut ctx = CombatContext {
            party: &mut party,
            combat: &mut combat,
            roller: &mut dice,
            log: &mut log,
        };
        player_turn(&mut ctx, CombatTurn::flee(id)).unwrap();
        assert_eq!(combat.status(), CombatStatus::Fled);
        assert_eq!(party.player().xp(), 0);
    }

    #[test]
    fn test_not_players_turn() {
        let mut party = party_of(player(14));
        let mut combat = initiate(Enemy::new("Rat", 5, 1, 0, 10), &party);
        let mut dice = ScriptedDice::default();
        let mut log = GameLog::new();
        let id = party.player_id();
        let mut ctx = CombatContext {
            party: &mut party,
            combat: &mut combat,
            roller: &mut dice,
            log: &mut log,
        };
        ctx.combat.advance_index();
        assert!(matches!(
            player_turn(&mut ctx, CombatTurn::attack(id)),
            Err(CommandError::NotYourTurn)
        ));
    }
}
