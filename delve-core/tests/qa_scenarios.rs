//! Scripted end-to-end scenarios through the session controller.
//!
//! All randomness is scripted with `ScriptedDice` and narration comes from
//! `MockNarrator`, so these run offline and deterministically.

use delve_core::generator::RoomOdds;
use delve_core::narrator::NarratorConfig;
use delve_core::testing::{
    assert_applied, assert_hp, assert_in_combat, assert_not_in_combat, assert_phase, assert_rejected,
    MockNarrator, ScriptedDice, TestHarness,
};
use delve_core::world::{Enemy, ItemType};
use delve_core::{Background, CharacterClass, Command, GamePhase, SessionConfig};
use std::time::Duration;

/// Every generated room holds an enemy and nothing else.
fn hostile_config() -> SessionConfig {
    SessionConfig::new().with_odds(RoomOdds {
        enemy_base: 1.0,
        ..RoomOdds::empty()
    })
}

// =============================================================================
// Combat
// =============================================================================

#[tokio::test]
async fn test_kill_scenario_awards_full_xp() {
    // Warrior STR 15 (+2), Longsword d8. Ghoul defense 2, 10 hp.
    // d20 15 + 2 = 17 hits; d8 8 + 2 = 10 kills.
    let mut harness = TestHarness::with_config(hostile_config()).with_dice(ScriptedDice::new([15, 8]));
    harness.narrator.queue_enemy(Enemy::new("Ghoul", 10, 3, 2, 50));

    assert_applied(&harness.quick_start().await);
    assert_phase(&harness, GamePhase::Combat);
    assert_in_combat(&harness);

    let response = harness.send(Command::Attack).await;
    assert_applied(&response);
    assert_phase(&harness, GamePhase::Dungeon);
    assert_not_in_combat(&harness);

    let party = harness.party().unwrap();
    assert_eq!(party.player().xp(), 50);
    assert_eq!(party.player().level(), 1);
    assert_eq!(party.reputation, 5);
    assert_eq!(party.morale(), 80);
    assert!(response.text().contains("The Ghoul is defeated!"));
    assert!(!harness.current_room().unwrap().has_enemy());
}

#[tokio::test]
async fn test_enemy_drops_loot_for_search() {
    let config = SessionConfig::new().with_odds(RoomOdds {
        enemy_base: 1.0,
        enemy_loot: 1.0,
        ..RoomOdds::empty()
    });
    let mut harness = TestHarness::with_config(config).with_dice(ScriptedDice::new([15, 8]));
    harness.narrator.queue_enemy(Enemy::new("Ghoul", 10, 3, 2, 50));
    harness.quick_start().await;
    let carried = harness.session.combat().unwrap().enemy().loot.clone();
    assert_eq!(carried.len(), 1);

    let response = harness.send(Command::Attack).await;
    assert_phase(&harness, GamePhase::Dungeon);
    assert!(response.text().contains(&format!("The Ghoul dropped a {}.", carried[0].name)));
    assert!(harness.current_room().unwrap().has_loot());

    let gold = harness.gold();
    let packed = harness.party().unwrap().player().inventory.len();
    assert_applied(&harness.send(Command::Search).await);
    assert!(!harness.current_room().unwrap().has_loot());
    let player = harness.party().unwrap().player();
    if carried[0].item_type == ItemType::Treasure {
        assert_eq!(harness.gold(), gold + carried[0].value.unwrap_or(0));
    } else {
        assert_eq!(player.inventory.len(), packed + 1);
        assert!(player.inventory.iter().any(|i| i.id == carried[0].id));
    }
}

#[tokio::test]
async fn test_out_of_range_enemy_is_replaced_before_combat() {
    // Defense this large used to overflow the hit check.
    let mut harness = TestHarness::with_config(hostile_config()).with_dice(ScriptedDice::new([15, 8]));
    harness
        .narrator
        .queue_enemy(Enemy::new("Bulwark", 10, 1, i32::MAX as u32, 10));
    assert_applied(&harness.quick_start().await);
    let enemy = harness.session.combat().unwrap().enemy();
    assert_eq!(enemy.name, delve_core::generator::FALLBACK_ENEMY_NAME);
    assert_eq!(enemy.defense, 0);

    // d20 15 + 2 hits; d8 8 + 2 = 10 fells the 10 hp fallback.
    assert_applied(&harness.send(Command::Attack).await);
    assert_phase(&harness, GamePhase::Dungeon);
    assert_not_in_combat(&harness);
}

#[tokio::test]
async fn test_wipe_then_resurrect() {
    // Player misses with a 1; the fallback enemy (attack 4) rolls 20 and 6
    // for 8 damage each round. 14 hp falls in two rounds.
    let dice = ScriptedDice::new([1, 20, 6, 1, 20, 6]);
    let mut harness = TestHarness::with_config(hostile_config()).with_dice(dice);
    assert_applied(
        &harness
            .create("Ilse", CharacterClass::Warrior, Background::Noble)
            .await,
    );
    assert_eq!(harness.gold(), 120);

    harness.send(Command::Attack).await;
    assert_hp(&harness, 6, 14);
    assert_phase(&harness, GamePhase::Combat);

    let response = harness.send(Command::Attack).await;
    assert_phase(&harness, GamePhase::Death);
    assert_hp(&harness, 0, 14);
    assert!(response.text().contains("Resurrect for 100 gold"));

    // Only resurrect, surrender or start over are accepted now.
    assert_rejected(&harness.send(Command::Rest).await, "during death");

    assert_applied(&harness.send(Command::Resurrect(None)).await);
    assert_phase(&harness, GamePhase::Dungeon);
    assert_hp(&harness, 7, 14);
    assert_eq!(harness.gold(), 20);
    // 75 - 10 for the fall - 25 for the resurrection.
    assert_eq!(harness.party().unwrap().morale(), 40);

    // The enemy is still waiting in the room.
    assert!(harness.current_room().unwrap().has_enemy());
    assert_rejected(&harness.send(Command::Rest).await, "nearby");
    harness.send(Command::Attack).await;
    assert_in_combat(&harness);
}

#[tokio::test]
async fn test_resurrection_needs_gold_then_surrender() {
    let dice = ScriptedDice::new([1, 20, 6, 1, 20, 6]);
    let mut harness = TestHarness::with_config(hostile_config()).with_dice(dice);
    harness.quick_start().await;
    harness.send(Command::Attack).await;
    harness.send(Command::Attack).await;
    assert_phase(&harness, GamePhase::Death);

    let response = harness.send(Command::Resurrect(None)).await;
    assert_rejected(&response, "Not enough gold: 100 needed, 50 available");
    assert_phase(&harness, GamePhase::Death);
    assert_eq!(harness.gold(), 50);

    assert_applied(&harness.send(Command::Surrender).await);
    assert_phase(&harness, GamePhase::CharacterCreation);
    assert!(harness.party().is_none());
}

#[tokio::test]
async fn test_flee_leaves_enemy_in_room() {
    // Flee needs d20 >= 12.
    let mut harness = TestHarness::with_config(hostile_config()).with_dice(ScriptedDice::new([14]));
    harness.quick_start().await;
    assert_in_combat(&harness);

    assert_applied(&harness.send(Command::Flee).await);
    assert_phase(&harness, GamePhase::Dungeon);
    assert!(harness.current_room().unwrap().has_enemy());
    assert_hp(&harness, 14, 14);
}

#[tokio::test]
async fn test_combat_commands_outside_combat_rejected() {
    let mut harness = TestHarness::with_config(SessionConfig::new().with_odds(RoomOdds::empty()));
    harness.quick_start().await;
    assert_rejected(&harness.send(Command::Defend).await, "during dungeon");
    assert_rejected(&harness.send(Command::Flee).await, "during dungeon");
    assert_rejected(&harness.send(Command::Attack).await, "nothing here to fight");
}

// =============================================================================
// Narration never changes outcomes
// =============================================================================

async fn scripted_fight(narrator: MockNarrator, timeout: Duration) -> (u32, u32, GamePhase) {
    let config = hostile_config()
        .with_narrator(NarratorConfig::default().with_timeout(timeout));
    let mut harness = TestHarness::with_config(config)
        .with_narrator(narrator)
        .with_dice(ScriptedDice::new([1, 20, 3, 16, 7]));
    harness.quick_start().await;
    harness.send(Command::Attack).await;
    harness.send(Command::Attack).await;
    let enemy_hp = harness
        .session
        .combat()
        .map(|c| c.enemy().hp())
        .unwrap_or(0);
    (harness.player_hp().0, enemy_hp, harness.phase())
}

#[tokio::test]
async fn test_narrator_failure_does_not_change_outcome() {
    let working = scripted_fight(MockNarrator::new(), Duration::from_secs(1)).await;
    let failing = scripted_fight(MockNarrator::failing(), Duration::from_secs(1)).await;
    let slow = scripted_fight(MockNarrator::slow(Duration::from_millis(200)), Duration::from_millis(20)).await;
    assert_eq!(working, failing);
    assert_eq!(working, slow);
}

#[tokio::test]
async fn test_failing_narrator_uses_fallback_text() {
    let mut harness = TestHarness::with_config(hostile_config()).with_narrator(MockNarrator::failing());
    assert_applied(&harness.quick_start().await);
    let room = harness.current_room().unwrap();
    assert!(!room.description.is_empty());
    let combat = harness.session.combat().unwrap();
    assert_eq!(combat.enemy().name, delve_core::generator::FALLBACK_ENEMY_NAME);
    assert!(!combat.enemy().ai_generated);
}

// =============================================================================
// Recruitment
// =============================================================================

#[tokio::test]
async fn test_recruitment_without_gold_changes_nothing() {
    let mut harness = TestHarness::with_config(SessionConfig::new().with_odds(RoomOdds::empty()));
    harness.quick_start().await;

    let response = harness.send(Command::Recruit("vex".into())).await;
    assert_rejected(&response, "Not enough gold: 150 needed, 50 available");
    assert_eq!(harness.gold(), 50);
    assert_eq!(harness.party_size(), 1);
}

#[tokio::test]
async fn test_recruit_then_reject_duplicate() {
    let mut harness = TestHarness::with_config(SessionConfig::new().with_odds(RoomOdds::empty()));
    harness.quick_start().await;

    assert_applied(&harness.send(Command::Recruit("Bram".into())).await);
    assert_eq!(harness.party_size(), 2);
    assert_eq!(harness.gold(), 0);
    assert_rejected(&harness.send(Command::Recruit("bram".into())).await, "already joined");
    assert_rejected(&harness.send(Command::Recruit("nobody".into())).await, "looking for work");
}
