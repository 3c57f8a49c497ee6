//! Claude-backed narrator.

use super::{CombatOutcome, Narrator, NarratorConfig, NarratorError, NarratorMemory, RoomDescription};
use crate::world::{Enemy, PartyMember, Room, MAX_ENEMY_STAT};
use ::claude::{Claude, Request};
use async_trait::async_trait;
use serde::Deserialize;

const SYSTEM_PROMPT: &str = "You are the narrator of a grim, turn-based dungeon crawl. \
You never decide outcomes; the game engine has already resolved every roll. \
Write vivid, economical prose in second or third person. \
When asked for JSON, reply with a single JSON object and nothing else.";

/// Narrator that prompts Claude.
pub struct ClaudeNarrator {
    client: Claude,
    config: NarratorConfig,
}

impl ClaudeNarrator {
    pub fn new(client: Claude, config: NarratorConfig) -> Self {
        let client = match &config.model {
            Some(model) => client.with_model(model.clone()),
            None => client,
        };
        Self { client, config }
    }

    /// Build from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env(config: NarratorConfig) -> Result<Self, NarratorError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| NarratorError::Unavailable("ANTHROPIC_API_KEY not set".to_string()))?;
        let client = Claude::with_timeout(api_key, config.timeout)?;
        Ok(Self::new(client, config))
    }

    pub fn config(&self) -> &NarratorConfig {
        &self.config
    }

    async fn ask(&self, prompt: String) -> Result<String, NarratorError> {
        let mut request = Request::prompt(prompt)
            .with_system(SYSTEM_PROMPT)
            .with_max_tokens(self.config.max_tokens);
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        let completion = self.client.complete(request).await?;
        if completion.truncated() {
            tracing::debug!(output_tokens = completion.usage.output_tokens, "narration hit max_tokens");
        }
        Ok(completion.text)
    }
}

fn character_line(character: &PartyMember) -> String {
    format!(
        "{} the level {} {}",
        character.name,
        character.level(),
        character.class
    )
}

#[async_trait]
impl Narrator for ClaudeNarrator {
    async fn describe_room(
        &self,
        room: &Room,
        character: &PartyMember,
        memory: &NarratorMemory,
    ) -> Result<RoomDescription, NarratorError> {
        let exits: Vec<&str> = room.exits.iter().map(|d| d.name()).collect();
        let mut contents = Vec::new();
        if room.has_enemy() {
            contents.push("a hostile presence");
        }
        if room.has_loot() {
            contents.push("something glinting");
        }
        let prompt = format!(
            "{context}\n\
             {who} enters a {kind} at depth {depth}. Exits: {exits}. Notable: {contents}.\n\
             Reply as JSON: {{\"description\": \"two sentences of what they see\", \
             \"symbolic\": \"one sentence of what the place means\"}}",
            context = memory.build_context(),
            who = character_line(character),
            kind = room.room_type,
            depth = room.depth,
            exits = exits.join(", "),
            contents = if contents.is_empty() {
                "nothing obvious".to_string()
            } else {
                contents.join(", ")
            },
        );
        let text = self.ask(prompt).await?;
        parse_room_description(&text)
    }

    async fn narrate_combat(
        &self,
        action: &str,
        character: &PartyMember,
        enemy: &Enemy,
        outcome: CombatOutcome,
        memory: &NarratorMemory,
    ) -> Result<String, NarratorError> {
        let result = match (outcome.hit, outcome.critical) {
            (true, true) => format!("a critical hit for {} damage", outcome.damage),
            (true, false) => format!("a hit for {} damage", outcome.damage),
            (false, _) => "a miss".to_string(),
        };
        let prompt = format!(
            "{}\n{} uses {action} against the {} ({}/{} hp). The result is {result}. \
             Describe it in exactly one sentence.",
            memory.build_context(),
            character_line(character),
            enemy.name,
            enemy.hp(),
            enemy.max_hp,
        );
        let text = self.ask(prompt).await?;
        let line = text.trim();
        if line.is_empty() {
            return Err(NarratorError::Malformed("empty narration".to_string()));
        }
        Ok(line.to_string())
    }

    async fn generate_enemy(
        &self,
        room_type: &str,
        depth: u32,
        character: &PartyMember,
    ) -> Result<Enemy, NarratorError> {
        let prompt = format!(
            "Invent one monster lurking in a {room_type} at depth {depth} of a dungeon, \
             a fair fight for {who}. Scale it with depth.\n\
             Reply as JSON: {{\"name\": string, \"hp\": int, \"attack\": int, \
             \"defense\": int, \"xp\": int, \"symbolic\": \"one sentence of flavor\"}}",
            who = character_line(character),
        );
        let text = self.ask(prompt).await?;
        parse_enemy(&text)
    }

    fn name(&self) -> &str {
        "claude"
    }
}

// ============================================================================
// Response parsing
// ============================================================================

/// Strip markdown fences and surrounding prose from a JSON reply.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn parse_room_description(text: &str) -> Result<RoomDescription, NarratorError> {
    let json = extract_json(text).ok_or_else(|| NarratorError::Malformed(text.to_string()))?;
    let parsed: RoomDescription =
        serde_json::from_str(json).map_err(|e| NarratorError::Malformed(e.to_string()))?;
    if parsed.description.trim().is_empty() {
        return Err(NarratorError::Malformed("empty description".to_string()));
    }
    Ok(parsed)
}

#[derive(Debug, Deserialize)]
struct EnemyPayload {
    name: String,
    hp: i64,
    #[serde(default)]
    attack: i64,
    #[serde(default)]
    defense: i64,
    #[serde(default, alias = "xp_reward", alias = "xpReward")]
    xp: i64,
    #[serde(default)]
    symbolic: String,
}

fn parse_enemy(text: &str) -> Result<Enemy, NarratorError> {
    let json = extract_json(text).ok_or_else(|| NarratorError::Malformed(text.to_string()))?;
    let payload: EnemyPayload =
        serde_json::from_str(json).map_err(|e| NarratorError::Malformed(e.to_string()))?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(NarratorError::Malformed("enemy has no name".to_string()));
    }
    let limit = MAX_ENEMY_STAT as i64;
    if !(1..=limit).contains(&payload.hp) {
        return Err(NarratorError::Malformed(format!("enemy hp {}", payload.hp)));
    }
    if payload.attack > limit || payload.defense > limit {
        return Err(NarratorError::Malformed(format!(
            "enemy attack {} / defense {} above {limit}",
            payload.attack, payload.defense
        )));
    }

    let clamp = |v: i64| v.clamp(0, u32::MAX as i64) as u32;
    let mut enemy = Enemy::new(
        name,
        clamp(payload.hp),
        clamp(payload.attack),
        clamp(payload.defense),
        clamp(payload.xp),
    )
    .with_symbolic(payload.symbolic);
    enemy.ai_generated = true;
    Ok(enemy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_room_description() {
        let text = "```json\n{\"description\": \"Bones crunch underfoot.\", \"symbolic\": \"Endings.\"}\n```";
        let parsed = parse_room_description(text).unwrap();
        assert_eq!(parsed.description, "Bones crunch underfoot.");
        assert_eq!(parsed.symbolic, "Endings.");
    }

    #[test]
    fn test_parse_enemy() {
        let text = r#"Here you go: {"name": "Bone Warden", "hp": 18, "attack": 4, "defense": 2, "xp": 65, "symbolic": "Duty outlives flesh."}"#;
        let enemy = parse_enemy(text).unwrap();
        assert_eq!(enemy.name, "Bone Warden");
        assert_eq!(enemy.hp(), 18);
        assert_eq!(enemy.xp_reward, 65);
        assert!(enemy.ai_generated);
    }

    #[test]
    fn test_parse_enemy_rejects_bad_stats() {
        assert!(matches!(
            parse_enemy(r#"{"name": "", "hp": 10}"#),
            Err(NarratorError::Malformed(_))
        ));
        assert!(matches!(
            parse_enemy(r#"{"name": "Wisp", "hp": 0}"#),
            Err(NarratorError::Malformed(_))
        ));
        assert!(matches!(parse_enemy("no json here"), Err(NarratorError::Malformed(_))));
        assert!(matches!(
            parse_enemy(r#"{"name": "Bulwark", "hp": 10, "attack": 1, "defense": 2147483647}"#),
            Err(NarratorError::Malformed(_))
        ));
        assert!(matches!(
            parse_enemy(r#"{"name": "Titan", "hp": 10, "attack": 3000000000}"#),
            Err(NarratorError::Malformed(_))
        ));
        assert!(matches!(
            parse_enemy(r#"{"name": "Colossus", "hp": 1001}"#),
            Err(NarratorError::Malformed(_))
        ));
    }

    #[test]
    fn test_negative_stats_clamp_to_zero() {
        let enemy = parse_enemy(r#"{"name": "Slime", "hp": 4, "attack": -3, "defense": -1}"#).unwrap();
        assert_eq!(enemy.attack, 0);
        assert_eq!(enemy.defense, 0);
        assert_eq!(enemy.xp_reward, 0);
    }
}
