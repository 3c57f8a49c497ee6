//! Line-oriented game loop.
//!
//! - Lines starting with `#` are runner commands (quit, status, inventory,
//!   recruits, help)
//! - Everything else is sent to the game as a player command

use anyhow::{anyhow, Result};
use delve_core::headless::{HeadlessConfig, HeadlessGame};
use delve_core::{Background, CharacterClass, GamePhase, SessionConfig};
use std::io::{self, BufRead, Write};

/// Run the game until stdin closes or the player quits.
pub async fn run(config: HeadlessConfig) -> Result<()> {
    let mut game = HeadlessGame::new(config).await?;
    tracing::info!(
        narrator = game.session().narrator_name(),
        phase = %game.phase(),
        "run started"
    );

    println!("=== Delve ===");
    println!("Narrator: {}", game.session().narrator_name());
    if let Some(intro) = game.last_response() {
        println!("{intro}");
    }
    println!();
    print_prompt(&game);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                eprintln!("Error reading input: {e}");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            print_prompt(&game);
            continue;
        }

        if let Some(meta) = line.strip_prefix('#') {
            match meta.trim() {
                "quit" | "exit" => {
                    println!("Goodbye!");
                    break;
                }
                "status" => println!("{}", game.status_line()),
                "inventory" | "inv" => {
                    for item in game.inventory() {
                        println!("  {item}");
                    }
                }
                "recruits" => {
                    for recruit in game.recruits() {
                        println!("  {recruit}");
                    }
                }
                "help" => print_commands(),
                _ => println!("[ERROR] Unknown runner command. Type #help for help."),
            }
            print_prompt(&game);
            continue;
        }

        let response = game.send(line).await;
        if !response.applied {
            tracing::debug!(input = line, phase = %response.phase, "command not applied");
        }
        println!("{}", response.text);

        if game.phase() == GamePhase::CharacterCreation {
            tracing::info!("party gone; starting a new adventurer");
            println!();
            println!("A new adventurer steps forward.");
            println!("{}", game.begin().await.text);
        }
        println!();
        print_prompt(&game);
    }

    tracing::info!(phase = %game.phase(), depth = game.depth(), gold = game.gold(), "run ended");
    Ok(())
}

fn print_prompt(game: &HeadlessGame) {
    println!("{}", game.status_line());
    match game.phase() {
        GamePhase::Combat => println!("(attack, defend, flee, use <n> [member])"),
        GamePhase::Death => println!("(resurrect, surrender)"),
        GamePhase::Victory => println!("(new)"),
        GamePhase::Dungeon | GamePhase::CharacterCreation => {}
    }
    print!("> ");
    io::stdout().flush().ok();
}

fn print_commands() {
    println!("[HELP]");
    println!("  north|south|east|west (or n/s/e/w), move <dir>");
    println!("  search, rest, attack, defend, flee");
    println!("  use <n> [member]     - use inventory item n, optionally on a member");
    println!("  recruit <id>         - hire an ally (see #recruits)");
    println!("  resurrect [member]   - raise the fallen");
    println!("  surrender, new");
    println!("  #status #inventory #recruits #quit");
}

/// Parse character and session options from command line arguments.
pub fn parse_config_from_args(args: &[String]) -> Result<HeadlessConfig> {
    let mut session = SessionConfig::from_env()?;
    let mut config = HeadlessConfig::quick_start("Adventurer");

    let mut i = 1;
    while i < args.len() {
        let value = || {
            args.get(i + 1)
                .ok_or_else(|| anyhow!("{} needs a value", args[i]))
        };
        match args[i].as_str() {
            "--name" => config.name = value()?.clone(),
            "--class" => config.class = value()?.parse::<CharacterClass>().map_err(|e| anyhow!(e))?,
            "--background" => {
                config.background = value()?.parse::<Background>().map_err(|e| anyhow!(e))?
            }
            "--seed" => session = session.with_seed(value()?.parse()?),
            "--max-depth" => session = session.with_max_depth(value()?.parse()?),
            other => return Err(anyhow!("unknown option '{other}' (try --help)")),
        }
        i += 2;
    }

    Ok(config.with_session(session))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("delve")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_defaults() {
        let config = parse_config_from_args(&args(&[])).unwrap();
        assert_eq!(config.name, "Adventurer");
        assert_eq!(config.class, CharacterClass::Warrior);
    }

    #[test]
    fn test_parse_options() {
        let config = parse_config_from_args(&args(&[
            "--name",
            "Ida",
            "--class",
            "mage",
            "--background",
            "Scholar",
            "--seed",
            "42",
            "--max-depth",
            "5",
        ]))
        .unwrap();
        assert_eq!(config.name, "Ida");
        assert_eq!(config.class, CharacterClass::Mage);
        assert_eq!(config.background, Background::Scholar);
        assert_eq!(config.session.seed, Some(42));
        assert_eq!(config.session.max_depth, 5);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_config_from_args(&args(&["--class", "bard"])).is_err());
        assert!(parse_config_from_args(&args(&["--seed"])).is_err());
        assert!(parse_config_from_args(&args(&["--fly"])).is_err());
    }
}
