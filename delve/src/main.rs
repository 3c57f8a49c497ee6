//! Delve terminal runner.
//!
//! A line-oriented interface over the headless game: commands are read from
//! stdin and game log lines are printed to stdout.
//!
//! ```bash
//! cargo run -p delve -- --name "Roland" --class warrior --background soldier
//! ```

mod runner;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = runner::parse_config_from_args(&args)?;
    runner::run(config).await
}

fn print_help() {
    println!("delve - a party dungeon crawler with an AI narrator");
    println!();
    println!("USAGE:");
    println!("    delve [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --name <NAME>              Character name (default: Adventurer)");
    println!("    --class <CLASS>            warrior, rogue, mage, cleric, ranger");
    println!("    --background <BACKGROUND>  soldier, scholar, urchin, acolyte, noble, wanderer");
    println!("    --seed <SEED>              Seed the dice for a reproducible run");
    println!("    --max-depth <DEPTH>        Depth that wins the run (default: 10)");
    println!("    -h, --help                 Print this help");
    println!();
    println!("ENVIRONMENT:");
    println!("    ANTHROPIC_API_KEY          Enables the Claude narrator");
    println!("    DELVE_MODEL                Narrator model override");
    println!("    DELVE_NARRATOR_TIMEOUT_MS  Narrator timeout");
    println!("    DELVE_SEED                 Default seed");
    println!("    RUST_LOG                   Diagnostics filter (default: warn)");
}
