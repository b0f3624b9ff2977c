//! Headless tactical kernel runner.
//!
//! Builds a scenario and runs one kernel operation on it, printing JSON
//! records on stdout.
//!
//! # Usage
//!
//! ```bash
//! # Let the hostiles think and act for five rounds
//! cargo run -p tactics_headless -- think --scenario breach --rounds 5
//!
//! # Route and reachable area of a unit
//! cargo run -p tactics_headless -- path --scenario breach --unit rookie --to 9,9,0 --reach
//!
//! # Detonate a charge and draw the aftermath
//! cargo run -p tactics_headless -- blast --scenario breach --at 7,9,0 --power 90 --radius 4 --ascii
//!
//! # What a unit can see
//! cargo run -p tactics_headless -- fov --scenario breach --unit guard --ascii
//!
//! # Sweep 64 seeds and check a replay
//! cargo run -p tactics_headless -- batch --scenario breach --runs 64 --verify
//! ```
//!
//! Built-in scenarios are `breach` and `patrol`; anything else is read as a
//! RON file path.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tactics_core::data::DamageKind;
use tactics_core::geometry::Position;
use tactics_core::unit::Faction;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tactics_headless::{
    ascii_visualizer::{render_level, AsciiConfig},
    batch::{run_batch, verify_determinism, BatchConfig},
    protocol::Record,
    runner::Session,
    scenario::{Scenario, ScenarioError},
};

#[derive(Parser)]
#[command(name = "tactics_headless")]
#[command(about = "Headless runner for the tactical kernel")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Scenario name or RON file
    #[arg(short, long, global = true, default_value = "breach")]
    scenario: String,

    /// Generator seed
    #[arg(long, global = true, default_value = "0")]
    seed: u64,

    /// Draw the level as ASCII on stderr when done
    #[arg(long, global = true)]
    ascii: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Let AI units decide and act
    Think {
        /// Rounds to play
        #[arg(short, long, default_value = "1")]
        rounds: u32,

        /// Play the player side's AI units too
        #[arg(long)]
        both_sides: bool,
    },

    /// Search a route for a unit
    Path {
        /// Unit name
        #[arg(short, long)]
        unit: String,

        /// Goal tile as x,y,z
        #[arg(long, value_parser = parse_position)]
        to: Option<Position>,

        /// Also list every tile reachable with the unit's TU
        #[arg(long)]
        reach: bool,

        /// TU budget for --reach
        #[arg(long)]
        budget: Option<u32>,
    },

    /// Detonate a blast
    Blast {
        /// Centre tile as x,y,z
        #[arg(long, value_parser = parse_position)]
        at: Position,

        /// Power at the centre
        #[arg(short, long, default_value = "80")]
        power: u32,

        /// Radius in tiles
        #[arg(short, long, default_value = "4")]
        radius: i32,

        /// he, incendiary, smoke or stun
        #[arg(short, long, default_value = "he", value_parser = parse_kind)]
        kind: DamageKind,
    },

    /// Field of view of a unit
    Fov {
        /// Unit name
        #[arg(short, long)]
        unit: String,
    },

    /// Run many seeds in parallel
    Batch {
        /// Number of seeds
        #[arg(short, long, default_value = "16")]
        runs: u32,

        /// Rounds per run
        #[arg(long, default_value = "5")]
        rounds: u32,

        /// Maximum parallel runs (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Write full results as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Replay the first seed and fail if it ends differently
        #[arg(long)]
        verify: bool,
    },
}

fn parse_position(text: &str) -> Result<Position, String> {
    let coords: Vec<i32> = text
        .split(',')
        .map(|part| part.trim().parse::<i32>().map_err(|e| format!("'{part}': {e}")))
        .collect::<Result<_, _>>()?;
    match coords.as_slice() {
        [x, y] => Ok(Position::new(*x, *y, 0)),
        [x, y, z] => Ok(Position::new(*x, *y, *z)),
        _ => Err(format!("expected x,y or x,y,z, got '{text}'")),
    }
}

fn parse_kind(text: &str) -> Result<DamageKind, String> {
    match text.to_lowercase().as_str() {
        "he" | "high_explosive" => Ok(DamageKind::HighExplosive),
        "incendiary" | "fire" => Ok(DamageKind::Incendiary),
        "smoke" => Ok(DamageKind::Smoke),
        "stun" => Ok(DamageKind::Stun),
        other => Err(format!("unknown blast kind '{other}'")),
    }
}

fn emit(record: &Record) {
    println!("{}", record.to_json_line());
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for records)
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    if let Err(e) = run(cli) {
        error!("{}", e);
        emit(&Record::Error {
            message: e.to_string(),
        });
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), ScenarioError> {
    let scenario = Scenario::resolve(&cli.scenario)?;

    if let Commands::Batch {
        runs,
        rounds,
        parallel,
        output,
        verify,
    } = cli.command
    {
        return cmd_batch(&scenario, cli.seed, runs, rounds, parallel, output, verify);
    }

    let mut session = Session::new(&scenario, cli.seed)?;
    emit(&session.header());
    let mut visible = None;

    match cli.command {
        Commands::Think { rounds, both_sides } => {
            for _ in 0..rounds {
                for record in session.play_round(Faction::Hostile)? {
                    emit(&record);
                }
                if both_sides {
                    for record in session.play_round(Faction::Player)? {
                        emit(&record);
                    }
                }
            }
            info!("Played {} rounds, {} units down", session.round(), session.fallen());
        }
        Commands::Path {
            unit,
            to,
            reach,
            budget,
        } => {
            if let Some(goal) = to {
                emit(&session.path(&unit, goal)?);
            }
            if reach || to.is_none() {
                emit(&session.reachable(&unit, budget)?);
            }
        }
        Commands::Blast {
            at,
            power,
            radius,
            kind,
        } => {
            emit(&session.blast(at, power, radius, kind)?);
        }
        Commands::Fov { unit } => {
            let record = session.fov(&unit)?;
            if let Record::Fov { report, .. } = &record {
                visible = Some(report.tiles.clone());
            }
            emit(&record);
        }
        Commands::Batch { .. } => {}
    }

    if cli.ascii {
        let config = AsciiConfig::default();
        eprint!("{}", render_level(session.battlefield(), &config, visible.as_deref()));
    }
    Ok(())
}

fn cmd_batch(
    scenario: &Scenario,
    seed: u64,
    runs: u32,
    rounds: u32,
    parallel: u32,
    output: Option<PathBuf>,
    verify: bool,
) -> Result<(), ScenarioError> {
    let config = BatchConfig {
        runs,
        seed_start: seed,
        rounds,
        parallel_runs: parallel,
    };
    let results = run_batch(scenario, config);
    for record in results.records() {
        emit(&record);
    }
    if let Some(path) = output {
        results.save(&path)?;
        info!("Results written to {}", path.display());
    }

    if verify {
        if verify_determinism(scenario, seed, rounds, 2)? {
            eprintln!("PASS: seed {} replays identically", seed);
        } else {
            eprintln!("FAIL: Non-determinism detected!");
            std::process::exit(1);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("3,4,1"), Ok(Position::new(3, 4, 1)));
        assert_eq!(parse_position("3, 4"), Ok(Position::new(3, 4, 0)));
        assert!(parse_position("3").is_err());
        assert!(parse_position("a,b").is_err());
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("HE"), Ok(DamageKind::HighExplosive));
        assert_eq!(parse_kind("smoke"), Ok(DamageKind::Smoke));
        assert!(parse_kind("water").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["tactics_headless", "blast", "--at", "7,9,0", "--radius", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Blast { radius: 3, power: 80, .. }));
        assert_eq!(cli.scenario, "breach");

        let cli = Cli::try_parse_from(["tactics_headless", "think", "--rounds", "2", "--seed", "7"]).unwrap();
        assert!(matches!(cli.command, Commands::Think { rounds: 2, both_sides: false }));
        assert_eq!(cli.seed, 7);
    }
}
