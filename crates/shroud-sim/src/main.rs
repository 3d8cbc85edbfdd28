//! shroud-sim - lockstep desync harness.
//!
//! Plays a scripted skirmish on two mirrored clients and fails if their shrouds diverge.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use shroud_core::config::{EXPLORED_OPTION, FOG_OPTION};
use shroud_core::{LobbyOptions, ShroudConfig};
use shroud_sim::{run_lockstep, LockstepReport, ScenarioConfig};

#[derive(Parser)]
#[command(name = "shroud-sim")]
#[command(about = "Run two lockstep clients and check their shroud state matches", version)]
struct Cli {
    /// Map width in cells
    #[arg(long, default_value_t = 64)]
    width: u32,

    /// Map height in cells
    #[arg(long, default_value_t = 64)]
    height: u32,

    #[arg(long, default_value_t = 2)]
    players: u8,

    /// Units spawned per player
    #[arg(long, default_value_t = 8)]
    units: u32,

    #[arg(long, default_value_t = 500)]
    ticks: u32,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Unit sight radius in cells
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(i32).range(0..))]
    sight: i32,

    /// Shroud rules (YAML lobby checkbox definitions)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Lobby choice for fog of war
    #[arg(long)]
    fog: Option<bool>,

    /// Lobby choice for starting with the map explored
    #[arg(long)]
    explored: Option<bool>,

    /// Make client B reveal the map to player 0 at this tick
    #[arg(long, value_name = "TICK")]
    inject_desync_at: Option<u32>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn scenario(&self) -> Result<ScenarioConfig> {
        let rules = match &self.config {
            Some(path) => ShroudConfig::load(path)
                .with_context(|| format!("loading shroud rules from {}", path.display()))?,
            None => ShroudConfig::default(),
        };

        let mut lobby = LobbyOptions::new();
        if let Some(fog) = self.fog {
            lobby.set(FOG_OPTION, fog);
        }
        if let Some(explored) = self.explored {
            lobby.set(EXPLORED_OPTION, explored);
        }

        Ok(ScenarioConfig {
            width: self.width,
            height: self.height,
            players: self.players,
            units_per_player: self.units,
            ticks: self.ticks,
            seed: self.seed,
            sight_cells: self.sight,
            shroud: rules.resolve(&lobby),
        })
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let scenario = cli.scenario()?;
    tracing::debug!(shroud = ?scenario.shroud, "resolved shroud options");

    let report = run_lockstep(&scenario, cli.inject_desync_at)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(if report.in_sync() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_report(report: &LockstepReport) {
    println!(
        "Ran {} ticks, {} orders applied",
        report.ticks_run, report.orders_applied
    );
    println!();
    println!("{:<8} {:>10} {:>10} {:>12}  {:<16}", "player", "revealed", "explored", "hash", "digest");
    for p in &report.players {
        println!(
            "{:<8} {:>10} {:>10} {:>12}  {:016x}",
            p.player, p.revealed_cells, p.explored_cells, p.final_hash, p.final_digest
        );
    }
    println!();

    match &report.desync {
        None => println!("In sync"),
        Some(d) => {
            println!("DESYNC at tick {} (player {})", d.tick, d.player);
            println!("  hash    {} vs {}", d.hash_a, d.hash_b);
            println!("  digest  {:016x} vs {:016x}", d.digest_a, d.digest_b);
        }
    }
}
