//! Two simulated clients fed the same order stream, compared every tick.

use anyhow::{ensure, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::scenario::{OrderStream, PlayerTick, ScenarioConfig, Simulation};

/// First tick at which the two clients disagreed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Desync {
    pub tick: i32,
    pub player: u8,
    pub hash_a: i32,
    pub hash_b: i32,
    pub digest_a: u64,
    pub digest_b: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlayerSummary {
    pub player: u8,
    pub revealed_cells: i32,
    pub explored_cells: usize,
    pub final_hash: i32,
    pub final_digest: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LockstepReport {
    pub ticks_run: u32,
    pub orders_applied: usize,
    pub desync: Option<Desync>,
    pub players: Vec<PlayerSummary>,
}

impl LockstepReport {
    pub fn in_sync(&self) -> bool {
        self.desync.is_none()
    }
}

/// Run `config.ticks` steps on two clients. With `fault_at`, client B reveals the whole map to
/// player 0 just before that tick, outside the order stream.
pub fn run_lockstep(config: &ScenarioConfig, fault_at: Option<u32>) -> Result<LockstepReport> {
    ensure!(
        config.width > 0 && config.height > 0,
        "map must be at least 1x1, got {}x{}",
        config.width,
        config.height
    );
    ensure!(config.players > 0, "need at least one player");
    ensure!(
        config.sight_cells >= 0,
        "sight radius must not be negative, got {}",
        config.sight_cells
    );

    let mut a = Simulation::new(config)?;
    let mut b = Simulation::new(config)?;
    let mut orders = OrderStream::new(config);
    info!(
        width = config.width,
        height = config.height,
        players = a.player_count(),
        units = a.units().len(),
        ticks = config.ticks,
        seed = config.seed,
        "starting lockstep run"
    );

    let mut report = LockstepReport {
        ticks_run: 0,
        orders_applied: 0,
        desync: None,
        players: Vec::new(),
    };

    for step in 1..=config.ticks {
        for order in orders.next_orders() {
            a.apply(&order)?;
            b.apply(&order)?;
            report.orders_applied += 1;
        }
        if fault_at == Some(step) {
            debug!(tick = step, "injecting local reveal on client B");
            b.reveal_map_locally(0)?;
        }

        let ticks_a = a.tick()?;
        let ticks_b = b.tick()?;
        report.ticks_run = step;

        if let Some(desync) = compare(a.world_tick(), &ticks_a, &ticks_b) {
            warn!(
                tick = desync.tick,
                player = desync.player,
                hash_a = desync.hash_a,
                hash_b = desync.hash_b,
                "clients diverged"
            );
            report.desync = Some(desync);
            break;
        }
    }

    report.players = summarize(&a)?;
    info!(
        ticks = report.ticks_run,
        orders = report.orders_applied,
        in_sync = report.in_sync(),
        "lockstep run finished"
    );
    Ok(report)
}

/// The sync hash only moves on resolving ticks, so the content digest is compared too.
fn compare(tick: i32, a: &[PlayerTick], b: &[PlayerTick]) -> Option<Desync> {
    a.iter().zip(b).find_map(|(pa, pb)| {
        (pa.hash != pb.hash || pa.digest != pb.digest).then(|| Desync {
            tick,
            player: pa.player,
            hash_a: pa.hash,
            hash_b: pb.hash,
            digest_a: pa.digest,
            digest_b: pb.digest,
        })
    })
}

fn summarize(sim: &Simulation) -> Result<Vec<PlayerSummary>> {
    sim.shrouds()
        .iter()
        .enumerate()
        .map(|(player, shroud)| {
            let explored_cells = sim
                .map()
                .projected_cells()
                .filter(|&p| shroud.is_explored(p))
                .count();
            Ok(PlayerSummary {
                player: player as u8,
                revealed_cells: shroud.revealed_cells(),
                explored_cells,
                final_hash: shroud.hash(),
                final_digest: shroud.snapshot().digest()?,
            })
        })
        .collect()
}
