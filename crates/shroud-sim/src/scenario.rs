//! A scripted skirmish: units with sight radii, radar, and gap generators feeding one shroud per
//! player.

use serde::{Deserialize, Serialize};
use tracing::debug;

use shroud_core::{
    CPos, PPos, ProjectedMap, Shroud, ShroudError, ShroudOptions, SourceKey, SourceKind,
    TickContext, WDist, WinState,
};

use crate::rng::{player_identity_hash, SimRng};

// Source keys are partitioned by owner type so they never collide within one shroud.
const RADAR_KEY_BASE: u64 = 1 << 32;
const GAP_KEY_BASE: u64 = 2 << 32;
const REVEAL_KEY: u64 = 3 << 32;

/// Radius of the shroud a gap generator casts over enemies.
const GAP_RADIUS_CELLS: i32 = 4;
/// Radius of passive radar coverage around each spawn.
const RADAR_RADIUS_CELLS: i32 = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub width: u32,
    pub height: u32,
    pub players: u8,
    pub units_per_player: u32,
    pub ticks: u32,
    pub seed: u64,
    pub sight_cells: i32,
    pub shroud: ShroudOptions,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            players: 2,
            units_per_player: 8,
            ticks: 500,
            seed: 1,
            sight_cells: 5,
            shroud: ShroudOptions::default(),
        }
    }
}

/// Commands issued to the simulation, identical on every client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Move { unit: usize, dx: i32, dy: i32 },
    SetShroudDisabled { player: u8, disabled: bool },
    Defeat { player: u8 },
    ShareExploration { from: u8, to: u8 },
    ResetExploration { player: u8 },
    DeployGapGenerator { owner: u8, at: CPos },
    RemoveGapGenerator { owner: u8 },
}

#[derive(Clone, Copy, Debug)]
pub struct Unit {
    pub owner: u8,
    pub position: CPos,
    pub sight: WDist,
    key: SourceKey,
}

/// Per-player result of one simulation tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PlayerTick {
    pub player: u8,
    pub hash: i32,
    pub digest: u64,
    pub revealed_cells: i32,
    pub changed_cells: usize,
}

#[derive(Clone, Debug)]
pub struct Simulation {
    map: ProjectedMap,
    units: Vec<Unit>,
    shrouds: Vec<Shroud>,
    win_states: Vec<WinState>,
    player_hashes: Vec<i32>,
    gap_generators: Vec<Option<CPos>>,
    world_tick: i32,
}

impl Simulation {
    pub fn new(config: &ScenarioConfig) -> Result<Self, ShroudError> {
        let mut map = ProjectedMap::new(config.width, config.height);
        let mut rng = SimRng::seed_from_u64(config.seed);

        // A few ridges so projection matters. Raised cells stay clear of the top rows so they
        // never project off the map.
        if config.height > 2 {
            let ridges = (config.width * config.height / 64).max(1);
            for _ in 0..ridges {
                let cell = CPos::new(
                    rng.gen_range_i32(0..config.width as i32),
                    rng.gen_range_i32(2..config.height as i32),
                );
                let height = rng.gen_range_i32(1..3) as u8;
                map.set_terrain_height(cell, height);
            }
        }

        let players = usize::from(config.players.max(1));
        let shrouds = (0..players)
            .map(|_| Shroud::new(&map, config.shroud))
            .collect();
        let player_hashes = (0..players)
            .map(|p| player_identity_hash(config.seed, p as u8))
            .collect();

        let mut sim = Self {
            map,
            units: Vec::new(),
            shrouds,
            win_states: vec![WinState::Undefined; players],
            player_hashes,
            gap_generators: vec![None; players],
            world_tick: 0,
        };

        for owner in 0..players as u8 {
            let spawn = random_cell(&mut rng, &sim.map);
            let radar = sim.map.cells_in_cell_range(spawn, WDist::from_cells(RADAR_RADIUS_CELLS));
            sim.shrouds[usize::from(owner)].add_source(
                SourceKey(RADAR_KEY_BASE + u64::from(owner)),
                SourceKind::PassiveVisibility,
                radar,
            )?;

            for _ in 0..config.units_per_player {
                let offset = (rng.gen_range_i32(-3..4), rng.gen_range_i32(-3..4));
                let position = sim.clamp(spawn + offset);
                let key = SourceKey(sim.units.len() as u64);
                sim.units.push(Unit {
                    owner,
                    position,
                    sight: WDist::from_cells(config.sight_cells),
                    key,
                });
                let unit = sim.units.len() - 1;
                sim.add_sight(unit)?;
            }
        }

        Ok(sim)
    }

    pub fn map(&self) -> &ProjectedMap {
        &self.map
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn shrouds(&self) -> &[Shroud] {
        &self.shrouds
    }

    pub fn world_tick(&self) -> i32 {
        self.world_tick
    }

    pub fn player_count(&self) -> usize {
        self.shrouds.len()
    }

    pub fn apply(&mut self, order: &Order) -> Result<(), ShroudError> {
        match *order {
            Order::Move { unit, dx, dy } => {
                let Some(current) = self.units.get(unit) else {
                    return Ok(());
                };
                let target = self.clamp(current.position + (dx, dy));
                if target == current.position {
                    return Ok(());
                }
                let (owner, key) = (current.owner, current.key);
                self.shrouds[usize::from(owner)].remove_source(key);
                self.units[unit].position = target;
                self.add_sight(unit)?;
            }
            Order::SetShroudDisabled { player, disabled } => {
                if let Some(shroud) = self.shrouds.get_mut(usize::from(player)) {
                    shroud.set_disabled(disabled);
                }
            }
            Order::Defeat { player } => {
                if let Some(state) = self.win_states.get_mut(usize::from(player)) {
                    debug!(player, tick = self.world_tick, "player defeated");
                    *state = WinState::Lost;
                }
            }
            Order::ShareExploration { from, to } => {
                let (from, to) = (usize::from(from), usize::from(to));
                if from == to || from >= self.shrouds.len() || to >= self.shrouds.len() {
                    return Ok(());
                }
                let source = self.shrouds[from].clone();
                self.shrouds[to].explore(&source)?;
            }
            Order::ResetExploration { player } => {
                if let Some(shroud) = self.shrouds.get_mut(usize::from(player)) {
                    shroud.reset_exploration();
                }
            }
            Order::DeployGapGenerator { owner, at } => {
                if usize::from(owner) >= self.shrouds.len() {
                    return Ok(());
                }
                self.remove_gap_generator(owner);
                let cells = self
                    .map
                    .cells_in_cell_range(self.clamp(at), WDist::from_cells(GAP_RADIUS_CELLS));
                let key = SourceKey(GAP_KEY_BASE + u64::from(owner));
                for (player, shroud) in self.shrouds.iter_mut().enumerate() {
                    if player != usize::from(owner) {
                        shroud.add_source(key, SourceKind::Shroud, cells.iter().copied())?;
                    }
                }
                self.gap_generators[usize::from(owner)] = Some(at);
            }
            Order::RemoveGapGenerator { owner } => self.remove_gap_generator(owner),
        }
        Ok(())
    }

    /// Advance one simulation step and resolve every player's shroud.
    pub fn tick(&mut self) -> Result<Vec<PlayerTick>, ShroudError> {
        self.world_tick = self.world_tick.wrapping_add(1);
        let mut out = Vec::with_capacity(self.shrouds.len());
        for (player, shroud) in self.shrouds.iter_mut().enumerate() {
            let ctx = TickContext {
                world_tick: self.world_tick,
                player_hash: self.player_hashes[player],
                win_state: self.win_states[player],
            };
            shroud.tick(&ctx);
            out.push(PlayerTick {
                player: player as u8,
                hash: shroud.hash(),
                digest: shroud.snapshot().digest()?,
                revealed_cells: shroud.revealed_cells(),
                changed_cells: shroud.changed_cells().len(),
            });
        }
        Ok(out)
    }

    /// Client-side fault: reveal the whole map to `player` outside the order stream.
    pub fn reveal_map_locally(&mut self, player: u8) -> Result<(), ShroudError> {
        let cells: Vec<PPos> = self.map.projected_cells().collect();
        if let Some(shroud) = self.shrouds.get_mut(usize::from(player)) {
            shroud.add_source(SourceKey(REVEAL_KEY), SourceKind::Visibility, cells)?;
        }
        Ok(())
    }

    fn add_sight(&mut self, unit: usize) -> Result<(), ShroudError> {
        let Unit {
            owner,
            position,
            sight,
            key,
        } = self.units[unit];
        let cells = self.map.cells_in_cell_range(position, sight);
        self.shrouds[usize::from(owner)].add_source(key, SourceKind::Visibility, cells)
    }

    fn remove_gap_generator(&mut self, owner: u8) {
        let Some(slot) = self.gap_generators.get_mut(usize::from(owner)) else {
            return;
        };
        if slot.take().is_none() {
            return;
        }
        let key = SourceKey(GAP_KEY_BASE + u64::from(owner));
        for shroud in &mut self.shrouds {
            shroud.remove_source(key);
        }
    }

    fn clamp(&self, cell: CPos) -> CPos {
        CPos {
            x: cell.x.clamp(0, self.map.width() as i32 - 1),
            y: cell.y.clamp(0, self.map.height() as i32 - 1),
        }
    }
}

fn random_cell(rng: &mut SimRng, map: &ProjectedMap) -> CPos {
    CPos {
        x: rng.gen_range_i32(0..map.width() as i32),
        y: rng.gen_range_i32(0..map.height() as i32),
    }
}

/// Deterministic order generator shared by every simulated client.
#[derive(Clone, Debug)]
pub struct OrderStream {
    rng: SimRng,
    units: usize,
    players: u8,
    width: i32,
    height: i32,
}

impl OrderStream {
    pub fn new(config: &ScenarioConfig) -> Self {
        Self {
            rng: SimRng::seed_from_u64(config.seed ^ 0x0bad_5eed),
            units: (config.units_per_player as usize) * usize::from(config.players.max(1)),
            players: config.players.max(1),
            width: config.width as i32,
            height: config.height as i32,
        }
    }

    pub fn next_orders(&mut self) -> Vec<Order> {
        const DIRECTIONS: [(i32, i32); 8] = [
            (1, 0),
            (1, 1),
            (0, 1),
            (-1, 1),
            (-1, 0),
            (-1, -1),
            (0, -1),
            (1, -1),
        ];

        let mut orders = Vec::new();
        if self.units > 0 {
            let moves = self.units.div_ceil(3);
            for _ in 0..moves {
                let unit = self.rng.gen_range_i32(0..self.units as i32) as usize;
                let (dx, dy) = DIRECTIONS[self.rng.gen_range_i32(0..8) as usize];
                orders.push(Order::Move { unit, dx, dy });
            }
        }

        let player = self.rng.gen_range_i32(0..i32::from(self.players)) as u8;
        if self.rng.one_in(40) {
            let at = CPos::new(
                self.rng.gen_range_i32(0..self.width),
                self.rng.gen_range_i32(0..self.height),
            );
            orders.push(Order::DeployGapGenerator { owner: player, at });
        }
        if self.rng.one_in(120) {
            orders.push(Order::RemoveGapGenerator { owner: player });
        }
        if self.rng.one_in(150) {
            let to = self.rng.gen_range_i32(0..i32::from(self.players)) as u8;
            orders.push(Order::ShareExploration { from: player, to });
        }
        if self.rng.one_in(200) {
            let disabled = self.rng.one_in(2);
            orders.push(Order::SetShroudDisabled { player, disabled });
        }
        if self.rng.one_in(400) {
            orders.push(Order::ResetExploration { player });
        }
        orders
    }
}
