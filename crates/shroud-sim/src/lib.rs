//! Deterministic multi-player harness for `shroud-core`.
//!
//! Runs the same scripted skirmish on two clients and reports the first tick at which their
//! shroud hashes or snapshot digests diverge.

pub mod lockstep;
pub mod rng;
pub mod scenario;

pub use lockstep::{run_lockstep, Desync, LockstepReport, PlayerSummary};
pub use scenario::{Order, OrderStream, ScenarioConfig, Simulation};
