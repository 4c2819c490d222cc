//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering or platform dependencies

pub mod combo;
pub mod rig;
pub mod segment;
pub mod state;
pub mod tick;

pub use combo::{ComboChain, ComboLedger};
pub use rig::{AppendageRig, RigMode, SteppingLeg, SwayTendril};
pub use segment::{distance_to_segment, point_near_segment};
pub use state::{
    Entity, EntityId, EntityVariant, LifeState, SimEvent, SimState, SpawnError,
};
pub use tick::{TickInput, melee_sweep, tick};
