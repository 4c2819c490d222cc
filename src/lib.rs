//! Horde Sim - hostile-entity simulation core for a top-down arena game
//!
//! Everything gameplay-visible lives in `sim`: the entity registry and
//! lifecycle state machine, proximity contagion, combo-chain scoring, and
//! the procedural appendage rigs used for locomotion and hit detection.
//! Rendering, audio and input are external collaborators; this crate only
//! emits events for them to consume.

pub mod sim;

pub use sim::{
    Entity, EntityId, EntityVariant, LifeState, SimEvent, SimState, SpawnError, TickInput,
    melee_sweep, tick,
};

use glam::Vec2;

/// Game tuning constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// Contagion spread radius (world units)
    pub const INFECTION_RADIUS: f32 = 1.0;
    /// Seconds an igniting entity stays contagious before it starts expiring
    pub const IGNITE_DURATION: f32 = 2.0;
    /// Seconds an expiring entity lingers before removal
    pub const FADE_DURATION: f32 = 4.0;
    /// Seconds a frozen entity stays immobile
    pub const FREEZE_DURATION: f32 = 3.0;

    /// Blast radius for explosive variants
    pub const EXPLOSION_RADIUS: f32 = 4.3;
    /// Damage an elite takes from a blast instead of dying outright
    pub const EXPLOSION_ELITE_DAMAGE: u32 = 20;
    /// Seconds between an explosive's direct kill and its blast
    pub const DETONATION_FUSE: f32 = 2.0;

    /// Body-contact kill distance against the protagonist
    pub const CONTACT_RADIUS: f32 = 1.0;
    /// Entities closer than this push each other apart
    pub const SEPARATION_RADIUS: f32 = 1.0;

    /// Movement rates (world units per second)
    pub const BASE_SPEED: f32 = 1.2;
    pub const EXPLOSIVE_SPEED: f32 = 0.9;
    pub const ELITE_SPEED: f32 = 0.54;
    /// Speed gained by future spawns per difficulty step
    pub const SPEED_RAMP: f32 = 0.3;
    /// Kills needed to trigger a difficulty step
    pub const KILLS_PER_RAMP: u32 = 10;

    /// Elite defaults
    pub const ELITE_MAX_HEALTH: u32 = 100;

    /// Combo clustering
    pub const COMBO_JOIN_RADIUS: f32 = 1.0;
    pub const COMBO_MAX_AGE: f32 = 3.0;
    pub const COMBO_FINALIZE_PERIOD: f32 = 0.1;

    /// Melee sweep
    pub const MELEE_REACH: f32 = 1.5;
    pub const MELEE_HIT_RADIUS: f32 = 0.5;
}

/// Normalize angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Linear interpolation
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Unit vector for an angle
#[inline]
pub fn angle_to_dir(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}
