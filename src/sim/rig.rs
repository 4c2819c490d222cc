//! Procedural appendage rigs
//!
//! One articulated-chain animator, two modes:
//!
//! - `Stepping`: discrete foot placement for multi-legged locomotion. Each
//!   leg keeps a planted target point and takes a step (with a sine lift
//!   arc) whenever its computed tip drifts too far from that target.
//! - `Sway`: continuous phase-driven oscillation for tendril appendages.
//!   Each segment's angle wobbles around the bearing toward the pursuit
//!   target, with per-tendril random phase and amplitude factors.
//!
//! Both modes expose the same `segment_endpoints` query, consumed by the
//! renderer and by segment hit-testing. A rig is only updated while its
//! owner is active; afterwards the last pose stays queryable.

use std::f32::consts::{PI, TAU};

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{angle_to_dir, lerp};

use super::segment::point_near_segment;

/// Tendril segment count (shoulder to claw tip)
pub const TENDRIL_SEGMENTS: usize = 8;
/// Segment lengths as fractions of [`TENDRIL_LENGTH_SCALE`]
pub const TENDRIL_SEGMENT_FRACTIONS: [f32; TENDRIL_SEGMENTS] =
    [0.3, 0.2, 0.6, 0.4, 0.5, 0.4, 0.2, 0.1];
/// Oscillation amplitude per segment
pub const TENDRIL_SEGMENT_AMPLITUDES: [f32; TENDRIL_SEGMENTS] = [
    PI / 12.0,
    PI / 16.0,
    PI / 10.0,
    PI / 8.0,
    PI / 6.0,
    PI / 8.0,
    PI / 12.0,
    PI / 16.0,
];
/// Phase lag per segment, producing the trailing-whip look
pub const TENDRIL_SEGMENT_PHASES: [f32; TENDRIL_SEGMENTS] = [
    0.0,
    PI / 8.0,
    PI / 4.0,
    PI / 3.0,
    PI / 2.0,
    3.0 * PI / 4.0,
    PI,
    5.0 * PI / 4.0,
];

/// Base length scale for tendril segments
pub const TENDRIL_LENGTH_SCALE: f32 = 1.5;
/// Tendril hit thickness
pub const TENDRIL_THICKNESS: f32 = 0.1;
/// Tendrils per body side
pub const TENDRILS_PER_SIDE: usize = 3;
/// Phase advance in radians per second
pub const TENDRIL_PHASE_RATE: f32 = 6.0;
/// Extra phase lag between neighboring tendrils
pub const TENDRIL_PHASE_LAG: f32 = PI / 3.0;
/// Half width of the owner body; tendrils root at the body edge
pub const BODY_HALF_WIDTH: f32 = 0.5;

/// Elite stepping-leg parameters
pub const STEPPING_LEG_COUNT: usize = 6;
pub const STEPPING_LEG_LENGTH: f32 = 1.5;
/// Total angular spread of the leg fan around the pursuit bearing
pub const STEPPING_LEG_SPREAD: f32 = PI;
/// Step progress per second (a full step takes 1/6 s)
pub const STEPPING_RATE: f32 = 6.0;
/// Vertical lift at the top of a step arc
pub const STEPPING_LIFT: f32 = 0.2;

/// One oscillating tendril: fixed layout plus random animation factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwayTendril {
    /// -1.0 for the left body edge, 1.0 for the right
    pub side: f32,
    /// Slot index along the body edge (0..TENDRILS_PER_SIDE)
    pub index: usize,
    /// Random phase shift in [0, 2π)
    pub phase_shift: f32,
    /// Random amplitude factor in [0.9, 1.1)
    pub amplitude_variation: f32,
}

/// One locomotion leg with a planted foot target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteppingLeg {
    /// Rest direction within the fan around the pursuit bearing
    pub base_angle: f32,
    /// Current direction from body to foot
    pub angle: f32,
    /// Planted foot position (world space)
    pub target: Vec2,
    /// Body-to-foot length, clamped to [`STEPPING_LEG_LENGTH`]
    pub current_length: f32,
    /// 0..1 while a step is in flight
    pub step_progress: f32,
    pub stepping: bool,
}

/// Animation mode, chosen at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RigMode {
    Stepping { legs: Vec<SteppingLeg> },
    Sway { phase: f32, tendrils: Vec<SwayTendril> },
}

/// Per-entity procedural skeleton.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendageRig {
    /// Bearing toward the pursuit target. Freezes at its last value once
    /// the owner stops updating the rig (e.g. on death).
    pub anchor_angle: f32,
    pub mode: RigMode,
}

impl AppendageRig {
    /// Build a sway rig with randomized per-tendril animation factors.
    pub fn sway<R: Rng>(rng: &mut R) -> Self {
        let mut tendrils = Vec::with_capacity(TENDRILS_PER_SIDE * 2);
        for side in [-1.0f32, 1.0] {
            for index in 0..TENDRILS_PER_SIDE {
                tendrils.push(SwayTendril {
                    side,
                    index,
                    phase_shift: rng.random_range(0.0..TAU),
                    amplitude_variation: rng.random_range(0.9..1.1),
                });
            }
        }
        Self {
            anchor_angle: 0.0,
            mode: RigMode::Sway {
                phase: 0.0,
                tendrils,
            },
        }
    }

    /// Build a stepping rig. The leg fan is planted on the first `update`,
    /// once the live pursuit bearing is known.
    pub fn stepping() -> Self {
        Self {
            anchor_angle: 0.0,
            mode: RigMode::Stepping { legs: Vec::new() },
        }
    }

    /// Advance the animation one tick. Only called while the owner is
    /// Active; the pose freezes (but stays queryable) afterwards.
    pub fn update(&mut self, dt: f32, owner_pos: Vec2, target_pos: Vec2) {
        let to_target = target_pos - owner_pos;
        if to_target.length_squared() > 1e-8 {
            self.anchor_angle = to_target.y.atan2(to_target.x);
        }

        match &mut self.mode {
            RigMode::Sway { phase, .. } => {
                *phase += TENDRIL_PHASE_RATE * dt;
            }
            RigMode::Stepping { legs } => {
                let between = STEPPING_LEG_SPREAD / (STEPPING_LEG_COUNT - 1) as f32;
                if legs.is_empty() {
                    // First update: plant every foot at its rest point
                    // around the current bearing.
                    *legs = (0..STEPPING_LEG_COUNT)
                        .map(|i| {
                            let leg_angle = self.anchor_angle - STEPPING_LEG_SPREAD / 2.0
                                + i as f32 * between;
                            SteppingLeg {
                                base_angle: leg_angle,
                                angle: leg_angle,
                                target: owner_pos + angle_to_dir(leg_angle) * STEPPING_LEG_LENGTH,
                                current_length: STEPPING_LEG_LENGTH,
                                step_progress: 0.0,
                                stepping: false,
                            }
                        })
                        .collect();
                }
                for (i, leg) in legs.iter_mut().enumerate() {
                    // Keep the fan symmetric around the pursuit bearing
                    leg.base_angle =
                        self.anchor_angle - STEPPING_LEG_SPREAD / 2.0 + i as f32 * between;

                    if !leg.stepping {
                        let tip = owner_pos + angle_to_dir(leg.angle) * leg.current_length;
                        if (leg.target - tip).length() > STEPPING_LEG_LENGTH / 2.0 {
                            leg.stepping = true;
                            leg.step_progress = 0.0;
                        }
                    }

                    if leg.stepping {
                        leg.step_progress += STEPPING_RATE * dt;
                        if leg.step_progress >= 1.0 {
                            leg.step_progress = 1.0;
                            leg.stepping = false;
                        }

                        let plant = owner_pos + angle_to_dir(leg.base_angle) * STEPPING_LEG_LENGTH;
                        let lift = (leg.step_progress * PI).sin() * STEPPING_LIFT;
                        leg.target.x = lerp(leg.target.x, plant.x, leg.step_progress);
                        leg.target.y = lerp(leg.target.y, plant.y - lift, leg.step_progress);
                    }

                    // IK: aim at the planted foot, clamp the reach
                    let d = leg.target - owner_pos;
                    leg.current_length = d.length().min(STEPPING_LEG_LENGTH);
                    leg.angle = d.y.atan2(d.x);
                }
            }
        }
    }

    /// Segment endpoints in world space, ordered root-to-tip per appendage.
    pub fn segment_endpoints(&self, owner_pos: Vec2) -> Vec<(Vec2, Vec2)> {
        match &self.mode {
            RigMode::Stepping { legs } => legs
                .iter()
                .map(|leg| {
                    (
                        owner_pos,
                        owner_pos + angle_to_dir(leg.angle) * leg.current_length,
                    )
                })
                .collect(),
            RigMode::Sway { phase, tendrils } => {
                let mut out = Vec::with_capacity(tendrils.len() * TENDRIL_SEGMENTS);
                for tendril in tendrils {
                    let root = owner_pos
                        + Vec2::new(
                            (BODY_HALF_WIDTH + TENDRIL_THICKNESS / 2.0) * tendril.side,
                            (tendril.index as f32 - (TENDRILS_PER_SIDE - 1) as f32 / 2.0)
                                / TENDRILS_PER_SIDE as f32,
                        );
                    let t = phase + tendril.index as f32 * TENDRIL_PHASE_LAG + tendril.phase_shift;

                    let mut current = root;
                    for seg in 0..TENDRIL_SEGMENTS {
                        let angle = self.anchor_angle
                            + (t + TENDRIL_SEGMENT_PHASES[seg]).sin()
                                * TENDRIL_SEGMENT_AMPLITUDES[seg]
                                * tendril.side
                                * tendril.amplitude_variation;
                        let next = current
                            + angle_to_dir(angle)
                                * (TENDRIL_LENGTH_SCALE * TENDRIL_SEGMENT_FRACTIONS[seg]);
                        out.push((current, next));
                        current = next;
                    }
                }
                out
            }
        }
    }

    /// Whether any segment passes within `radius` of `point`.
    pub fn touches(&self, owner_pos: Vec2, point: Vec2, radius: f32) -> bool {
        self.segment_endpoints(owner_pos)
            .iter()
            .any(|&(start, end)| point_near_segment(point, start, end, radius))
    }
}
