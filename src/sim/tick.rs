//! Per-tick simulation pipeline
//!
//! One `tick` advances the whole registry in a fixed stage order:
//! movement and rig animation, contagion spread, lifecycle timers and
//! detonations, combo bookkeeping, then eviction of Removed entities.
//! Stage order is part of the determinism contract; callers must not
//! depend on intra-stage side effects.

use glam::Vec2;

use crate::consts::*;
use crate::{angle_to_dir, normalize_angle};

use super::rig::TENDRIL_THICKNESS;
use super::segment::distance_to_segment;
use super::state::{EntityId, EntityVariant, LifeState, SimEvent, SimState};

/// Per-tick external input.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    /// Protagonist position; every pursuer homes on this
    pub target_pos: Vec2,
}

/// Advance the simulation by `dt` seconds.
///
/// Call at a fixed rate ([`SIM_DT`]) with the same input sequence to
/// reproduce a run bit-for-bit from the same seed.
pub fn tick(state: &mut SimState, input: &TickInput, dt: f32) {
    if state.game_over {
        return;
    }
    state.time += dt;

    move_entities(state, input, dt);
    spread_contagion(state);
    advance_lifecycles(state, input, dt);
    settle_combos(state, dt);
    evict_removed(state);
}

/// Movement, separation, rig animation and contact kill checks for every
/// Active entity.
fn move_entities(state: &mut SimState, input: &TickInput, dt: f32) {
    // Position snapshot so separation reads consistent peer positions
    // regardless of update order within the tick. Igniting and Expiring
    // bodies still take up space.
    let snapshot: Vec<(EntityId, Vec2)> = state
        .entities
        .iter()
        .filter(|e| e.is_alive())
        .map(|e| (e.id, e.pos))
        .collect();

    let mut protagonist_hit = false;

    for entity in state.entities.iter_mut() {
        if !entity.is_active() {
            continue;
        }

        if entity.freeze_clock > 0.0 {
            entity.freeze_clock = (entity.freeze_clock - dt).max(0.0);
            if entity.freeze_clock == 0.0 {
                // The difficulty ramp only affects future spawns; a thawed
                // entity resumes its own base rate.
                entity.speed = entity.base_speed;
            }
        }

        let mut step = Vec2::ZERO;
        let to_target = input.target_pos - entity.pos;
        if to_target.length_squared() > 1e-8 {
            step += to_target.normalize() * entity.speed;
        }

        // Tendril carriers wade straight through the pack; everything else
        // shoulders its neighbors aside.
        if entity.variant != EntityVariant::Tendril {
            for &(other_id, other_pos) in &snapshot {
                if other_id == entity.id {
                    continue;
                }
                let away = entity.pos - other_pos;
                let dist = away.length();
                if dist < SEPARATION_RADIUS && dist > 1e-4 {
                    step += (away / dist) * entity.speed;
                }
            }
        }

        entity.pos += step * dt;

        let pos = entity.pos;
        if let Some(rig) = entity.rig.as_mut() {
            rig.update(dt, pos, input.target_pos);
        }

        // Contact kill surfaces. Tendril carriers kill through their rig
        // segments only, never through body contact.
        if entity.variant != EntityVariant::Tendril
            && pos.distance(input.target_pos) < CONTACT_RADIUS
        {
            protagonist_hit = true;
        }
        if entity.variant == EntityVariant::Tendril {
            if let Some(rig) = entity.rig.as_ref() {
                if rig.touches(pos, input.target_pos, TENDRIL_THICKNESS) {
                    protagonist_hit = true;
                }
            }
        }
    }

    if protagonist_hit {
        state.trigger_game_over();
    }
}

/// Igniting entities ignite Active neighbors strictly within
/// [`INFECTION_RADIUS`]. Sources are snapshotted first so an entity
/// ignited this tick never spreads until the next.
fn spread_contagion(state: &mut SimState) {
    let sources: Vec<Vec2> = state
        .entities
        .iter()
        .filter(|e| e.state == LifeState::Igniting)
        .map(|e| e.pos)
        .collect();
    if sources.is_empty() {
        return;
    }

    let caught: Vec<EntityId> = state
        .entities
        .iter()
        .filter(|e| {
            e.is_active() && sources.iter().any(|&s| s.distance(e.pos) < INFECTION_RADIUS)
        })
        .map(|e| e.id)
        .collect();

    for id in caught {
        state.ignite(id);
    }
}

/// Run down the ignition and fade timers, then resolve any blasts queued
/// by explosive variants entering Expiring.
fn advance_lifecycles(state: &mut SimState, input: &TickInput, dt: f32) {
    let mut to_expire = Vec::new();
    let mut removed_events = Vec::new();

    for (idx, entity) in state.entities.iter_mut().enumerate() {
        match entity.state {
            LifeState::Igniting => {
                entity.ignition_clock = (entity.ignition_clock - dt).max(0.0);
                if entity.ignition_clock == 0.0 {
                    to_expire.push(idx);
                }
            }
            LifeState::Expiring => {
                entity.expiry_clock = (entity.expiry_clock - dt).max(0.0);
                if entity.expiry_clock == 0.0 {
                    entity.state = LifeState::Removed;
                    removed_events.push(SimEvent::EntityRemoved {
                        id: entity.id,
                        pos: entity.pos,
                    });
                }
            }
            _ => {}
        }
    }

    for idx in to_expire {
        // The contagious window was the fuse; the blast resolves now.
        state.enter_expiring(idx, 0.0);
    }
    for event in removed_events {
        state.push_event(event);
    }

    let mut due = Vec::new();
    state.pending_detonations.retain_mut(|(id, fuse)| {
        *fuse -= dt;
        if *fuse <= 0.0 {
            due.push(*id);
            false
        } else {
            true
        }
    });
    for id in due {
        if let Some(center) = state.get(id).map(|e| e.pos) {
            detonate(state, center, input.target_pos);
        }
    }
}

/// Resolve one explosive blast: ignite ordinary entities in radius, chip
/// elites, and kill the protagonist if caught in it.
fn detonate(state: &mut SimState, center: Vec2, target_pos: Vec2) {
    log::debug!("detonation at {:?}", center);

    let mut ignite_ids = Vec::new();
    let mut damage_ids = Vec::new();
    for entity in state.entities.iter().filter(|e| e.is_active()) {
        if entity.pos.distance(center) <= EXPLOSION_RADIUS {
            match entity.variant {
                EntityVariant::Elite => damage_ids.push(entity.id),
                _ => ignite_ids.push(entity.id),
            }
        }
    }
    for id in ignite_ids {
        state.ignite(id);
    }
    for id in damage_ids {
        state.damage(id, EXPLOSION_ELITE_DAMAGE);
    }

    if center.distance(target_pos) <= EXPLOSION_RADIUS {
        state.trigger_game_over();
    }
}

/// Feed fresh ignitions to the combo ledger and pay out any chains that
/// aged out this tick.
fn settle_combos(state: &mut SimState, dt: f32) {
    let ignited = std::mem::take(&mut state.newly_ignited);
    let now = state.time;
    for (id, pos) in ignited {
        state.combos.record_ignition(id, pos, now);
    }

    for combo in state.combos.advance(dt, now) {
        state.award(combo.count, combo.count);
        state.push_event(SimEvent::ComboDisplay {
            count: combo.count,
            pos: combo.anchor_pos,
        });
    }
}

/// Drop Removed entities from the registry and from any open combo chain,
/// then restore sorted-by-id order.
fn evict_removed(state: &mut SimState) {
    let removed: Vec<EntityId> = state
        .entities
        .iter()
        .filter(|e| e.state == LifeState::Removed)
        .map(|e| e.id)
        .collect();
    if removed.is_empty() {
        return;
    }
    for id in &removed {
        state.combos.prune_member(*id);
    }
    state.entities.retain(|e| e.state != LifeState::Removed);
    state.normalize_order();
}

/// Instant-kill sweep: everything within [`MELEE_HIT_RADIUS`] of the
/// weapon tip dies immediately, bypassing the contagious window. The tip
/// check is a degenerate one-point segment test.
pub fn melee_sweep(state: &mut SimState, origin: Vec2, aim_angle: f32) -> Vec<EntityId> {
    let tip = origin + angle_to_dir(normalize_angle(aim_angle)) * MELEE_REACH;
    let hits: Vec<EntityId> = state
        .entities
        .iter()
        .filter(|e| e.is_active() && distance_to_segment(e.pos, tip, tip) <= MELEE_HIT_RADIUS)
        .map(|e| e.id)
        .collect();
    for &id in &hits {
        state.kill_direct(id);
    }
    hits
}
