//! Simulation state and core entity types
//!
//! All state that must be persisted for save/restore and determinism lives
//! here. `SimState` is the single mutable owner: only the tick pipeline and
//! the explicit combat entry points (`ignite`, `kill_direct`, `freeze`,
//! `damage`) mutate entities. External collaborators get read-only
//! iteration and drained events.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;

use super::combo::ComboLedger;
use super::rig::AppendageRig;

/// Stable entity identifier, unique for the lifetime of a `SimState`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EntityId(pub u32);

/// Behavioral variant of a hostile entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityVariant {
    /// Plain pursuer; body contact kills the protagonist
    Basic,
    /// Detonates on entering Expiring, re-igniting nearby entities
    Explosive,
    /// Slow pursuer whose sway-rig segments are the kill surface
    Tendril,
    /// Large stat budget, stepping legs, damaged incrementally
    Elite,
}

/// Lifecycle state machine. Only ever advances forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum LifeState {
    Active,
    /// Contagious burning window; spreads to nearby Active entities
    Igniting,
    /// Fading out; inert but still present for this many more seconds
    Expiring,
    /// Evicted from the registry at the end of the tick
    Removed,
}

/// One hostile actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub pos: Vec2,
    /// Current movement rate; zeroed while frozen or hazarded
    pub speed: f32,
    /// Rate restored when a freeze wears off
    pub base_speed: f32,
    pub variant: EntityVariant,
    pub state: LifeState,
    /// Seconds of contagious window remaining (Igniting only)
    pub ignition_clock: f32,
    /// Seconds until removal (Expiring only)
    pub expiry_clock: f32,
    /// Seconds of immobility remaining; 0 when not frozen
    pub freeze_clock: f32,
    /// Procedural skeleton; None for variants without appendages
    pub rig: Option<AppendageRig>,
    /// Hit points; 1 for variants killed by any hit
    pub health: u32,
}

impl Entity {
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.state != LifeState::Removed
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == LifeState::Active
    }
}

/// Events emitted for the score/UI/effects collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    ScoreDelta(u32),
    CurrencyDelta(u32),
    ComboDisplay { count: u32, pos: Vec2 },
    EntityRemoved { id: EntityId, pos: Vec2 },
    GameOver,
}

/// The only caller-visible failure in this core.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpawnError {
    #[error("spawn position is not finite")]
    InvalidSpawn,
}

/// Complete simulation state (deterministic, serializable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimState {
    /// Run seed for reproducibility
    pub seed: u64,
    rng: Pcg32,
    /// Simulation clock, seconds
    pub time: f32,
    pub game_over: bool,
    /// Running totals mirrored by the emitted delta events
    pub score: u64,
    pub currency: u64,
    /// Direct kills since the last difficulty step
    pub kill_count: u32,
    /// Speed added to newly spawned pursuers by the difficulty ramp
    pub speed_bonus: f32,
    /// Live entities (sorted by id for determinism)
    pub entities: Vec<Entity>,
    pub combos: ComboLedger,
    /// Entities that transitioned to Igniting since the last combo pass
    pub(super) newly_ignited: Vec<(EntityId, Vec2)>,
    /// Explosives that died and still owe a blast, with seconds left on
    /// the fuse
    pub(super) pending_detonations: Vec<(EntityId, f32)>,
    #[serde(skip)]
    events: Vec<SimEvent>,
    next_id: u32,
}

impl SimState {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            time: 0.0,
            game_over: false,
            score: 0,
            currency: 0,
            kill_count: 0,
            speed_bonus: 0.0,
            entities: Vec::new(),
            combos: ComboLedger::default(),
            newly_ignited: Vec::new(),
            pending_detonations: Vec::new(),
            events: Vec::new(),
            next_id: 1,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert a new Active entity. Rejects non-finite positions at the
    /// boundary; nothing malformed ever enters the registry.
    pub fn spawn(&mut self, pos: Vec2, variant: EntityVariant) -> Result<EntityId, SpawnError> {
        if !pos.is_finite() {
            return Err(SpawnError::InvalidSpawn);
        }

        let base_speed = match variant {
            EntityVariant::Basic => BASE_SPEED + self.speed_bonus,
            EntityVariant::Explosive => EXPLOSIVE_SPEED + self.speed_bonus,
            EntityVariant::Tendril => BASE_SPEED,
            EntityVariant::Elite => ELITE_SPEED,
        };
        let rig = match variant {
            EntityVariant::Tendril => Some(AppendageRig::sway(&mut self.rng)),
            EntityVariant::Elite => Some(AppendageRig::stepping()),
            _ => None,
        };
        let health = match variant {
            EntityVariant::Elite => ELITE_MAX_HEALTH,
            _ => 1,
        };

        let id = self.next_entity_id();
        self.entities.push(Entity {
            id,
            pos,
            speed: base_speed,
            base_speed,
            variant,
            state: LifeState::Active,
            ignition_clock: 0.0,
            expiry_clock: 0.0,
            freeze_clock: 0.0,
            rig,
            health,
        });
        Ok(id)
    }

    /// Spawn just outside a rectangular view of the given half extents:
    /// a random edge, a random position along it, 10% explosive.
    pub fn spawn_perimeter(&mut self, half_extents: Vec2) -> Result<EntityId, SpawnError> {
        const SPAWN_MARGIN: f32 = 2.0;

        let edge = self.rng.random_range(0..4u8);
        let pos = match edge {
            0 => Vec2::new(
                self.rng.random_range(-half_extents.x..half_extents.x),
                half_extents.y + SPAWN_MARGIN,
            ),
            1 => Vec2::new(
                half_extents.x + SPAWN_MARGIN,
                self.rng.random_range(-half_extents.y..half_extents.y),
            ),
            2 => Vec2::new(
                self.rng.random_range(-half_extents.x..half_extents.x),
                -half_extents.y - SPAWN_MARGIN,
            ),
            _ => Vec2::new(
                -half_extents.x - SPAWN_MARGIN,
                self.rng.random_range(-half_extents.y..half_extents.y),
            ),
        };

        let variant = if self.rng.random::<f32>() < 0.1 {
            EntityVariant::Explosive
        } else {
            EntityVariant::Basic
        };
        self.spawn(pos, variant)
    }

    /// Active → Igniting. No-op for any other state (idempotent).
    pub fn ignite(&mut self, id: EntityId) {
        let Some(entity) = self.entities.iter_mut().find(|e| e.id == id) else {
            return;
        };
        if entity.state != LifeState::Active {
            return;
        }
        entity.state = LifeState::Igniting;
        entity.ignition_clock = IGNITE_DURATION;
        entity.speed = 0.0;
        self.newly_ignited.push((id, entity.pos));
    }

    /// Active → Expiring, bypassing the contagious window. Used by
    /// instant-kill weapons. Scores immediately as a single kill.
    pub fn kill_direct(&mut self, id: EntityId) {
        let Some(idx) = self.entities.iter().position(|e| e.id == id) else {
            return;
        };
        if self.entities[idx].state != LifeState::Active {
            return;
        }
        self.enter_expiring(idx, DETONATION_FUSE);
        self.award(1, 1);
        self.register_kill();
    }

    /// Apply incremental damage. Elites lose health and die at zero; any
    /// other alive variant dies from any amount.
    pub fn damage(&mut self, id: EntityId, amount: u32) {
        let Some(idx) = self.entities.iter().position(|e| e.id == id) else {
            return;
        };
        let entity = &mut self.entities[idx];
        if entity.state != LifeState::Active {
            return;
        }
        match entity.variant {
            EntityVariant::Elite => {
                entity.health = entity.health.saturating_sub(amount);
                log::debug!("elite {:?} took {} damage, {} left", id, amount, entity.health);
                if entity.health == 0 {
                    self.enter_expiring(idx, DETONATION_FUSE);
                    self.award(1, 1);
                    self.register_kill();
                }
            }
            _ => self.kill_direct(id),
        }
    }

    /// Zero the entity's speed for [`FREEZE_DURATION`]. Not a lifecycle
    /// transition; the state stays Active.
    pub fn freeze(&mut self, id: EntityId) {
        if let Some(entity) = self
            .entities
            .iter_mut()
            .find(|e| e.id == id && e.is_active())
        {
            entity.freeze_clock = FREEZE_DURATION;
            entity.speed = 0.0;
        }
    }

    /// Shared Expiring entry: starts the fade timer and queues the blast
    /// for explosive variants. `blast_delay` is the fuse: zero when the
    /// contagious window already supplied the delay, [`DETONATION_FUSE`]
    /// for direct kills.
    pub(super) fn enter_expiring(&mut self, idx: usize, blast_delay: f32) {
        let entity = &mut self.entities[idx];
        entity.state = LifeState::Expiring;
        entity.expiry_clock = FADE_DURATION;
        entity.speed = 0.0;
        if entity.variant == EntityVariant::Explosive {
            self.pending_detonations.push((entity.id, blast_delay));
        }
    }

    /// Read-only iteration over everything not yet Removed, for rendering
    /// and other collaborators.
    pub fn for_each_alive<F: FnMut(&Entity)>(&self, mut f: F) {
        for entity in self.entities.iter().filter(|e| e.is_alive()) {
            f(entity);
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn alive_count(&self) -> usize {
        self.entities.iter().filter(|e| e.is_alive()).count()
    }

    /// Take all events emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub(super) fn push_event(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Bump the running totals and emit the matching delta events.
    pub(super) fn award(&mut self, score: u32, currency: u32) {
        self.score += u64::from(score);
        self.currency += u64::from(currency);
        self.events.push(SimEvent::ScoreDelta(score));
        self.events.push(SimEvent::CurrencyDelta(currency));
    }

    /// Count a kill toward the difficulty ramp.
    pub(super) fn register_kill(&mut self) {
        self.kill_count += 1;
        if self.kill_count >= KILLS_PER_RAMP {
            self.kill_count = 0;
            self.speed_bonus += SPEED_RAMP;
            log::info!("difficulty up: spawn speed bonus now {}", self.speed_bonus);
        }
    }

    /// Latch game over exactly once.
    pub(super) fn trigger_game_over(&mut self) {
        if !self.game_over {
            self.game_over = true;
            self.events.push(SimEvent::GameOver);
            log::info!("game over at t={:.2}", self.time);
        }
    }

    /// Ensure entities are sorted by ID for deterministic iteration
    pub fn normalize_order(&mut self) {
        self.entities.sort_by_key(|e| e.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_rejects_non_finite() {
        let mut state = SimState::new(1);
        assert_eq!(
            state.spawn(Vec2::new(f32::NAN, 0.0), EntityVariant::Basic),
            Err(SpawnError::InvalidSpawn)
        );
        assert_eq!(
            state.spawn(Vec2::new(0.0, f32::INFINITY), EntityVariant::Basic),
            Err(SpawnError::InvalidSpawn)
        );
        assert_eq!(state.alive_count(), 0);
    }

    #[test]
    fn test_spawn_ids_are_unique_and_monotonic() {
        let mut state = SimState::new(1);
        let a = state.spawn(Vec2::ZERO, EntityVariant::Basic).unwrap();
        let b = state.spawn(Vec2::ONE, EntityVariant::Basic).unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_ignite_is_idempotent() {
        let mut state = SimState::new(1);
        let id = state.spawn(Vec2::ZERO, EntityVariant::Basic).unwrap();
        state.ignite(id);
        let clock = state.get(id).unwrap().ignition_clock;
        assert_eq!(state.get(id).unwrap().state, LifeState::Igniting);

        state.ignite(id);
        assert_eq!(state.get(id).unwrap().ignition_clock, clock);
        // Only one combo-bookkeeping record
        assert_eq!(state.newly_ignited.len(), 1);
    }

    #[test]
    fn test_ignite_zeroes_speed() {
        let mut state = SimState::new(1);
        let id = state.spawn(Vec2::ZERO, EntityVariant::Basic).unwrap();
        state.ignite(id);
        assert_eq!(state.get(id).unwrap().speed, 0.0);
    }

    #[test]
    fn test_kill_direct_skips_contagious_window() {
        let mut state = SimState::new(1);
        let id = state.spawn(Vec2::ZERO, EntityVariant::Basic).unwrap();
        state.kill_direct(id);
        let entity = state.get(id).unwrap();
        assert_eq!(entity.state, LifeState::Expiring);
        assert_eq!(entity.expiry_clock, crate::consts::FADE_DURATION);
        let events = state.drain_events();
        assert!(events.contains(&SimEvent::ScoreDelta(1)));
        assert!(events.contains(&SimEvent::CurrencyDelta(1)));
    }

    #[test]
    fn test_explosive_direct_kill_arms_fuse() {
        let mut state = SimState::new(1);
        let id = state.spawn(Vec2::ZERO, EntityVariant::Explosive).unwrap();
        state.kill_direct(id);
        assert_eq!(
            state.pending_detonations,
            vec![(id, crate::consts::DETONATION_FUSE)]
        );
    }

    #[test]
    fn test_kill_direct_on_igniting_is_noop() {
        let mut state = SimState::new(1);
        let id = state.spawn(Vec2::ZERO, EntityVariant::Basic).unwrap();
        state.ignite(id);
        state.drain_events();
        state.kill_direct(id);
        assert_eq!(state.get(id).unwrap().state, LifeState::Igniting);
        assert!(state.drain_events().is_empty());
    }

    #[test]
    fn test_elite_takes_incremental_damage() {
        let mut state = SimState::new(1);
        let id = state.spawn(Vec2::ZERO, EntityVariant::Elite).unwrap();
        state.damage(id, 30);
        assert_eq!(state.get(id).unwrap().health, 70);
        assert_eq!(state.get(id).unwrap().state, LifeState::Active);
        state.damage(id, 70);
        assert_eq!(state.get(id).unwrap().state, LifeState::Expiring);
    }

    #[test]
    fn test_basic_dies_from_any_damage() {
        let mut state = SimState::new(1);
        let id = state.spawn(Vec2::ZERO, EntityVariant::Basic).unwrap();
        state.damage(id, 1);
        assert_eq!(state.get(id).unwrap().state, LifeState::Expiring);
    }

    #[test]
    fn test_freeze_zeroes_speed_without_state_change() {
        let mut state = SimState::new(1);
        let id = state.spawn(Vec2::ZERO, EntityVariant::Basic).unwrap();
        state.freeze(id);
        let entity = state.get(id).unwrap();
        assert_eq!(entity.speed, 0.0);
        assert_eq!(entity.state, LifeState::Active);
        assert_eq!(entity.freeze_clock, crate::consts::FREEZE_DURATION);
    }

    #[test]
    fn test_difficulty_ramp_after_ten_kills() {
        let mut state = SimState::new(1);
        for _ in 0..10 {
            let id = state.spawn(Vec2::ZERO, EntityVariant::Basic).unwrap();
            state.kill_direct(id);
        }
        assert_eq!(state.speed_bonus, crate::consts::SPEED_RAMP);
        // Future spawns pick up the bonus
        let id = state.spawn(Vec2::ZERO, EntityVariant::Basic).unwrap();
        let expected = crate::consts::BASE_SPEED + crate::consts::SPEED_RAMP;
        assert!((state.get(id).unwrap().base_speed - expected).abs() < 1e-6);
    }

    #[test]
    fn test_perimeter_spawn_lands_outside_extents() {
        let mut state = SimState::new(99);
        let half = Vec2::new(20.0, 15.0);
        for _ in 0..50 {
            let id = state.spawn_perimeter(half).unwrap();
            let pos = state.get(id).unwrap().pos;
            assert!(pos.x.abs() > half.x || pos.y.abs() > half.y);
        }
    }

    #[test]
    fn test_variant_rigs() {
        let mut state = SimState::new(1);
        let basic = state.spawn(Vec2::ZERO, EntityVariant::Basic).unwrap();
        let tendril = state.spawn(Vec2::ZERO, EntityVariant::Tendril).unwrap();
        let elite = state.spawn(Vec2::ZERO, EntityVariant::Elite).unwrap();
        assert!(state.get(basic).unwrap().rig.is_none());
        assert!(state.get(tendril).unwrap().rig.is_some());
        assert!(state.get(elite).unwrap().rig.is_some());
    }

    #[test]
    fn test_state_snapshot_round_trip() {
        let mut state = SimState::new(77);
        state.spawn(Vec2::new(3.0, 4.0), EntityVariant::Tendril).unwrap();
        state.spawn(Vec2::new(-2.0, 1.0), EntityVariant::Elite).unwrap();

        let json = serde_json::to_string(&state).unwrap();
        let restored: SimState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.entities.len(), state.entities.len());
        assert_eq!(restored.seed, state.seed);
        assert_eq!(restored.entities[0].pos, state.entities[0].pos);
    }
}
