//! Combo chain clustering
//!
//! Converts a burst of nearby, near-simultaneous ignitions into one combo
//! score instead of N single-point scores. A newly igniting entity joins the
//! open chain with the globally nearest member (ties broken by chain
//! creation order), or opens a new chain. A periodic finalize pass closes
//! chains older than [`COMBO_MAX_AGE`]; chains with at least two members
//! emit a score, singletons are dropped silently.
//!
//! Membership is weak: an entity removed from the registry is pruned from
//! every chain in the same tick and the chain finalizes with whoever is
//! left.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::{COMBO_FINALIZE_PERIOD, COMBO_JOIN_RADIUS, COMBO_MAX_AGE};

use super::state::EntityId;

/// An open cluster of entities ignited close together in time and space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComboChain {
    /// Member ids with their position at ignition time. Igniting entities
    /// are immobile, so the snapshot stays equal to the live position.
    pub members: Vec<(EntityId, Vec2)>,
    /// Simulation time of the first member's ignition
    pub start_time: f32,
    /// Position of the most recently added member, for display placement
    pub anchor_pos: Vec2,
}

/// A chain that aged out with enough members to score.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedCombo {
    pub count: u32,
    pub anchor_pos: Vec2,
}

/// Open chain set plus the finalize cadence clock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComboLedger {
    chains: Vec<ComboChain>,
    finalize_clock: f32,
}

impl ComboLedger {
    /// Record a fresh ignition: join the nearest qualifying chain or open a
    /// new one.
    pub fn record_ignition(&mut self, id: EntityId, pos: Vec2, now: f32) {
        let mut best: Option<(usize, f32)> = None;
        for (chain_idx, chain) in self.chains.iter().enumerate() {
            for &(_, member_pos) in &chain.members {
                let dist = member_pos.distance(pos);
                // Strictly-less keeps ties on the first-found chain
                if best.is_none_or(|(_, d)| dist < d) {
                    best = Some((chain_idx, dist));
                }
            }
        }

        match best {
            Some((chain_idx, dist)) if dist < COMBO_JOIN_RADIUS => {
                let chain = &mut self.chains[chain_idx];
                chain.members.push((id, pos));
                chain.anchor_pos = pos;
            }
            _ => {
                self.chains.push(ComboChain {
                    members: vec![(id, pos)],
                    start_time: now,
                    anchor_pos: pos,
                });
            }
        }
    }

    /// Drop a removed entity from every open chain.
    pub fn prune_member(&mut self, id: EntityId) {
        for chain in &mut self.chains {
            chain.members.retain(|&(member_id, _)| member_id != id);
        }
    }

    /// Advance the finalize clock and close any aged-out chains. Runs at a
    /// fixed short period independent of entity state.
    pub fn advance(&mut self, dt: f32, now: f32) -> Vec<FinalizedCombo> {
        let mut finalized = Vec::new();
        self.finalize_clock += dt;
        while self.finalize_clock >= COMBO_FINALIZE_PERIOD {
            self.finalize_clock -= COMBO_FINALIZE_PERIOD;
            self.finalize_expired(now, &mut finalized);
        }
        finalized
    }

    fn finalize_expired(&mut self, now: f32, out: &mut Vec<FinalizedCombo>) {
        self.chains.retain(|chain| {
            if now - chain.start_time <= COMBO_MAX_AGE {
                return true;
            }
            if chain.members.len() >= 2 {
                log::debug!(
                    "combo finalized: {} kills at {:?}",
                    chain.members.len(),
                    chain.anchor_pos
                );
                out.push(FinalizedCombo {
                    count: chain.members.len() as u32,
                    anchor_pos: chain.anchor_pos,
                });
            }
            false
        });
    }

    pub fn open_chain_count(&self) -> usize {
        self.chains.len()
    }

    #[cfg(test)]
    pub(crate) fn chains(&self) -> &[ComboChain] {
        &self.chains
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> EntityId {
        EntityId(n)
    }

    /// Run enough finalize periods to age out everything started at t=0.
    fn drain(ledger: &mut ComboLedger) -> Vec<FinalizedCombo> {
        ledger.advance(COMBO_MAX_AGE + 1.0, COMBO_MAX_AGE + 1.0)
    }

    #[test]
    fn test_close_ignitions_form_one_chain() {
        let mut ledger = ComboLedger::default();
        ledger.record_ignition(id(1), Vec2::new(0.0, 0.0), 0.0);
        ledger.record_ignition(id(2), Vec2::new(0.1, 0.0), 0.1);
        ledger.record_ignition(id(3), Vec2::new(0.05, 0.05), 0.2);
        assert_eq!(ledger.open_chain_count(), 1);

        let finalized = drain(&mut ledger);
        assert_eq!(finalized.len(), 1);
        assert_eq!(finalized[0].count, 3);
        // Anchor is the last joiner's position
        assert_eq!(finalized[0].anchor_pos, Vec2::new(0.05, 0.05));
        assert_eq!(ledger.open_chain_count(), 0);
    }

    #[test]
    fn test_distant_ignitions_open_separate_chains() {
        let mut ledger = ComboLedger::default();
        ledger.record_ignition(id(1), Vec2::new(0.0, 0.0), 0.0);
        ledger.record_ignition(id(2), Vec2::new(10.0, 0.0), 0.1);
        assert_eq!(ledger.open_chain_count(), 2);
    }

    #[test]
    fn test_singleton_chain_is_silent() {
        let mut ledger = ComboLedger::default();
        ledger.record_ignition(id(1), Vec2::ZERO, 0.0);
        let finalized = drain(&mut ledger);
        assert!(finalized.is_empty());
        assert_eq!(ledger.open_chain_count(), 0);
    }

    #[test]
    fn test_join_prefers_nearest_member_of_any_chain() {
        let mut ledger = ComboLedger::default();
        // Two chains; the new ignition is nearer to the second chain's member
        ledger.record_ignition(id(1), Vec2::new(0.0, 0.0), 0.0);
        ledger.record_ignition(id(2), Vec2::new(5.0, 0.0), 0.0);
        ledger.record_ignition(id(3), Vec2::new(4.5, 0.0), 0.1);
        assert_eq!(ledger.open_chain_count(), 2);
        assert_eq!(ledger.chains()[1].members.len(), 2);
    }

    #[test]
    fn test_join_radius_is_strict() {
        let mut ledger = ComboLedger::default();
        ledger.record_ignition(id(1), Vec2::new(0.0, 0.0), 0.0);
        // Exactly at the join radius: not strictly closer, opens a new chain
        ledger.record_ignition(id(2), Vec2::new(COMBO_JOIN_RADIUS, 0.0), 0.0);
        assert_eq!(ledger.open_chain_count(), 2);
    }

    #[test]
    fn test_equal_distance_tie_goes_to_older_chain() {
        let mut ledger = ComboLedger::default();
        ledger.record_ignition(id(1), Vec2::new(-0.5, 0.0), 0.0);
        ledger.record_ignition(id(2), Vec2::new(0.5, 0.0), 0.0);
        assert_eq!(ledger.open_chain_count(), 2);
        // id 3 sits exactly 0.5 from both chains; first-found wins
        ledger.record_ignition(id(3), Vec2::new(0.0, 0.0), 0.1);
        assert_eq!(ledger.chains()[0].members.len(), 2);
        assert_eq!(ledger.chains()[1].members.len(), 1);
    }

    #[test]
    fn test_pruned_member_reduces_finalized_count() {
        let mut ledger = ComboLedger::default();
        ledger.record_ignition(id(1), Vec2::new(0.0, 0.0), 0.0);
        ledger.record_ignition(id(2), Vec2::new(0.2, 0.0), 0.0);
        ledger.record_ignition(id(3), Vec2::new(0.4, 0.0), 0.0);
        ledger.prune_member(id(2));

        let finalized = drain(&mut ledger);
        assert_eq!(finalized.len(), 1);
        assert_eq!(finalized[0].count, 2);
    }

    #[test]
    fn test_pruning_below_two_silences_chain() {
        let mut ledger = ComboLedger::default();
        ledger.record_ignition(id(1), Vec2::new(0.0, 0.0), 0.0);
        ledger.record_ignition(id(2), Vec2::new(0.2, 0.0), 0.0);
        ledger.prune_member(id(1));
        assert!(drain(&mut ledger).is_empty());
    }

    #[test]
    fn test_chain_survives_until_max_age() {
        let mut ledger = ComboLedger::default();
        ledger.record_ignition(id(1), Vec2::ZERO, 0.0);
        ledger.record_ignition(id(2), Vec2::new(0.1, 0.0), 0.0);
        // Not yet aged out
        let finalized = ledger.advance(COMBO_MAX_AGE - 0.5, COMBO_MAX_AGE - 0.5);
        assert!(finalized.is_empty());
        assert_eq!(ledger.open_chain_count(), 1);
        // Past the cap
        let finalized = ledger.advance(1.0, COMBO_MAX_AGE + 0.5);
        assert_eq!(finalized.len(), 1);
    }

    #[test]
    fn test_finalize_cadence_is_quantized() {
        let mut ledger = ComboLedger::default();
        ledger.record_ignition(id(1), Vec2::ZERO, 0.0);
        ledger.record_ignition(id(2), Vec2::new(0.1, 0.0), 0.0);
        // Advance past the age cap in steps smaller than the finalize period:
        // nothing fires until a period boundary accumulates
        let mut finalized = Vec::new();
        let mut now = COMBO_MAX_AGE + 0.01;
        for _ in 0..10 {
            finalized.extend(ledger.advance(0.02, now));
            now += 0.02;
        }
        assert_eq!(finalized.len(), 1);
    }
}
