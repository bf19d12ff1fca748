//! Per-state populations
//!
//! [`PopulationStore`] holds the ordered occupants of every state behind one
//! lock per state. Operations that touch two states take both locks in the
//! topology's global lock order (lexicographic by state name), so concurrent
//! transitions can never deadlock.
//!
//! The global `admitted` and `removed` counters only change while the lock of
//! the state being entered or left is held. Taking every lock therefore gives
//! a view in which `admitted == total occupancy + removed` holds exactly.
//!
//! The `*_stamped` operations call a stamp closure once the locks are held, so
//! whatever it produces (an audit position, a timestamp) is ordered with the
//! change itself.

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::entity::Entity;
use crate::simulation::{SimulationError, SimulationResult};
use crate::topology::Topology;
use crate::types::{BlockReason, EntityId, StateId};

type Occupants = VecDeque<Entity>;

#[derive(Debug)]
struct Slot {
    name: String,
    capacity: usize,
    rank: usize,
    occupants: Mutex<Occupants>,
    // Mirrors occupants.len(), written under the occupants lock
    count: AtomicUsize,
}

/// Result of a guarded population change
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutcome {
    /// The change happened; carries the entity that was admitted, moved or removed
    Applied(Entity),
    /// The change was not feasible
    Blocked(BlockReason),
    /// The run phase no longer permits this change
    Refused,
}

/// Occupancy of one state at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateOccupancy {
    /// State name
    pub name: String,
    /// Number of occupants
    pub occupancy: usize,
    /// Maximum number of occupants
    pub capacity: usize,
}

/// Consistent occupancy of every state, in topology order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OccupancySnapshot {
    /// One entry per state
    pub states: Vec<StateOccupancy>,
}

impl OccupancySnapshot {
    /// Occupancy of the named state
    pub fn get(&self, name: &str) -> Option<usize> {
        self.states.iter().find(|s| s.name == name).map(|s| s.occupancy)
    }

    /// Sum of all occupancies
    pub fn total(&self) -> usize {
        self.states.iter().map(|s| s.occupancy).sum()
    }

    /// State name to occupancy
    pub fn as_map(&self) -> BTreeMap<String, usize> {
        self.states.iter().map(|s| (s.name.clone(), s.occupancy)).collect()
    }
}

impl fmt::Display for OccupancySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .states
            .iter()
            .map(|s| format!("{}: {}/{}", s.name, s.occupancy, s.capacity))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Live entities of every state plus the global admission counters
#[derive(Debug)]
pub struct PopulationStore {
    slots: Vec<Slot>,
    lock_order: Vec<usize>,
    admitted: AtomicU64,
    removed: AtomicU64,
}

impl PopulationStore {
    /// Create an empty store with one slot per topology state
    pub fn new(topology: &Topology) -> Self {
        let slots: Vec<Slot> = topology
            .states()
            .iter()
            .map(|state| Slot {
                name: state.name.clone(),
                capacity: state.capacity,
                rank: state.lock_rank,
                occupants: Mutex::new(VecDeque::with_capacity(state.capacity.min(1024))),
                count: AtomicUsize::new(0),
            })
            .collect();

        let mut lock_order: Vec<usize> = (0..slots.len()).collect();
        lock_order.sort_by_key(|index| slots[*index].rank);

        Self { slots, lock_order, admitted: AtomicU64::new(0), removed: AtomicU64::new(0) }
    }

    fn slot(&self, id: StateId) -> SimulationResult<&Slot> {
        self.slots
            .get(id.index())
            .ok_or_else(|| SimulationError::runtime_transition(format!("no population slot for {}", id)))
    }

    /// Lock two distinct states in global order; guards are returned as (first, second)
    fn lock_pair(
        &self,
        first: StateId,
        second: StateId,
    ) -> SimulationResult<(MutexGuard<'_, Occupants>, MutexGuard<'_, Occupants>)> {
        if first == second {
            return Err(SimulationError::runtime_transition(format!(
                "transition would lock {} twice",
                first
            )));
        }
        let a = self.slot(first)?;
        let b = self.slot(second)?;

        if a.rank < b.rank {
            let ga = a.occupants.lock();
            let gb = b.occupants.lock();
            Ok((ga, gb))
        } else {
            let gb = b.occupants.lock();
            let ga = a.occupants.lock();
            Ok((ga, gb))
        }
    }

    /// Admit a new entity into `target` when `permitted()` holds and there is room
    ///
    /// `create` runs only when the admission will happen.
    pub fn admit(
        &self,
        target: StateId,
        permitted: impl FnOnce() -> bool,
        create: impl FnOnce() -> Entity,
    ) -> SimulationResult<StoreOutcome> {
        self.admit_stamped(target, permitted, create, || ()).map(|(outcome, ())| outcome)
    }

    /// [`admit`](Self::admit), calling `stamp` under the lock of `target`
    pub fn admit_stamped<S>(
        &self,
        target: StateId,
        permitted: impl FnOnce() -> bool,
        create: impl FnOnce() -> Entity,
        stamp: impl FnOnce() -> S,
    ) -> SimulationResult<(StoreOutcome, S)> {
        let slot = self.slot(target)?;
        let mut occupants = slot.occupants.lock();
        let stamp = stamp();

        if !permitted() {
            return Ok((StoreOutcome::Refused, stamp));
        }
        if occupants.len() >= slot.capacity {
            return Ok((StoreOutcome::Blocked(BlockReason::TargetFull), stamp));
        }

        let entity = create();
        occupants.push_back(entity.clone());
        slot.count.store(occupants.len(), Ordering::Release);
        self.admitted.fetch_add(1, Ordering::AcqRel);
        Ok((StoreOutcome::Applied(entity), stamp))
    }

    /// Remove the oldest occupant of `source` when `permitted()` holds
    pub fn release(
        &self,
        source: StateId,
        permitted: impl FnOnce() -> bool,
    ) -> SimulationResult<StoreOutcome> {
        self.release_stamped(source, permitted, || ()).map(|(outcome, ())| outcome)
    }

    /// [`release`](Self::release), calling `stamp` under the lock of `source`
    pub fn release_stamped<S>(
        &self,
        source: StateId,
        permitted: impl FnOnce() -> bool,
        stamp: impl FnOnce() -> S,
    ) -> SimulationResult<(StoreOutcome, S)> {
        let slot = self.slot(source)?;
        let mut occupants = slot.occupants.lock();
        let stamp = stamp();

        if !permitted() {
            return Ok((StoreOutcome::Refused, stamp));
        }
        match occupants.pop_front() {
            Some(entity) => {
                slot.count.store(occupants.len(), Ordering::Release);
                self.removed.fetch_add(1, Ordering::AcqRel);
                Ok((StoreOutcome::Applied(entity), stamp))
            }
            None => Ok((StoreOutcome::Blocked(BlockReason::SourceEmpty), stamp)),
        }
    }

    /// Move the oldest occupant of `source` to the tail of `target`
    ///
    /// Exactly one entity moves per call, whatever the free capacity.
    pub fn transfer(
        &self,
        source: StateId,
        target: StateId,
        permitted: impl FnOnce() -> bool,
    ) -> SimulationResult<StoreOutcome> {
        self.transfer_stamped(source, target, permitted, || ()).map(|(outcome, ())| outcome)
    }

    /// [`transfer`](Self::transfer), calling `stamp` under both state locks
    pub fn transfer_stamped<S>(
        &self,
        source: StateId,
        target: StateId,
        permitted: impl FnOnce() -> bool,
        stamp: impl FnOnce() -> S,
    ) -> SimulationResult<(StoreOutcome, S)> {
        let (from_slot, to_slot) = (self.slot(source)?, self.slot(target)?);
        let (mut from, mut to) = self.lock_pair(source, target)?;
        let stamp = stamp();

        if !permitted() {
            return Ok((StoreOutcome::Refused, stamp));
        }
        if from.is_empty() {
            return Ok((StoreOutcome::Blocked(BlockReason::SourceEmpty), stamp));
        }
        if to.len() >= to_slot.capacity {
            return Ok((StoreOutcome::Blocked(BlockReason::TargetFull), stamp));
        }

        match from.pop_front() {
            Some(entity) => {
                to.push_back(entity.clone());
                from_slot.count.store(from.len(), Ordering::Release);
                to_slot.count.store(to.len(), Ordering::Release);
                Ok((StoreOutcome::Applied(entity), stamp))
            }
            None => Ok((StoreOutcome::Blocked(BlockReason::SourceEmpty), stamp)),
        }
    }

    /// Current occupancy of a state
    pub fn occupancy(&self, id: StateId) -> Option<usize> {
        self.slots.get(id.index()).map(|slot| slot.occupants.lock().len())
    }

    /// Identifiers of a state's occupants, oldest first
    pub fn occupants(&self, id: StateId) -> Option<Vec<EntityId>> {
        self.slots
            .get(id.index())
            .map(|slot| slot.occupants.lock().iter().map(|e| e.id).collect())
    }

    /// Total number of entities ever admitted
    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Acquire)
    }

    /// Total number of entities removed through egress
    pub fn removed(&self) -> u64 {
        self.removed.load(Ordering::Acquire)
    }

    /// Lock every state in global order
    pub fn lock_all(&self) -> LockedPopulation<'_> {
        let mut guards: Vec<Option<MutexGuard<'_, Occupants>>> =
            (0..self.slots.len()).map(|_| None).collect();
        for &index in &self.lock_order {
            guards[index] = Some(self.slots[index].occupants.lock());
        }
        LockedPopulation { store: self, guards: guards.into_iter().flatten().collect() }
    }

    /// Consistent occupancy of every state; takes every state lock
    pub fn snapshot(&self) -> OccupancySnapshot {
        self.lock_all().snapshot()
    }

    /// Occupancy of every state without taking any lock
    ///
    /// Each count is exact for its own state, but a firing in progress on
    /// another trigger may be visible in one state and not yet in another.
    pub fn occupancy_view(&self) -> OccupancySnapshot {
        OccupancySnapshot {
            states: self
                .slots
                .iter()
                .map(|slot| StateOccupancy {
                    name: slot.name.clone(),
                    occupancy: slot.count.load(Ordering::Acquire),
                    capacity: slot.capacity,
                })
                .collect(),
        }
    }
}

/// Every state locked at once; nothing can change while this is alive
pub struct LockedPopulation<'a> {
    store: &'a PopulationStore,
    guards: Vec<MutexGuard<'a, Occupants>>,
}

impl fmt::Debug for LockedPopulation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedPopulation").field("total", &self.total()).finish()
    }
}

impl LockedPopulation<'_> {
    /// Occupancy of a state
    pub fn occupancy(&self, id: StateId) -> usize {
        self.guards.get(id.index()).map_or(0, |g| g.len())
    }

    /// Number of live entities
    pub fn total(&self) -> usize {
        self.guards.iter().map(|g| g.len()).sum()
    }

    /// Total admitted, exact while the locks are held
    pub fn admitted(&self) -> u64 {
        self.store.admitted()
    }

    /// Total removed, exact while the locks are held
    pub fn removed(&self) -> u64 {
        self.store.removed()
    }

    /// Occupancy of every state
    pub fn snapshot(&self) -> OccupancySnapshot {
        OccupancySnapshot {
            states: self
                .store
                .slots
                .iter()
                .zip(&self.guards)
                .map(|(slot, guard)| StateOccupancy {
                    name: slot.name.clone(),
                    occupancy: guard.len(),
                    capacity: slot.capacity,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{TopologyDefinition, TransitionDefinition};
    use crate::types::Sex;
    use chrono::NaiveDate;

    fn topology() -> Topology {
        let definition = TopologyDefinition::new("Store", "Zeta", "Alpha")
            .with_state("Zeta", 2)
            .with_state("Alpha", 3)
            .with_transition(TransitionDefinition::ingress("Zeta", 1.0, 1.0))
            .with_transition(TransitionDefinition::between("Zeta", "Alpha", 1.0, 1.0))
            .with_transition(TransitionDefinition::egress("Alpha", 1.0, 1.0));
        Topology::build(&definition).unwrap()
    }

    fn entity(n: u64) -> Entity {
        let dob = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        Entity::new(EntityId(n), "Ana", "Maia", dob, Sex::F)
    }

    #[test]
    fn test_admit_respects_capacity() {
        let store = PopulationStore::new(&topology());
        let zeta = StateId(0);

        for n in 1..=2 {
            let outcome = store.admit(zeta, || true, || entity(n)).unwrap();
            assert!(matches!(outcome, StoreOutcome::Applied(_)));
        }
        let outcome = store.admit(zeta, || true, || panic!("must not create")).unwrap();
        assert_eq!(outcome, StoreOutcome::Blocked(BlockReason::TargetFull));
        assert_eq!(store.occupancy(zeta), Some(2));
        assert_eq!(store.admitted(), 2);
    }

    #[test]
    fn test_transfer_is_fifo_and_single() {
        let store = PopulationStore::new(&topology());
        let (zeta, alpha) = (StateId(0), StateId(1));
        store.admit(zeta, || true, || entity(1)).unwrap();
        store.admit(zeta, || true, || entity(2)).unwrap();

        store.transfer(zeta, alpha, || true).unwrap();
        assert_eq!(store.occupants(zeta), Some(vec![EntityId(2)]));
        assert_eq!(store.occupants(alpha), Some(vec![EntityId(1)]));

        store.transfer(zeta, alpha, || true).unwrap();
        assert_eq!(store.occupants(alpha), Some(vec![EntityId(1), EntityId(2)]));
        assert_eq!(
            store.transfer(zeta, alpha, || true).unwrap(),
            StoreOutcome::Blocked(BlockReason::SourceEmpty)
        );
    }

    #[test]
    fn test_refused_changes_nothing() {
        let store = PopulationStore::new(&topology());
        let zeta = StateId(0);
        store.admit(zeta, || true, || entity(1)).unwrap();

        assert_eq!(store.release(zeta, || false).unwrap(), StoreOutcome::Refused);
        assert_eq!(store.occupancy(zeta), Some(1));
        assert_eq!(store.removed(), 0);
    }

    #[test]
    fn test_stamp_is_taken_for_every_outcome() {
        let store = PopulationStore::new(&topology());
        let (zeta, alpha) = (StateId(0), StateId(1));

        let (outcome, stamp) = store.admit_stamped(zeta, || true, || entity(1), || "in").unwrap();
        assert!(matches!(outcome, StoreOutcome::Applied(_)));
        assert_eq!(stamp, "in");

        let (outcome, stamp) = store.release_stamped(alpha, || true, || 7).unwrap();
        assert_eq!(outcome, StoreOutcome::Blocked(BlockReason::SourceEmpty));
        assert_eq!(stamp, 7);

        let (outcome, _) = store.transfer_stamped(zeta, alpha, || false, || ()).unwrap();
        assert_eq!(outcome, StoreOutcome::Refused);
        assert_eq!(store.occupancy(zeta), Some(1));
    }

    #[test]
    fn test_occupancy_view_tracks_changes() {
        let store = PopulationStore::new(&topology());
        let (zeta, alpha) = (StateId(0), StateId(1));
        store.admit(zeta, || true, || entity(1)).unwrap();
        store.admit(zeta, || true, || entity(2)).unwrap();
        store.transfer(zeta, alpha, || true).unwrap();

        assert_eq!(store.occupancy_view(), store.snapshot());

        store.release(alpha, || true).unwrap();
        let view = store.occupancy_view();
        assert_eq!(view.get("Zeta"), Some(1));
        assert_eq!(view.get("Alpha"), Some(0));
    }

    #[test]
    fn test_missing_state_is_runtime_error() {
        let store = PopulationStore::new(&topology());
        let result = store.release(StateId(9), || true);
        assert!(matches!(result, Err(SimulationError::RuntimeTransition(_))));
        assert_eq!(store.occupancy(StateId(9)), None);
    }

    #[test]
    fn test_locked_view_balances_counters() {
        let store = PopulationStore::new(&topology());
        let (zeta, alpha) = (StateId(0), StateId(1));
        store.admit(zeta, || true, || entity(1)).unwrap();
        store.admit(zeta, || true, || entity(2)).unwrap();
        store.transfer(zeta, alpha, || true).unwrap();
        store.release(alpha, || true).unwrap();

        let locked = store.lock_all();
        assert_eq!(locked.admitted(), locked.total() as u64 + locked.removed());
        assert_eq!(locked.occupancy(zeta), 1);

        let snapshot = locked.snapshot();
        assert_eq!(snapshot.get("Zeta"), Some(1));
        assert_eq!(snapshot.get("Alpha"), Some(0));
        assert_eq!(snapshot.to_string(), "Zeta: 1/2, Alpha: 0/3");
    }
}
