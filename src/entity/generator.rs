//! Entity generation
//!
//! The engine asks an [`EntityFactory`] for a new entity on every ingress
//! firing. [`PatientGenerator`] is the default factory and draws names, a date
//! of birth and a sex at random.

use chrono::NaiveDate;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fmt;

use crate::entity::Entity;
use crate::types::{EntityId, Sex};

const FIRST_NAMES: &[&str] = &[
    "Maria", "Beatriz", "Bárbara", "João", "Ana", "José", "Rita", "Guilherme", "Patrícia", "Miguel",
    "Sofia", "Pedro", "Carla", "Rui", "Sandra",
];

const LAST_NAMES: &[&str] = &[
    "Silva", "Morais", "Santos", "Teixeira", "Pereira", "Fernandes", "Costa", "Oliveira", "Maia",
    "Martins", "Rodrigues", "Nunes", "Gomes",
];

/// Creates entities for ingress firings
///
/// Implementations are shared by every trigger task, so they must be
/// thread-safe. The identifier is supplied by the caller.
pub trait EntityFactory: Send + Sync {
    /// Build a new entity carrying `id`
    fn create(&self, id: EntityId) -> Entity;
}

/// Default factory producing patients with random demographics
pub struct PatientGenerator {
    rng: Mutex<StdRng>,
}

impl fmt::Debug for PatientGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatientGenerator").finish()
    }
}

impl PatientGenerator {
    /// Create a generator seeded from entropy
    pub fn new() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }

    /// Create a generator with a specific seed for reproducible results
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    /// Create a generator, seeded when `seed` is set
    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::new, Self::with_seed)
    }

    fn random_date_of_birth(rng: &mut StdRng) -> NaiveDate {
        let year = rng.gen_range(1950..=2000);
        let month = rng.gen_range(1..=12);
        // Day 28 exists in every month
        let day = rng.gen_range(1..=28);
        NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
    }
}

impl Default for PatientGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityFactory for PatientGenerator {
    fn create(&self, id: EntityId) -> Entity {
        let mut rng = self.rng.lock();
        let first_name = FIRST_NAMES.choose(&mut *rng).copied().unwrap_or("Ana");
        let last_name = LAST_NAMES.choose(&mut *rng).copied().unwrap_or("Silva");
        let date_of_birth = Self::random_date_of_birth(&mut rng);
        let sex = if rng.gen_bool(0.5) { Sex::M } else { Sex::F };

        Entity::new(id, first_name, last_name, date_of_birth, sex)
    }
}
