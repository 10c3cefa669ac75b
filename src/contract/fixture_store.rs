//! Purpose: Fixture-seeding `PetRepository` used while a contract is verified.
//! Exports: `FixtureRepository`.
//! Role: Stands in for `MemoryStore` behind a provider under verification.
//! Invariants: Reseeding replaces the stored pets wholesale; the id counter keeps running.
//! Invariants: A pinned id is handed to the next generated create only, and only if unused.

use parking_lot::Mutex;

use crate::core::pet::Pet;
use crate::core::store::{PetRepository, PetTable};

#[derive(Debug)]
pub struct FixtureRepository {
    state: Mutex<FixtureState>,
}

#[derive(Debug)]
struct FixtureState {
    table: PetTable,
    pinned_id: Option<i64>,
}

impl FixtureRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FixtureState {
                table: PetTable::new(),
                pinned_id: None,
            }),
        }
    }

    /// Replaces every stored pet with `pets` and forgets any pinned id.
    pub fn reseed(&self, pets: impl IntoIterator<Item = Pet>) {
        let mut state = self.state.lock();
        state.table.set_pets(pets.into_iter().collect());
        state.pinned_id = None;
    }

    /// The next create that needs a generated id receives `id` instead.
    pub fn pin_next_id(&self, id: i64) {
        self.state.lock().pinned_id = Some(id);
    }
}

impl Default for FixtureRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl PetRepository for FixtureRepository {
    fn list(&self) -> Vec<Pet> {
        self.state.lock().table.list()
    }

    fn get(&self, id: i64) -> Option<Pet> {
        self.state.lock().table.get(id)
    }

    fn next_id(&self) -> i64 {
        self.state.lock().table.next_id()
    }

    fn insert(&self, pet: Pet) -> Pet {
        self.state.lock().table.insert(pet)
    }

    fn create(&self, candidate: Pet) -> Pet {
        let mut state = self.state.lock();
        if state.table.honors_id(candidate.id) {
            return state.table.insert(candidate);
        }
        let id = match state.pinned_id.take() {
            Some(id) if state.table.honors_id(id) => id,
            _ => state.table.fresh_id(),
        };
        state.table.insert(candidate.with_id(id))
    }

    fn replace(&self, id: i64, pet: Pet) -> Option<Pet> {
        self.state.lock().table.replace(id, pet)
    }

    fn remove(&self, id: i64) -> bool {
        self.state.lock().table.remove(id)
    }
}
