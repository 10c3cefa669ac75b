//! Purpose: Own the in-memory pet collection and the id allocator.
//! Exports: `PetRepository`, `MemoryStore`.
//! Role: Backing storage for `PetService`; swapped for fixtures during verification.
//! Invariants: Counter and collection sit behind one lock; every mutation is atomic to readers.
//! Invariants: `next_id` never returns the same value twice for a store instance.
//! Invariants: `create` checks, allocates, and appends in one critical section.
//! Invariants: Listing preserves insertion order; `replace` keeps the original position.

use parking_lot::Mutex;

use super::pet::Pet;

/// Storage capability the service and the provider-state fixtures depend on.
pub trait PetRepository: Send + Sync {
    fn list(&self) -> Vec<Pet>;

    fn get(&self, id: i64) -> Option<Pet>;

    /// Returns the current counter value, then increments it.
    fn next_id(&self) -> i64;

    fn insert(&self, pet: Pet) -> Pet;

    /// Stores `candidate`, keeping its id only when it is positive and unused.
    fn create(&self, candidate: Pet) -> Pet;

    /// Overwrites the pet stored under `id`; `None` leaves state untouched.
    fn replace(&self, id: i64, pet: Pet) -> Option<Pet>;

    fn remove(&self, id: i64) -> bool;
}

/// Ordered pets plus counter; callers hold the lock around it.
#[derive(Debug)]
pub(crate) struct PetTable {
    pets: Vec<Pet>,
    next_id: i64,
}

impl PetTable {
    pub(crate) fn new() -> Self {
        Self {
            pets: Vec::new(),
            next_id: 1,
        }
    }

    pub(crate) fn list(&self) -> Vec<Pet> {
        self.pets.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.pets.len()
    }

    pub(crate) fn get(&self, id: i64) -> Option<Pet> {
        self.pets.iter().find(|pet| pet.id == id).cloned()
    }

    pub(crate) fn next_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn insert(&mut self, pet: Pet) -> Pet {
        self.pets.push(pet.clone());
        pet
    }

    pub(crate) fn honors_id(&self, id: i64) -> bool {
        id > 0 && self.get(id).is_none()
    }

    // Counter values already claimed by caller-supplied ids are skipped.
    pub(crate) fn fresh_id(&mut self) -> i64 {
        loop {
            let id = self.next_id();
            if self.get(id).is_none() {
                return id;
            }
        }
    }

    pub(crate) fn create(&mut self, candidate: Pet) -> Pet {
        if self.honors_id(candidate.id) {
            return self.insert(candidate);
        }
        let id = self.fresh_id();
        self.insert(candidate.with_id(id))
    }

    pub(crate) fn replace(&mut self, id: i64, pet: Pet) -> Option<Pet> {
        let slot = self.pets.iter_mut().find(|stored| stored.id == id)?;
        *slot = pet.with_id(id);
        Some(slot.clone())
    }

    pub(crate) fn remove(&mut self, id: i64) -> bool {
        match self.pets.iter().position(|pet| pet.id == id) {
            Some(index) => {
                self.pets.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_pets(&mut self, pets: Vec<Pet>) {
        self.pets = pets;
    }
}

#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<PetTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PetTable::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PetRepository for MemoryStore {
    fn list(&self) -> Vec<Pet> {
        self.inner.lock().list()
    }

    fn get(&self, id: i64) -> Option<Pet> {
        self.inner.lock().get(id)
    }

    fn next_id(&self) -> i64 {
        self.inner.lock().next_id()
    }

    fn insert(&self, pet: Pet) -> Pet {
        self.inner.lock().insert(pet)
    }

    fn create(&self, candidate: Pet) -> Pet {
        self.inner.lock().create(candidate)
    }

    fn replace(&self, id: i64, pet: Pet) -> Option<Pet> {
        self.inner.lock().replace(id, pet)
    }

    fn remove(&self, id: i64) -> bool {
        self.inner.lock().remove(id)
    }
}
