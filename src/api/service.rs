//! Purpose: CRUD operations over a `PetRepository` with id-assignment policy.
//! Exports: `PetService`.
//! Role: The only writer of the repository on the request path.
//! Invariants: Creation keeps a caller id only when it is positive and unused.
//! Invariants: Update forces the stored id to the path id.
//! Invariants: Expected absence is returned as `None`/`false`, never as an error.

use std::sync::Arc;

use crate::core::pet::Pet;
use crate::core::store::PetRepository;

#[derive(Clone)]
pub struct PetService {
    repository: Arc<dyn PetRepository>,
}

impl PetService {
    pub fn new(repository: Arc<dyn PetRepository>) -> Self {
        Self { repository }
    }

    pub fn get_all_pets(&self) -> Vec<Pet> {
        self.repository.list()
    }

    pub fn get_pet_by_id(&self, id: i64) -> Option<Pet> {
        self.repository.get(id)
    }

    /// Id check and allocation happen inside the repository's lock, so services
    /// sharing one repository never store the same id twice.
    pub fn create_pet(&self, candidate: Pet) -> Pet {
        let pet = self.repository.create(candidate);
        tracing::debug!(id = pet.id, "created pet");
        pet
    }

    pub fn update_pet(&self, id: i64, pet: Pet) -> Option<Pet> {
        self.repository.replace(id, pet.with_id(id))
    }

    pub fn delete_pet(&self, id: i64) -> bool {
        self.repository.remove(id)
    }
}
