//! Purpose: Canonical pet consumer contract and the provider fixtures that satisfy it.
//! Exports: `CONSUMER`, `PROVIDER`, state label constants, `pet_consumer_contract`,
//! `pet_provider_states`.
//! Role: Shared by the CLI (`contract write`, `serve --provider-states`) and tests.
//! Invariants: Every state label used by the contract has a provider fixture.
#![allow(clippy::result_large_err)]

use std::sync::Arc;

use crate::contract::{
    Contract, FixtureRepository, InteractionBuilder, ObjectShape, ProviderStates, Shape,
};
use crate::core::error::Error;
use crate::core::pet::Pet;

pub const CONSUMER: &str = "pet_consumer";
pub const PROVIDER: &str = "pet_provider";

pub const PETS_EXIST: &str = "Pets exist in the system";
pub const PET_1_EXISTS: &str = "Pet with ID 1 exists";
pub const SERVICE_AVAILABLE: &str = "Pet service is available";

pub fn buddy() -> Pet {
    Pet::new(1, "Buddy", "Dog", 3)
        .with_breed("Golden Retriever")
        .with_description("Friendly and playful")
}

pub fn whiskers() -> Pet {
    Pet::new(2, "Whiskers", "Cat", 5)
        .with_breed("Siamese")
        .with_description("Independent and curious")
}

fn pet_body(name: &str, kind: &str, age: i64, breed: &str, description: &str) -> ObjectShape {
    ObjectShape::new()
        .string_type("name", name)
        .string_type("type", kind)
        .integer_type("age", age)
        .string_type("breed", breed)
        .string_type("description", description)
}

pub fn pet_consumer_contract() -> Result<Contract, Error> {
    let list = InteractionBuilder::new("GET /api/pets returns list of available pets")
        .given(PETS_EXIST)
        .method("GET")
        .path("/api/pets")
        .will_respond_with(200)
        .response_shape(
            pet_body("Buddy", "Dog", 3, "Golden Retriever", "Friendly and playful")
                .integer_type("id", 1)
                .each_like(1),
        )
        .build()?;

    let get = InteractionBuilder::new("GET /api/pets/1 returns specific pet")
        .given(PET_1_EXISTS)
        .method("GET")
        .path("/api/pets/1")
        .will_respond_with(200)
        .response_literal(
            r#"{
              "id": 1,
              "name": "Buddy",
              "type": "Dog",
              "age": 3,
              "breed": "Golden Retriever",
              "description": "Friendly and playful"
            }"#,
        )?
        .build()?;

    let create = InteractionBuilder::new("POST /api/pets creates new pet")
        .given(SERVICE_AVAILABLE)
        .method("POST")
        .path("/api/pets")
        .request_shape(
            pet_body("Rex", "Dog", 2, "German Shepherd", "Loyal and protective").into_shape(),
        )
        .will_respond_with(201)
        .response_shape(created_shape())
        .build()?;

    let mut contract = Contract::new(CONSUMER, PROVIDER);
    contract.upsert(list);
    contract.upsert(get);
    contract.upsert(create);
    Ok(contract)
}

fn created_shape() -> Shape {
    pet_body("Rex", "Dog", 2, "German Shepherd", "Loyal and protective")
        .integer_type("id", CREATED_PET_ID)
        .into_shape()
}

/// Id the create interaction's example response carries.
pub const CREATED_PET_ID: i64 = 6;

/// Fixture routines for every state label in `pet_consumer_contract`.
pub fn pet_provider_states(repository: Arc<FixtureRepository>) -> ProviderStates {
    ProviderStates::new(repository)
        .with_state(PETS_EXIST, |repo| {
            repo.reseed([buddy(), whiskers()]);
            Ok(())
        })
        .with_state(PET_1_EXISTS, |repo| {
            repo.reseed([buddy()]);
            Ok(())
        })
        .with_state(SERVICE_AVAILABLE, |repo| {
            repo.reseed(Vec::new());
            repo.pin_next_id(CREATED_PET_ID);
            Ok(())
        })
}
