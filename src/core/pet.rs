//! Purpose: Define the `Pet` record and its inbound request shape.
//! Exports: `Pet`, `PetInput`.
//! Invariants: `Pet` is a value; updates replace it wholesale.
//! Invariants: An id of zero or below on input means "assign one for me".

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pet {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub age: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Pet {
    pub fn new(id: i64, name: impl Into<String>, kind: impl Into<String>, age: i32) -> Self {
        Self {
            id,
            name: name.into(),
            kind: kind.into(),
            age,
            breed: None,
            description: None,
        }
    }

    pub fn with_breed(mut self, breed: impl Into<String>) -> Self {
        self.breed = Some(breed.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }
}

/// Request body for create and update; `id` may be omitted or null.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub age: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PetInput {
    pub fn into_pet(self) -> Pet {
        Pet {
            id: self.id.unwrap_or(0),
            name: self.name,
            kind: self.kind,
            age: self.age,
            breed: self.breed,
            description: self.description,
        }
    }
}

impl From<Pet> for PetInput {
    fn from(pet: Pet) -> Self {
        Self {
            id: Some(pet.id),
            name: pet.name,
            kind: pet.kind,
            age: pet.age,
            breed: pet.breed,
            description: pet.description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Pet, PetInput};
    use serde_json::json;

    #[test]
    fn pet_json_uses_type_key_and_omits_absent_optionals() {
        let pet = Pet::new(3, "Milo", "Cat", 4);
        let value = serde_json::to_value(&pet).expect("encode");
        assert_eq!(
            value,
            json!({"id": 3, "name": "Milo", "type": "Cat", "age": 4})
        );
    }

    #[test]
    fn input_without_id_becomes_unassigned() {
        let input: PetInput = serde_json::from_value(json!({
            "name": "Rex",
            "type": "Dog",
            "age": 2,
            "breed": "German Shepherd"
        }))
        .expect("decode");
        let pet = input.into_pet();
        assert_eq!(pet.id, 0);
        assert_eq!(pet.breed.as_deref(), Some("German Shepherd"));
        assert_eq!(pet.description, None);
    }

    #[test]
    fn input_with_null_id_is_accepted() {
        let input: PetInput = serde_json::from_value(json!({
            "id": null,
            "name": "Rex",
            "type": "Dog",
            "age": 2
        }))
        .expect("decode");
        assert_eq!(input.id, None);
    }

    #[test]
    fn input_missing_required_field_is_rejected() {
        let result: Result<PetInput, _> =
            serde_json::from_value(json!({"name": "Rex", "age": 2}));
        assert!(result.is_err());
    }
}
