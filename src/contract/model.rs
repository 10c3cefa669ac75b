//! Purpose: Serializable model of a consumer/provider contract.
//! Exports: `Contract`, `Pacticipant`, `Interaction`, `RequestSpec`, `ResponseSpec`,
//! `BodyMatcher`, `Shape`, `Field`, `CONTRACT_VERSION`.
//! Invariants: Interactions are immutable once built; matching never mutates them.
//! Invariants: Every shape can synthesize an example document that it matches.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const CONTRACT_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub consumer: Pacticipant,
    pub provider: Pacticipant,
    pub interactions: Vec<Interaction>,
    pub metadata: ContractMetadata,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pacticipant {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMetadata {
    pub contract_version: u32,
}

impl Default for ContractMetadata {
    fn default() -> Self {
        Self {
            contract_version: CONTRACT_VERSION,
        }
    }
}

impl Contract {
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            consumer: Pacticipant {
                name: consumer.into(),
            },
            provider: Pacticipant {
                name: provider.into(),
            },
            interactions: Vec::new(),
            metadata: ContractMetadata::default(),
        }
    }

    pub fn interaction(&self, description: &str) -> Option<&Interaction> {
        self.interactions
            .iter()
            .find(|interaction| interaction.description == description)
    }

    /// Adds `interaction`, replacing any existing one with the same description.
    pub fn upsert(&mut self, interaction: Interaction) {
        match self
            .interactions
            .iter_mut()
            .find(|existing| existing.description == interaction.description)
        {
            Some(existing) => *existing = interaction,
            None => self.interactions.push(interaction),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_state: Option<String>,
    pub request: RequestSpec,
    pub response: ResponseSpec,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyMatcher>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseSpec {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyMatcher>,
}

/// How a body is checked: by shape, or against an exact document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum BodyMatcher {
    Shape { shape: Shape },
    Literal { value: Value },
}

impl BodyMatcher {
    pub fn example(&self) -> Value {
        match self {
            BodyMatcher::Shape { shape } => shape.example(),
            BodyMatcher::Literal { value } => value.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    String { example: String },
    Integer { example: i64 },
    Exact { value: Value },
    Object { fields: Vec<Field> },
    EachLike { min: usize, item: Box<Shape> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub shape: Shape,
}

impl Shape {
    pub fn example(&self) -> Value {
        match self {
            Shape::String { example } => Value::String(example.clone()),
            Shape::Integer { example } => Value::from(*example),
            Shape::Exact { value } => value.clone(),
            Shape::Object { fields } => {
                let mut map = Map::new();
                for field in fields {
                    map.insert(field.name.clone(), field.shape.example());
                }
                Value::Object(map)
            }
            Shape::EachLike { min, item } => {
                let count = (*min).max(1);
                Value::Array((0..count).map(|_| item.example()).collect())
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Shape::String { .. } => "string",
            Shape::Integer { .. } => "integer",
            Shape::Exact { .. } => "exact value",
            Shape::Object { .. } => "object",
            Shape::EachLike { .. } => "array",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BodyMatcher, Contract, Field, Interaction, RequestSpec, ResponseSpec, Shape};
    use serde_json::json;

    fn interaction(description: &str, status: u16) -> Interaction {
        Interaction {
            description: description.to_string(),
            provider_state: None,
            request: RequestSpec {
                method: "GET".to_string(),
                path: "/api/pets".to_string(),
                body: None,
            },
            response: ResponseSpec { status, body: None },
        }
    }

    #[test]
    fn each_like_example_repeats_item_min_times() {
        let shape = Shape::EachLike {
            min: 2,
            item: Box::new(Shape::Object {
                fields: vec![Field {
                    name: "id".to_string(),
                    shape: Shape::Integer { example: 1 },
                }],
            }),
        };
        assert_eq!(shape.example(), json!([{"id": 1}, {"id": 1}]));
    }

    #[test]
    fn each_like_with_zero_min_still_produces_one_example() {
        let shape = Shape::EachLike {
            min: 0,
            item: Box::new(Shape::String {
                example: "x".to_string(),
            }),
        };
        assert_eq!(shape.example(), json!(["x"]));
    }

    #[test]
    fn upsert_replaces_by_description() {
        let mut contract = Contract::new("c", "p");
        contract.upsert(interaction("list", 200));
        contract.upsert(interaction("other", 200));
        contract.upsert(interaction("list", 204));
        assert_eq!(contract.interactions.len(), 2);
        assert_eq!(contract.interaction("list").map(|i| i.response.status), Some(204));
    }

    #[test]
    fn matcher_serializes_with_tags() {
        let matcher = BodyMatcher::Shape {
            shape: Shape::Integer { example: 3 },
        };
        let value = serde_json::to_value(&matcher).expect("encode");
        assert_eq!(
            value,
            json!({"match": "shape", "shape": {"type": "integer", "example": 3}})
        );
    }
}
