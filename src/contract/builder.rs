//! Purpose: Builder-style assembly of interactions and body shapes.
//! Exports: `InteractionBuilder`, `ObjectShape`.
//! Invariants: `build` validates method, path, and status before producing an `Interaction`.
#![allow(clippy::result_large_err)]

use serde_json::Value;

use super::model::{BodyMatcher, Field, Interaction, RequestSpec, ResponseSpec, Shape};
use crate::core::error::{Error, ErrorKind};

const METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

/// Declares an object by field kinds rather than literal values.
#[derive(Clone, Debug, Default)]
pub struct ObjectShape {
    fields: Vec<Field>,
}

impl ObjectShape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn string_type(self, name: &str, example: &str) -> Self {
        self.field(
            name,
            Shape::String {
                example: example.to_string(),
            },
        )
    }

    pub fn integer_type(self, name: &str, example: i64) -> Self {
        self.field(name, Shape::Integer { example })
    }

    pub fn exact(self, name: &str, value: impl Into<Value>) -> Self {
        self.field(
            name,
            Shape::Exact {
                value: value.into(),
            },
        )
    }

    pub fn field(mut self, name: &str, shape: Shape) -> Self {
        self.fields.retain(|field| field.name != name);
        self.fields.push(Field {
            name: name.to_string(),
            shape,
        });
        self
    }

    pub fn into_shape(self) -> Shape {
        Shape::Object {
            fields: self.fields,
        }
    }

    /// Array of at least `min` elements, each shaped like this object.
    pub fn each_like(self, min: usize) -> Shape {
        Shape::EachLike {
            min,
            item: Box::new(self.into_shape()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct InteractionBuilder {
    description: String,
    provider_state: Option<String>,
    method: String,
    path: Option<String>,
    request_body: Option<BodyMatcher>,
    status: Option<u16>,
    response_body: Option<BodyMatcher>,
}

impl InteractionBuilder {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            provider_state: None,
            method: "GET".to_string(),
            path: None,
            request_body: None,
            status: None,
            response_body: None,
        }
    }

    pub fn given(mut self, state: impl Into<String>) -> Self {
        self.provider_state = Some(state.into());
        self
    }

    pub fn method(mut self, method: &str) -> Self {
        self.method = method.to_ascii_uppercase();
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn request_shape(mut self, shape: Shape) -> Self {
        self.request_body = Some(BodyMatcher::Shape { shape });
        self
    }

    pub fn request_literal(mut self, value: Value) -> Self {
        self.request_body = Some(BodyMatcher::Literal { value });
        self
    }

    pub fn will_respond_with(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn response_shape(mut self, shape: Shape) -> Self {
        self.response_body = Some(BodyMatcher::Shape { shape });
        self
    }

    /// Parses `json` so formatting differences never matter when matching.
    pub fn response_literal(mut self, json: &str) -> Result<Self, Error> {
        let value: Value = serde_json::from_str(json).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "literal response body for '{}' is not valid json",
                    self.description
                ))
                .with_source(err)
        })?;
        self.response_body = Some(BodyMatcher::Literal { value });
        Ok(self)
    }

    pub fn build(self) -> Result<Interaction, Error> {
        let path = self.path.ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("interaction '{}' has no path", self.description))
        })?;
        let status = self.status.ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("interaction '{}' has no status", self.description))
                .with_hint("Call will_respond_with(status) before build().")
        })?;
        let interaction = Interaction {
            description: self.description,
            provider_state: self.provider_state,
            request: RequestSpec {
                method: self.method,
                path,
                body: self.request_body,
            },
            response: ResponseSpec {
                status,
                body: self.response_body,
            },
        };
        check_interaction(&interaction)
            .map_err(|message| Error::new(ErrorKind::Usage).with_message(message))?;
        Ok(interaction)
    }
}

/// Checks every interaction must pass, however it was produced.
/// Paths stay origin-relative so replay never leaves the provider's host.
pub(crate) fn check_interaction(interaction: &Interaction) -> Result<(), String> {
    if interaction.description.trim().is_empty() {
        return Err("interaction description must not be empty".to_string());
    }
    let method = interaction.request.method.as_str();
    if !METHODS.contains(&method) {
        return Err(format!("unsupported http method: {method}"));
    }
    let path = interaction.request.path.as_str();
    if !path.starts_with('/') {
        return Err(format!("interaction path must start with '/': {path}"));
    }
    if path.starts_with("//") || path.contains('\\') {
        return Err(format!("interaction path must be origin-relative: {path}"));
    }
    let status = interaction.response.status;
    if !(100..=599).contains(&status) {
        return Err(format!("invalid http status: {status}"));
    }
    Ok(())
}
