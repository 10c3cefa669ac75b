//! Purpose: Check observed HTTP responses and requests against contract matchers.
//! Exports: `Mismatch`, `match_status`, `match_body`, `match_shape`.
//! Role: Shared by the mock server (requests) and the verifier (responses).
//! Invariants: Matching is pure; every difference is reported, not just the first.
//! Invariants: Object shapes tolerate undeclared fields; literal bodies do not.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use super::model::{BodyMatcher, Shape};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub path: String,
    pub expected: String,
    pub actual: String,
}

impl Mismatch {
    fn new(path: &str, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, found {}",
            self.path, self.expected, self.actual
        )
    }
}

pub fn match_status(expected: u16, actual: u16) -> Option<Mismatch> {
    (expected != actual).then(|| Mismatch::new("status", expected.to_string(), actual.to_string()))
}

/// Matches raw body bytes; an empty body counts as absent.
pub fn match_body(matcher: Option<&BodyMatcher>, raw: &[u8]) -> Vec<Mismatch> {
    let mut out = Vec::new();
    let Some(matcher) = matcher else {
        return out;
    };
    if raw.iter().all(u8::is_ascii_whitespace) {
        out.push(Mismatch::new("$", "a json body", "an empty body"));
        return out;
    }
    let actual: Value = match serde_json::from_slice(raw) {
        Ok(value) => value,
        Err(err) => {
            out.push(Mismatch::new("$", "a json body", format!("invalid json ({err})")));
            return out;
        }
    };
    match matcher {
        BodyMatcher::Shape { shape } => match_shape(shape, &actual, "$", &mut out),
        BodyMatcher::Literal { value } => diff_literal(value, &actual, "$", &mut out),
    }
    out
}

pub fn match_shape(shape: &Shape, actual: &Value, path: &str, out: &mut Vec<Mismatch>) {
    match shape {
        Shape::String { .. } => {
            if !actual.is_string() {
                out.push(Mismatch::new(path, "string", describe(actual)));
            }
        }
        Shape::Integer { .. } => {
            if !(actual.is_i64() || actual.is_u64()) {
                out.push(Mismatch::new(path, "integer", describe(actual)));
            }
        }
        Shape::Exact { value } => diff_literal(value, actual, path, out),
        Shape::Object { fields } => {
            let Some(map) = actual.as_object() else {
                out.push(Mismatch::new(path, "object", describe(actual)));
                return;
            };
            for field in fields {
                let field_path = format!("{path}.{}", field.name);
                match map.get(&field.name) {
                    Some(value) => match_shape(&field.shape, value, &field_path, out),
                    None => out.push(Mismatch::new(&field_path, field.shape.label(), "missing")),
                }
            }
        }
        Shape::EachLike { min, item } => {
            let Some(items) = actual.as_array() else {
                out.push(Mismatch::new(path, "array", describe(actual)));
                return;
            };
            if items.len() < *min {
                out.push(Mismatch::new(
                    path,
                    format!("at least {min} element(s)"),
                    format!("{} element(s)", items.len()),
                ));
            }
            for (index, value) in items.iter().enumerate() {
                match_shape(item, value, &format!("{path}[{index}]"), out);
            }
        }
    }
}

fn diff_literal(expected: &Value, actual: &Value, path: &str, out: &mut Vec<Mismatch>) {
    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => {
            for (key, expected_value) in expected {
                let field_path = format!("{path}.{key}");
                match actual.get(key) {
                    Some(actual_value) => diff_literal(expected_value, actual_value, &field_path, out),
                    None => out.push(Mismatch::new(&field_path, describe(expected_value), "missing")),
                }
            }
            for (key, actual_value) in actual {
                if !expected.contains_key(key) {
                    out.push(Mismatch::new(
                        &format!("{path}.{key}"),
                        "no field",
                        describe(actual_value),
                    ));
                }
            }
        }
        (Value::Array(expected), Value::Array(actual)) => {
            if expected.len() != actual.len() {
                out.push(Mismatch::new(
                    path,
                    format!("{} element(s)", expected.len()),
                    format!("{} element(s)", actual.len()),
                ));
            }
            for (index, (expected, actual)) in expected.iter().zip(actual.iter()).enumerate() {
                diff_literal(expected, actual, &format!("{path}[{index}]"), out);
            }
        }
        (expected, actual) => {
            if expected != actual {
                out.push(Mismatch::new(path, describe(expected), describe(actual)));
            }
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => format!("boolean {flag}"),
        Value::Number(number) if number.is_i64() || number.is_u64() => format!("integer {number}"),
        Value::Number(number) => format!("number {number}"),
        Value::String(text) => format!("string {text:?}"),
        Value::Array(items) => format!("array of {}", items.len()),
        Value::Object(_) => "object".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Mismatch, match_body, match_status};
    use crate::contract::builder::ObjectShape;
    use crate::contract::model::{BodyMatcher, Shape};
    use serde_json::json;

    fn pet_shape() -> Shape {
        ObjectShape::new()
            .integer_type("id", 1)
            .string_type("name", "Buddy")
            .string_type("type", "Dog")
            .integer_type("age", 3)
            .into_shape()
    }

    fn shape(shape: Shape) -> BodyMatcher {
        BodyMatcher::Shape { shape }
    }

    #[test]
    fn shape_accepts_any_values_of_the_right_kind() {
        let body = br#"{"id": 77, "name": "Other", "type": "Cat", "age": 9, "extra": true}"#;
        assert!(match_body(Some(&shape(pet_shape())), body).is_empty());
    }

    #[test]
    fn shape_reports_missing_and_wrong_typed_fields() {
        let body = br#"{"id": "1", "type": "Dog", "age": 3}"#;
        let mismatches = match_body(Some(&shape(pet_shape())), body);
        assert_eq!(
            mismatches,
            vec![
                Mismatch {
                    path: "$.id".to_string(),
                    expected: "integer".to_string(),
                    actual: "string \"1\"".to_string(),
                },
                Mismatch {
                    path: "$.name".to_string(),
                    expected: "string".to_string(),
                    actual: "missing".to_string(),
                },
            ]
        );
    }

    #[test]
    fn each_like_enforces_minimum_and_item_shape() {
        let matcher = shape(ObjectShape::new().integer_type("id", 1).each_like(1));
        assert!(match_body(Some(&matcher), br#"[{"id": 1}, {"id": 2}]"#).is_empty());

        let empty = match_body(Some(&matcher), b"[]");
        assert_eq!(empty.len(), 1);
        assert_eq!(empty[0].path, "$");

        let bad_item = match_body(Some(&matcher), br#"[{"id": 1}, {"id": 2.5}]"#);
        assert_eq!(bad_item.len(), 1);
        assert_eq!(bad_item[0].path, "$[1].id");
    }

    #[test]
    fn literal_ignores_formatting_but_not_values() {
        let matcher = BodyMatcher::Literal {
            value: json!({"id": 1, "name": "Buddy"}),
        };
        assert!(match_body(Some(&matcher), b"{\n  \"name\":\"Buddy\",\"id\":1\n}").is_empty());

        let mismatches = match_body(Some(&matcher), br#"{"id": 1, "name": "Max", "age": 2}"#);
        let paths: Vec<&str> = mismatches.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["$.name", "$.age"]);
    }

    #[test]
    fn empty_or_invalid_bodies_fail_when_a_body_is_expected() {
        let matcher = shape(pet_shape());
        assert_eq!(match_body(Some(&matcher), b"").len(), 1);
        assert_eq!(match_body(Some(&matcher), b"<html>").len(), 1);
        assert!(match_body(None, b"anything").is_empty());
    }

    #[test]
    fn status_mismatch_is_reported() {
        assert!(match_status(200, 200).is_none());
        let mismatch = match_status(200, 404).expect("mismatch");
        assert_eq!(mismatch.to_string(), "status: expected 200, found 404");
    }
}
