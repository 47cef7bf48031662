//! Payload documents with per-operation random values.
//!
//! A payload is a JSON object. Anywhere inside it, an object of exactly one key
//! `"$randInt": [lo, hi]` stands for an integer drawn uniformly from `lo..=hi`
//! each time the payload is rendered.

use rand::Rng;
use serde_json::{Map, Value};
use store_client::Document;
use thiserror::Error;

const RAND_INT: &str = "$randInt";

/// Why a payload was rejected.
#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    #[error("not valid JSON: {0}")]
    Json(String),

    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("expected a JSON array of objects, found {0}")]
    NotAnArray(&'static str),

    #[error("bad $randInt expression: {0}")]
    BadRandInt(String),

    #[error("integer {0} does not fit in a signed 64-bit store integer")]
    OutOfRange(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Literal(Value),
    RandInt { lo: i64, hi: i64 },
    Object(Vec<(String, Node)>),
    Array(Vec<Node>),
}

/// A validated payload document, rendered fresh for every operation.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTemplate {
    fields: Vec<(String, Node)>,
}

impl DocumentTemplate {
    /// Parse a payload from JSON text.
    pub fn parse_str(text: &str) -> Result<Self, TemplateError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| TemplateError::Json(e.to_string()))?;
        Self::from_value(value)
    }

    /// Build a payload from an already parsed value. JSON strings are parsed first.
    pub fn from_value(value: Value) -> Result<Self, TemplateError> {
        match value {
            Value::String(text) => Self::parse_str(&text),
            Value::Object(map) => Ok(Self {
                fields: compile_fields(map)?,
            }),
            other => Err(TemplateError::NotAnObject(type_name(&other))),
        }
    }

    /// Parse an aggregation pipeline: an array of stage objects, or JSON text of one.
    pub fn pipeline_from_value(value: Value) -> Result<Vec<Self>, TemplateError> {
        match value {
            Value::String(text) => {
                let parsed: Value =
                    serde_json::from_str(&text).map_err(|e| TemplateError::Json(e.to_string()))?;
                Self::pipeline_from_value(parsed)
            }
            Value::Array(stages) => stages.into_iter().map(Self::from_value).collect(),
            other => Err(TemplateError::NotAnArray(type_name(&other))),
        }
    }

    /// True when rendering always yields the same document.
    pub fn is_static(&self) -> bool {
        self.fields.iter().all(|(_, node)| node.is_static())
    }

    /// Produce a concrete document, drawing any random values from `rng`.
    pub fn render<R: Rng>(&self, rng: &mut R) -> Document {
        render_fields(&self.fields, rng)
    }
}

impl Node {
    fn is_static(&self) -> bool {
        match self {
            Node::Literal(_) => true,
            Node::RandInt { .. } => false,
            Node::Object(fields) => fields.iter().all(|(_, n)| n.is_static()),
            Node::Array(items) => items.iter().all(Node::is_static),
        }
    }

    fn render<R: Rng>(&self, rng: &mut R) -> Value {
        match self {
            Node::Literal(value) => value.clone(),
            Node::RandInt { lo, hi } => Value::from(rng.gen_range(*lo..=*hi)),
            Node::Object(fields) => Value::Object(render_fields(fields, rng)),
            Node::Array(items) => Value::Array(items.iter().map(|n| n.render(rng)).collect()),
        }
    }
}

fn render_fields<R: Rng>(fields: &[(String, Node)], rng: &mut R) -> Document {
    fields
        .iter()
        .map(|(key, node)| (key.clone(), node.render(rng)))
        .collect()
}

fn compile_fields(map: Map<String, Value>) -> Result<Vec<(String, Node)>, TemplateError> {
    map.into_iter()
        .map(|(key, value)| Ok((key, compile(value)?)))
        .collect()
}

fn compile(value: Value) -> Result<Node, TemplateError> {
    match value {
        Value::Object(map) if map.len() == 1 && map.contains_key(RAND_INT) => {
            compile_rand_int(&map[RAND_INT])
        }
        Value::Object(map) => Ok(Node::Object(compile_fields(map)?)),
        Value::Array(items) => Ok(Node::Array(
            items.into_iter().map(compile).collect::<Result<_, _>>()?,
        )),
        // Stores only hold signed 64-bit integers.
        Value::Number(n) if n.as_i64().is_none() && n.as_u64().is_some() => {
            Err(TemplateError::OutOfRange(n.to_string()))
        }
        other => Ok(Node::Literal(other)),
    }
}

fn compile_rand_int(args: &Value) -> Result<Node, TemplateError> {
    let bounds = args
        .as_array()
        .filter(|a| a.len() == 2)
        .ok_or_else(|| TemplateError::BadRandInt(format!("expected [lo, hi], got {}", args)))?;

    let lo = bounds[0]
        .as_i64()
        .ok_or_else(|| TemplateError::BadRandInt(format!("lo is not an integer: {}", bounds[0])))?;
    let hi = bounds[1]
        .as_i64()
        .ok_or_else(|| TemplateError::BadRandInt(format!("hi is not an integer: {}", bounds[1])))?;

    if lo > hi {
        return Err(TemplateError::BadRandInt(format!(
            "lo ({}) is greater than hi ({})",
            lo, hi
        )));
    }
    Ok(Node::RandInt { lo, hi })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
