//! # Parameters
//!
//! The typed payload carried by an event. The bus never inspects it; it is
//! kept here so events are complete values that can be compared and encoded.

use serde::{Deserialize, Serialize};

/// A single typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A named list of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Key name, unique within a parameter set.
    pub key_name: String,
    /// Values, in insertion order.
    pub values: Vec<ParamValue>,
}

impl Parameter {
    pub fn new<V: Into<ParamValue>>(
        key_name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            key_name: key_name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Parameters of an event, unique by key name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSet {
    params: Vec<Parameter>,
}

impl ParamSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, replacing any parameter with the same key name.
    pub fn insert(&mut self, param: Parameter) {
        match self.params.iter_mut().find(|p| p.key_name == param.key_name) {
            Some(existing) => *existing = param,
            None => self.params.push(param),
        }
    }

    /// Remove a parameter by key name, returning it if present.
    pub fn remove(&mut self, key_name: &str) -> Option<Parameter> {
        let index = self.params.iter().position(|p| p.key_name == key_name)?;
        Some(self.params.remove(index))
    }

    #[must_use]
    pub fn get(&self, key_name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.key_name == key_name)
    }

    #[must_use]
    pub fn contains(&self, key_name: &str) -> bool {
        self.get(key_name).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }
}
