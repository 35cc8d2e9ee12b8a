//! Ordered field storage bound to a schema.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::{
    error::{ArangoError, ArangoResult},
    schema::{RESERVED_ATTRIBUTES, Schema},
    value::FieldValue,
};

/// An ordered mapping from field names to values, validated against a [`Schema`].
///
/// Declared fields are kept in schema order. Fields of an open schema that are not declared are
/// kept after them, in insertion order, and written back unchanged on dump.
///
/// A declared field that was absent from a loaded raw record and filled from its default is
/// marked as defaulted. It reads like any other value but is left out on dump until it is set.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<Schema>,
    values: Vec<Option<FieldValue>>,
    defaulted: Vec<bool>,
    extra: Vec<(String, FieldValue)>,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name()
            && self.values == other.values
            && self.defaulted == other.defaulted
            && self.extra == other.extra
    }
}

impl Record {
    /// Creates a record holding the declared defaults. Unlike defaults filled in by a load,
    /// these are written on dump.
    pub fn new(schema: &Arc<Schema>) -> Self {
        let values: Vec<_> = schema
            .fields()
            .iter()
            .map(|field| field.default_value())
            .collect();

        Self {
            schema: Arc::clone(schema),
            defaulted: vec![false; values.len()],
            values,
            extra: Vec::new(),
        }
    }

    pub(crate) fn from_parts(
        schema: Arc<Schema>,
        values: Vec<Option<FieldValue>>,
        defaulted: Vec<bool>,
        extra: Vec<(String, FieldValue)>,
    ) -> Self {
        Self { schema, values, defaulted, extra }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the value of a field, `None` when it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::UnknownField`] if the schema is closed and does not declare `name`.
    pub fn get(&self, name: &str) -> ArangoResult<Option<&FieldValue>> {
        match self.schema.position(name) {
            Some(index) => Ok(self.values[index].as_ref()),
            None if self.schema.is_open() => Ok(self
                .extra
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value)),
            None => Err(ArangoError::unknown_field(name, self.schema.name())),
        }
    }

    /// Sets a field, validating the value against the field's type.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::UnknownField`] for undeclared fields of closed schemas and for
    /// reserved identity attributes, or [`ArangoError::Deserialization`] on a type mismatch.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> ArangoResult<()> {
        let value = value.into();

        match self.schema.position(name) {
            Some(index) => {
                let checked = self.schema.fields()[index].accept(value)?;
                self.values[index] = Some(checked);
                self.defaulted[index] = false;
            }
            None if self.schema.is_open() && !RESERVED_ATTRIBUTES.contains(&name) => {
                match self.extra.iter_mut().find(|(key, _)| key == name) {
                    Some((_, slot)) => *slot = value,
                    None => self.extra.push((name.to_string(), value)),
                }
            }
            None => return Err(ArangoError::unknown_field(name, self.schema.name())),
        }

        Ok(())
    }

    /// Removes a field and returns its previous value.
    pub fn remove(&mut self, name: &str) -> ArangoResult<Option<FieldValue>> {
        match self.schema.position(name) {
            Some(index) => {
                self.defaulted[index] = false;
                Ok(self.values[index].take())
            }
            None if self.schema.is_open() => Ok(self
                .extra
                .iter()
                .position(|(key, _)| key == name)
                .map(|index| self.extra.remove(index).1)),
            None => Err(ArangoError::unknown_field(name, self.schema.name())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        matches!(self.get(name), Ok(Some(_)))
    }

    /// Iterates over present fields, declared fields first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.schema
            .fields()
            .iter()
            .zip(self.values.iter())
            .filter_map(|(field, value)| value.as_ref().map(|v| (field.name(), v)))
            .chain(self.extra.iter().map(|(key, value)| (key.as_str(), value)))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dumps the record through its schema.
    pub fn to_json(&self) -> ArangoResult<Map<String, Value>> {
        let mut out = Map::new();
        self.schema.dump_record(self, &mut out)?;
        Ok(out)
    }

    pub(crate) fn values(&self) -> &[Option<FieldValue>] {
        &self.values
    }

    /// Whether the field at `index` still holds the default filled in by a load.
    pub(crate) fn is_defaulted(&self, index: usize) -> bool {
        self.defaulted.get(index).copied().unwrap_or(false)
    }

    pub(crate) fn extra(&self) -> &[(String, FieldValue)] {
        &self.extra
    }
}
