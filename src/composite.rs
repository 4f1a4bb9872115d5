//! Struct and array nodes.

use tracing::trace;

use crate::errors::{Error, Result};
use crate::field::{Member, StructField};
use crate::node::FormatNode;
use crate::scope::Scope;
use crate::size::Size;
use crate::stream::BitStream;
use crate::value::{Fields, Value};

static NULL: Value = Value::Null;

/// Ordered members whose values are collected into a map.
#[derive(Debug, Clone, Default)]
pub struct StructNode {
    pub fields: Vec<StructField>,
    /// When set, the map is returned as a [`Value::Typed`] with this name.
    pub type_name: Option<String>,
}

impl StructNode {
    pub fn new(fields: impl IntoIterator<Item = StructField>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
            type_name: None,
        }
    }

    pub fn typed(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub(crate) fn parse_in(&self, stream: &mut BitStream<'_>, scope: &Scope<'_>) -> Result<Value> {
        let mut fields = Fields::new();
        for field in &self.fields {
            let value = match &field.member {
                Member::Node(node) => node.parse_in(stream, &scope.child(&fields))?,
                Member::Literal(value) => value.clone(),
            };

            match &field.key {
                Some(path) => {
                    trace!(field = %path, value = %value, "parsed struct member");
                    path.set(&mut fields, value);
                }
                None => trace!("parsed unkeyed struct member"),
            }
        }

        Ok(match &self.type_name {
            Some(type_name) => Value::typed(type_name, Value::Map(fields)),
            None => Value::Map(fields),
        })
    }

    pub(crate) fn compose_in(
        &self,
        stream: &mut BitStream<'_>,
        value: &Value,
        scope: &Scope<'_>,
    ) -> Result<()> {
        if self.fields.iter().any(|field| field.key.is_none()) {
            return Err(Error::unsupported(
                "cannot compose a struct with unkeyed members",
            ));
        }
        let fields = value
            .untyped(self.type_name.as_deref())?
            .as_map()
            .ok_or_else(|| {
                Error::format(format!("struct expects a map, got {}", value.kind_name()))
            })?;
        let scope = scope.child(fields);

        for field in &self.fields {
            let Some(path) = &field.key else { continue };
            let value = path.get(fields).unwrap_or(&NULL);
            if let Member::Node(node) = &field.member {
                trace!(field = %path, value = %value, "composing struct member");
                node.compose_in(stream, value, &scope)?;
            }
        }
        Ok(())
    }
}

/// A node repeated a counted number of times, or until the stream ends.
#[derive(Debug, Clone)]
pub struct ArrayNode {
    pub size: Size,
    pub item: Box<FormatNode>,
}

impl ArrayNode {
    pub fn new(size: impl Into<Size>, item: FormatNode) -> Self {
        Self {
            size: size.into(),
            item: Box::new(item),
        }
    }

    pub(crate) fn parse_in(&self, stream: &mut BitStream<'_>, scope: &Scope<'_>) -> Result<Value> {
        let mut items = Vec::new();
        if self.size.is_to_end() {
            while !stream.at_end()? {
                items.push(self.item.parse_in(stream, scope)?);
            }
        } else {
            let count = self.size.resolve(stream, scope)?;
            for _ in 0..count {
                items.push(self.item.parse_in(stream, scope)?);
            }
        }
        Ok(Value::Array(items))
    }

    pub(crate) fn compose_in(
        &self,
        stream: &mut BitStream<'_>,
        value: &Value,
        scope: &Scope<'_>,
    ) -> Result<()> {
        let items = value.as_array().ok_or_else(|| {
            Error::format(format!("array expects a list, got {}", value.kind_name()))
        })?;

        self.size.compose_count(stream, items.len(), scope)?;
        for item in items {
            self.item.compose_in(stream, item, scope)?;
        }
        Ok(())
    }
}
