//! Record value decoders.
//!
//! - [`JsonDecoder`] deserializes a JSON payload into any serde type that
//!   knows how to project itself with [`ToAttributes`].
//! - [`FieldListDecoder`] projects a JSON object onto a configured list of
//!   fields, for deployments that have no compiled message type.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use topicsink_core::{AttrValue, AttributeMap, ToAttributes};

use crate::error::{ConnectorError, Result};
use crate::traits::MessageDecoder;

/// Decodes JSON payloads into `M`.
pub struct JsonDecoder<M> {
    _message: PhantomData<fn() -> M>,
}

impl<M> JsonDecoder<M> {
    pub fn new() -> Self {
        Self {
            _message: PhantomData,
        }
    }
}

impl<M> Default for JsonDecoder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for JsonDecoder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonDecoder")
            .field("message", &std::any::type_name::<M>())
            .finish()
    }
}

impl<M> MessageDecoder for JsonDecoder<M>
where
    M: DeserializeOwned + ToAttributes,
{
    type Message = M;

    fn decode(&self, value: &[u8]) -> Result<M> {
        Ok(serde_json::from_slice(value)?)
    }
}

/// A JSON object reduced to a declared set of scalar fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldListMessage {
    attributes: AttributeMap,
}

impl ToAttributes for FieldListMessage {
    fn to_attributes(&self) -> AttributeMap {
        self.attributes.clone()
    }
}

/// Decodes JSON objects, keeping exactly the declared fields.
///
/// Declared fields missing from the payload become `Null`; fields that are
/// not declared are dropped. A declared field holding an array or object
/// fails the record.
#[derive(Debug, Clone)]
pub struct FieldListDecoder {
    fields: Vec<String>,
}

impl FieldListDecoder {
    pub fn new(fields: Vec<String>) -> Result<Self> {
        if fields.is_empty() {
            return Err(ConnectorError::ConfigError(
                "field list decoder needs at least one field".to_string(),
            ));
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl MessageDecoder for FieldListDecoder {
    type Message = FieldListMessage;

    fn decode(&self, value: &[u8]) -> Result<FieldListMessage> {
        let parsed: serde_json::Value = serde_json::from_slice(value)?;
        let object = parsed.as_object().ok_or_else(|| {
            ConnectorError::SerializationError("record value must be a JSON object".to_string())
        })?;

        let mut attributes = AttributeMap::new();
        for field in &self.fields {
            let value = match object.get(field) {
                Some(v) => AttrValue::from_json(field, v)?,
                None => AttrValue::Null,
            };
            attributes.insert(field.clone(), value);
        }

        Ok(FieldListMessage { attributes })
    }
}
