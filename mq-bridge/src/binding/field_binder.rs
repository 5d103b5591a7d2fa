/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{trace, warn};

use crate::binding::FieldValue;
use crate::common::{
    BridgeError, ConversionError, FieldType, Result, TransportError, TypeConverter,
};
use crate::message::{Message, ProducerSettings, PropertySet};

/// Type-erased setter for one outbound facet. Receives an already converted value.
type Mutator<T> = Arc<dyn Fn(&mut T, Value) -> Result<()> + Send + Sync>;

/// Type-erased getter for one inbound field.
type Accessor = Arc<dyn Fn(&Message) -> std::result::Result<Value, TransportError> + Send + Sync>;

/// One named outbound binding onto a producer or a message.
struct OutboundBinding<T> {
    field_type: FieldType,
    mutator: Mutator<T>,
}

impl<T> Clone for OutboundBinding<T> {
    fn clone(&self) -> Self {
        Self {
            field_type: self.field_type,
            mutator: self.mutator.clone(),
        }
    }
}

/// One named inbound binding off a message.
#[derive(Clone)]
struct InboundBinding {
    field_type: FieldType,
    accessor: Accessor,
}

/// String-keyed header binding tables for both directions.
///
/// Outbound names resolve against a producer-level and a message-level table;
/// a name present in both is applied to both. Inbound names resolve against
/// a single accessor table. The tables are built once through
/// [`FieldBinderTable::builder`] and are immutable afterwards, so a table can
/// be shared behind an `Arc` without locking.
#[derive(Clone)]
pub struct FieldBinderTable {
    producer: HashMap<String, OutboundBinding<ProducerSettings>>,
    message: HashMap<String, OutboundBinding<Message>>,
    inbound: HashMap<String, InboundBinding>,
    converter: Arc<dyn TypeConverter>,
}

impl fmt::Debug for FieldBinderTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut producer: Vec<_> = self.producer.keys().collect();
        let mut message: Vec<_> = self.message.keys().collect();
        let mut inbound: Vec<_> = self.inbound.keys().collect();
        producer.sort();
        message.sort();
        inbound.sort();
        f.debug_struct("FieldBinderTable")
            .field("producer", &producer)
            .field("message", &message)
            .field("inbound", &inbound)
            .field("converter", &self.converter)
            .finish()
    }
}

impl FieldBinderTable {
    /// Starts an empty table that coerces values with `converter`.
    pub fn builder(converter: Arc<dyn TypeConverter>) -> FieldBinderTableBuilder {
        FieldBinderTableBuilder {
            table: Self {
                producer: HashMap::new(),
                message: HashMap::new(),
                inbound: HashMap::new(),
                converter,
            },
        }
    }

    /// The converter used for every binding in this table.
    pub fn converter(&self) -> &Arc<dyn TypeConverter> {
        &self.converter
    }

    /// Returns `true` if `name` has a producer-level or message-level binding.
    pub fn supports_outbound(&self, name: &str) -> bool {
        self.producer.contains_key(name) || self.message.contains_key(name)
    }

    /// Returns `true` if `name` has an inbound binding.
    pub fn supports_inbound(&self, name: &str) -> bool {
        self.inbound.contains_key(name)
    }

    /// Applies one property to the producer and/or the message.
    ///
    /// Conversion or assignment failures are logged and the property is
    /// skipped; a header that cannot be set does not abort the send.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UnsupportedProperty`] if `name` resolves to
    /// neither outbound table.
    pub fn apply_outbound(
        &self,
        producer: &mut ProducerSettings,
        message: &mut Message,
        name: &str,
        value: &Value,
    ) -> Result<()> {
        let producer_binding = self.producer.get(name);
        let message_binding = self.message.get(name);
        if producer_binding.is_none() && message_binding.is_none() {
            return Err(BridgeError::UnsupportedProperty {
                name: name.to_string(),
                value: value.clone(),
            });
        }

        if let Some(binding) = producer_binding {
            if let Err(e) = self.assign(binding, producer, value) {
                warn!(property = name, error = %e, "Failed to assign producer property, skipping");
            } else {
                trace!(property = name, %value, "Assigned producer property");
            }
        }
        if let Some(binding) = message_binding {
            if let Err(e) = self.assign(binding, message, value) {
                warn!(property = name, error = %e, "Failed to assign message property, skipping");
            } else {
                trace!(property = name, %value, "Assigned message property");
            }
        }
        Ok(())
    }

    /// Applies every property in order.
    ///
    /// # Errors
    ///
    /// Stops at the first name with no outbound binding.
    pub fn apply_all(
        &self,
        producer: &mut ProducerSettings,
        message: &mut Message,
        properties: &PropertySet,
    ) -> Result<()> {
        for (name, value) in properties.iter() {
            self.apply_outbound(producer, message, name, value)?;
        }
        Ok(())
    }

    /// Reads a field off a message and converts it to `target`.
    ///
    /// Absent optional headers read as `Value::Null`.
    ///
    /// # Errors
    ///
    /// * [`BridgeError::UnresolvedField`] if `name` has no inbound binding.
    /// * [`BridgeError::FieldRead`] if the accessor fails on this message.
    /// * [`BridgeError::Conversion`] if the value cannot become `target`.
    pub fn read_inbound(&self, message: &Message, name: &str, target: FieldType) -> Result<Value> {
        let binding = self
            .inbound
            .get(name)
            .ok_or_else(|| BridgeError::UnresolvedField(name.to_string()))?;
        let raw = (binding.accessor)(message).map_err(|source| BridgeError::FieldRead {
            name: name.to_string(),
            source,
        })?;
        trace!(field = name, bound = %binding.field_type, %target, "Read inbound field");
        Ok(self.converter.convert(&raw, target)?)
    }

    /// Reads a field and extracts it as `V`.
    ///
    /// # Errors
    ///
    /// As [`read_inbound`](Self::read_inbound), plus [`BridgeError::Conversion`]
    /// when an absent header is read into a non-optional type.
    pub fn read_inbound_as<V: FieldValue>(&self, message: &Message, name: &str) -> Result<V> {
        let value = self.read_inbound(message, name, V::FIELD_TYPE)?;
        let rendered = value.to_string();
        V::from_value(value).ok_or_else(|| {
            BridgeError::Conversion(ConversionError {
                value: rendered,
                target: V::FIELD_TYPE.name(),
            })
        })
    }

    /// Reads several fields into a [`BoundFields`] map.
    ///
    /// # Errors
    ///
    /// Fails on the first field that cannot be read.
    pub fn read_all<'a, I>(&self, message: &Message, fields: I) -> Result<BoundFields>
    where
        I: IntoIterator<Item = (&'a str, FieldType)>,
    {
        let mut bound = IndexMap::new();
        for (name, target) in fields {
            let value = self.read_inbound(message, name, target)?;
            bound.insert(name.to_string(), value);
        }
        Ok(BoundFields(bound))
    }

    fn assign<T>(&self, binding: &OutboundBinding<T>, target: &mut T, value: &Value) -> Result<()> {
        let converted = self.converter.convert(value, binding.field_type)?;
        (binding.mutator)(target, converted)
    }
}

/// Builds a [`FieldBinderTable`].
pub struct FieldBinderTableBuilder {
    table: FieldBinderTable,
}

impl FieldBinderTableBuilder {
    /// Registers a producer-level outbound binding.
    #[must_use]
    pub fn register_producer<V, F>(mut self, name: &str, setter: F) -> Self
    where
        V: FieldValue,
        F: Fn(&mut ProducerSettings, V) -> std::result::Result<(), TransportError>
            + Send
            + Sync
            + 'static,
    {
        self.table
            .producer
            .insert(name.to_string(), outbound_binding(name, setter));
        self
    }

    /// Registers a message-level outbound binding.
    #[must_use]
    pub fn register_message<V, F>(mut self, name: &str, setter: F) -> Self
    where
        V: FieldValue,
        F: Fn(&mut Message, V) -> std::result::Result<(), TransportError> + Send + Sync + 'static,
    {
        self.table
            .message
            .insert(name.to_string(), outbound_binding(name, setter));
        self
    }

    /// Registers an inbound binding.
    #[must_use]
    pub fn register_inbound<V, F>(mut self, name: &str, getter: F) -> Self
    where
        V: FieldValue,
        F: Fn(&Message) -> std::result::Result<V, TransportError> + Send + Sync + 'static,
    {
        let accessor: Accessor = Arc::new(move |message: &Message| getter(message).map(V::into_value));
        self.table.inbound.insert(
            name.to_string(),
            InboundBinding {
                field_type: V::FIELD_TYPE,
                accessor,
            },
        );
        self
    }

    /// Finishes the table.
    #[must_use]
    pub fn build(self) -> FieldBinderTable {
        self.table
    }
}

fn outbound_binding<T, V, F>(name: &str, setter: F) -> OutboundBinding<T>
where
    T: 'static,
    V: FieldValue,
    F: Fn(&mut T, V) -> std::result::Result<(), TransportError> + Send + Sync + 'static,
{
    let name = name.to_string();
    let mutator: Mutator<T> = Arc::new(move |target: &mut T, value: Value| {
        let rendered = value.to_string();
        let typed = V::from_value(value).ok_or_else(|| {
            BridgeError::Conversion(ConversionError {
                value: rendered,
                target: V::FIELD_TYPE.name(),
            })
        })?;
        setter(target, typed).map_err(|e| {
            tracing::debug!(property = %name, error = %e, "Transport rejected property");
            BridgeError::Transport(e)
        })
    });
    OutboundBinding {
        field_type: V::FIELD_TYPE,
        mutator,
    }
}

/// Header values bound for one handler invocation, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundFields(IndexMap<String, Value>);

impl BoundFields {
    /// The converted value for `name`, if it was bound.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// The bound value for `name` extracted as `V`.
    ///
    /// Returns `None` if the field was not bound, the header was absent, or
    /// the value does not have the shape of `V`.
    pub fn get<V: FieldValue>(&self, name: &str) -> Option<V> {
        self.0
            .get(name)
            .filter(|value| !value.is_null())
            .cloned()
            .and_then(V::from_value)
    }

    /// Number of bound fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing was bound.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::DefaultTypeConverter;

    fn table() -> FieldBinderTable {
        FieldBinderTable::builder(Arc::new(DefaultTypeConverter))
            .register_producer("priority", |p: &mut ProducerSettings, v: i32| p.set_priority(v))
            .register_message("priority", |m: &mut Message, v: i32| m.set_priority(v))
            .register_message("type", |m: &mut Message, v: Option<String>| {
                m.set_jms_type(v);
                Ok(())
            })
            .register_inbound("type", |m: &Message| Ok(m.jms_type().map(str::to_string)))
            .register_inbound("broken", |_: &Message| -> std::result::Result<String, TransportError> {
                Err(TransportError::SessionClosed)
            })
            .build()
    }

    #[test]
    fn unknown_outbound_name_is_rejected() {
        let table = table();
        let mut producer = ProducerSettings::default();
        let mut message = Message::default();
        let err = table
            .apply_outbound(&mut producer, &mut message, "colour", &Value::from("red"))
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedProperty { ref name, .. } if name == "colour"));
    }

    #[test]
    fn name_in_both_tables_sets_both_facets() {
        let table = table();
        let mut producer = ProducerSettings::default();
        let mut message = Message::default();
        table
            .apply_outbound(&mut producer, &mut message, "priority", &Value::from("8"))
            .unwrap();
        assert_eq!(producer.priority, 8);
        assert_eq!(message.priority(), 8);
    }

    #[test]
    fn failed_conversion_is_skipped_not_fatal() {
        let table = table();
        let mut producer = ProducerSettings::default();
        let mut message = Message::default();
        table
            .apply_outbound(&mut producer, &mut message, "priority", &Value::from("high"))
            .unwrap();
        table
            .apply_outbound(&mut producer, &mut message, "priority", &Value::from(42))
            .unwrap();
        assert_eq!(producer, ProducerSettings::default());
        assert_eq!(message.priority(), crate::message::DEFAULT_PRIORITY);
    }

    #[test]
    fn inbound_errors_are_distinguished() {
        let table = table();
        let message = Message::default();
        assert!(matches!(
            table.read_inbound(&message, "missing", FieldType::Text),
            Err(BridgeError::UnresolvedField(ref name)) if name == "missing"
        ));
        assert!(matches!(
            table.read_inbound(&message, "broken", FieldType::Text),
            Err(BridgeError::FieldRead { .. })
        ));
    }

    #[test]
    fn absent_header_reads_as_none() {
        let table = table();
        let value: Option<String> = table.read_inbound_as(&Message::default(), "type").unwrap();
        assert!(value.is_none());
        assert!(table.read_inbound_as::<String>(&Message::default(), "type").is_err());
    }

    #[test]
    fn bound_fields_extract_typed_values() {
        let table = table();
        let mut message = Message::default();
        message.set_jms_type(Some("order".to_string()));
        let fields = table.read_all(&message, [("type", FieldType::Text)]).unwrap();
        assert_eq!(fields.get::<String>("type").as_deref(), Some("order"));
        assert_eq!(fields.get::<String>("other"), None);
    }
}
