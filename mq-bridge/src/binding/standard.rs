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

use std::sync::Arc;

use crate::binding::FieldBinderTable;
use crate::common::TypeConverter;
use crate::message::{CorrelationId, Message, ProducerSettings};

impl FieldBinderTable {
    /// Builds the table of standard message headers.
    ///
    /// Producer-level: `deliveryDelay`, `disableMessageId`,
    /// `disableMessageTimestamp`, `jmsType`, `priority`.
    ///
    /// Message-level: `correlationId`, `deliveryMode`, `expiration`,
    /// `messageId`, `type`.
    ///
    /// Inbound: `messageId`, `timestamp`, `correlationId`, `replyTo`,
    /// `destination`, `deliveryMode`, `redelivered`, `type`, `expiration`,
    /// `deliveryTime`, `priority`.
    pub fn standard(converter: Arc<dyn TypeConverter>) -> Self {
        Self::builder(converter)
            // producer
            .register_producer("deliveryDelay", |p: &mut ProducerSettings, v: i64| {
                p.set_delivery_delay(v)
            })
            .register_producer("disableMessageId", |p: &mut ProducerSettings, v: bool| {
                p.disable_message_id = v;
                Ok(())
            })
            .register_producer(
                "disableMessageTimestamp",
                |p: &mut ProducerSettings, v: bool| {
                    p.disable_message_timestamp = v;
                    Ok(())
                },
            )
            .register_producer("jmsType", |p: &mut ProducerSettings, v: Option<String>| {
                p.jms_type = v;
                Ok(())
            })
            .register_producer("priority", |p: &mut ProducerSettings, v: i32| p.set_priority(v))
            // message
            .register_message("correlationId", |m: &mut Message, v: Option<String>| {
                m.set_correlation_id(v.map(CorrelationId::from));
                Ok(())
            })
            .register_message("deliveryMode", |m: &mut Message, v: i32| m.set_delivery_mode(v))
            .register_message("expiration", |m: &mut Message, v: i64| {
                m.set_expiration(v);
                Ok(())
            })
            .register_message("messageId", |m: &mut Message, v: Option<String>| {
                m.set_message_id(v);
                Ok(())
            })
            .register_message("type", |m: &mut Message, v: Option<String>| {
                m.set_jms_type(v);
                Ok(())
            })
            // inbound
            .register_inbound("messageId", |m: &Message| {
                Ok(m.message_id().map(str::to_string))
            })
            .register_inbound("timestamp", |m: &Message| Ok(m.timestamp()))
            .register_inbound("correlationId", |m: &Message| {
                Ok(m.correlation_id().cloned())
            })
            .register_inbound("replyTo", |m: &Message| Ok(m.reply_to().cloned()))
            .register_inbound("destination", |m: &Message| {
                Ok(m.destination().cloned())
            })
            .register_inbound("deliveryMode", |m: &Message| Ok(m.delivery_mode()))
            .register_inbound("redelivered", |m: &Message| Ok(m.redelivered()))
            .register_inbound("type", |m: &Message| Ok(m.jms_type().map(str::to_string)))
            .register_inbound("expiration", |m: &Message| Ok(m.expiration()))
            .register_inbound("deliveryTime", |m: &Message| Ok(m.delivery_time()))
            .register_inbound("priority", |m: &Message| Ok(m.priority()))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::common::{DefaultTypeConverter, FieldType};
    use crate::message::{Destination, PropertySet};

    fn standard() -> FieldBinderTable {
        FieldBinderTable::standard(Arc::new(DefaultTypeConverter))
    }

    #[test]
    fn type_round_trips_through_both_directions() {
        let table = standard();
        let mut producer = ProducerSettings::default();
        let mut message = Message::default();
        table
            .apply_outbound(&mut producer, &mut message, "type", &Value::from("order.created"))
            .unwrap();
        let read: String = table.read_inbound_as(&message, "type").unwrap();
        assert_eq!(read, "order.created");
    }

    #[test]
    fn producer_facets_are_applied() {
        let table = standard();
        let mut properties = PropertySet::new();
        properties.insert("priority", "9");
        properties.insert("deliveryDelay", 250);
        properties.insert("disableMessageId", "true");
        properties.insert("jmsType", "audit");

        let mut producer = ProducerSettings::default();
        let mut message = Message::default();
        table.apply_all(&mut producer, &mut message, &properties).unwrap();

        assert_eq!(producer.priority, 9);
        assert_eq!(producer.delivery_delay, 250);
        assert!(producer.disable_message_id);
        assert_eq!(producer.jms_type.as_deref(), Some("audit"));
    }

    #[test]
    fn numeric_headers_read_as_text() {
        let table = standard();
        let mut message = Message::default();
        message.set_expiration(1_700_000_000_000);
        let value = table.read_inbound(&message, "expiration", FieldType::Text).unwrap();
        assert_eq!(value, Value::from("1700000000000"));
    }

    #[test]
    fn reply_to_reads_as_destination_or_text() {
        let table = standard();
        let mut message = Message::default();
        message.set_reply_to(Some(Destination::queue("REPLIES")));
        let reply_to: Destination = table.read_inbound_as(&message, "replyTo").unwrap();
        assert_eq!(reply_to, Destination::queue("REPLIES"));
        let text = table.read_inbound(&message, "replyTo", FieldType::Text).unwrap();
        assert_eq!(text, Value::from("queue:///REPLIES"));
    }

    #[test]
    fn invalid_delivery_mode_is_skipped() {
        let table = standard();
        let mut producer = ProducerSettings::default();
        let mut message = Message::default();
        table
            .apply_outbound(&mut producer, &mut message, "deliveryMode", &Value::from(7))
            .unwrap();
        assert_eq!(message.delivery_mode(), crate::message::DELIVERY_MODE_PERSISTENT);
    }
}
