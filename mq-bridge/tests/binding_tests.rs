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

use mq_bridge::prelude::*;
use serde_json::Value;

use crate::setup::*;

mod setup;

fn standard() -> FieldBinderTable {
    FieldBinderTable::standard(Arc::new(DefaultTypeConverter))
}

#[test]
fn test_outbound_values_read_back_after_coercion() -> anyhow::Result<()> {
    let table = standard();
    let mut properties = PropertySet::new();
    properties.insert("type", "order.created");
    properties.insert("correlationId", "abc");
    properties.insert("deliveryMode", "1");
    properties.insert("expiration", 1_700_000_000_000_i64);
    properties.insert("messageId", "ID:42");

    let mut producer = ProducerSettings::default();
    let mut message = Message::default();
    table.apply_all(&mut producer, &mut message, &properties)?;

    assert_eq!(table.read_inbound_as::<String>(&message, "type")?, "order.created");
    assert_eq!(table.read_inbound_as::<String>(&message, "correlationId")?, "abc");
    assert_eq!(
        table.read_inbound_as::<i32>(&message, "deliveryMode")?,
        DELIVERY_MODE_NON_PERSISTENT
    );
    assert_eq!(table.read_inbound_as::<i64>(&message, "expiration")?, 1_700_000_000_000);
    assert_eq!(
        table.read_inbound(&message, "expiration", FieldType::Text)?,
        Value::from("1700000000000")
    );
    assert_eq!(table.read_inbound_as::<String>(&message, "messageId")?, "ID:42");
    Ok(())
}

#[test]
fn test_unknown_outbound_property_is_named() {
    let table = standard();
    let mut properties = PropertySet::new();
    properties.insert("type", "ok");
    properties.insert("P", 1);

    let err = table
        .apply_all(&mut ProducerSettings::default(), &mut Message::default(), &properties)
        .unwrap_err();
    assert!(matches!(err, BridgeError::UnsupportedProperty { ref name, .. } if name == "P"));
}

#[test]
fn test_inbound_only_fields_are_not_writable() {
    let table = standard();
    assert!(table.supports_inbound("redelivered"));
    assert!(!table.supports_outbound("redelivered"));
    assert!(table.supports_outbound("deliveryDelay"));
    assert!(!table.supports_inbound("deliveryDelay"));
}

#[test]
fn test_declared_null_leaves_header_unset() -> anyhow::Result<()> {
    let table = standard();
    let properties = PropertySet::collect(&[PropertyDeclaration::named("type")], Vec::new());
    let mut message = Message::default();
    table.apply_all(&mut ProducerSettings::default(), &mut message, &properties)?;
    assert_eq!(message.jms_type(), None);
    Ok(())
}

#[test]
fn test_custom_table_binds_application_headers() -> anyhow::Result<()> {
    let table = FieldBinderTable::builder(Arc::new(DefaultTypeConverter))
        .register_message("tenant", |message: &mut Message, tenant: String| {
            message.set_jms_type(Some(format!("tenant:{tenant}")));
            Ok(())
        })
        .register_inbound("tenant", |message: &Message| {
            Ok(message
                .jms_type()
                .and_then(|kind| kind.strip_prefix("tenant:"))
                .map(str::to_string))
        })
        .build();

    let mut message = Message::default();
    table.apply_outbound(
        &mut ProducerSettings::default(),
        &mut message,
        "tenant",
        &Value::from(17),
    )?;
    assert_eq!(table.read_inbound_as::<String>(&message, "tenant")?, "17");
    Ok(())
}

#[tokio::test]
async fn test_headers_survive_the_transport() -> anyhow::Result<()> {
    initialize_tracing();
    let (broker, bridge) = bridge();
    let queue = Destination::queue("HEADERS");

    let request = ClientDeclaration::new(CONNECTION, queue.clone())
        .with_property(PropertyDeclaration::new("type", "invoice"))
        .with_property(PropertyDeclaration::new("deliveryMode", DELIVERY_MODE_NON_PERSISTENT))
        .request(Some("body".to_string()), vec![("priority".to_string(), Value::from("7"))]);
    bridge.engine().send(request).await?;

    let session = broker.factory().create_session().await?;
    let mut consumer = session.subscribe(&queue, None).await?;
    let message = consumer.receive().await.expect("queued message");
    let table = bridge.binder();

    let fields = table.read_all(
        &message,
        [
            ("type", FieldType::Text),
            ("priority", FieldType::Integer),
            ("deliveryMode", FieldType::Integer),
            ("destination", FieldType::Text),
            ("messageId", FieldType::Text),
            ("redelivered", FieldType::Boolean),
        ],
    )?;
    assert_eq!(fields.get::<String>("type").as_deref(), Some("invoice"));
    assert_eq!(fields.get::<i32>("priority"), Some(7));
    assert_eq!(fields.get::<i32>("deliveryMode"), Some(DELIVERY_MODE_NON_PERSISTENT));
    assert_eq!(fields.get::<String>("destination").as_deref(), Some("queue:///HEADERS"));
    assert!(fields.get::<String>("messageId").is_some());
    assert_eq!(fields.get::<bool>("redelivered"), Some(false));

    session.close().await;
    Ok(())
}
