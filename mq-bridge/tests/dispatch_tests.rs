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
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mq_bridge::prelude::*;
use serde::{Deserialize, Serialize};

use crate::setup::*;

mod setup;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    id: u32,
    quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Receipt {
    order_id: u32,
    kind: Option<String>,
    priority: i32,
}

/// Replies with a receipt carrying the bound `type` and `priority` headers.
#[derive(Debug, Default)]
struct ReceiptHandler {
    invoked: AtomicBool,
}

#[async_trait]
impl MessageHandler for ReceiptHandler {
    type Body = Order;
    type Output = Receipt;

    fn fields(&self) -> Vec<FieldParameter> {
        vec![
            FieldParameter::of::<Option<String>>("type"),
            FieldParameter::of::<i32>("priority"),
        ]
    }

    async fn handle(&self, order: Order, fields: BoundFields) -> anyhow::Result<Receipt> {
        self.invoked.store(true, Ordering::SeqCst);
        if order.quantity == 0 {
            anyhow::bail!("empty order {}", order.id);
        }
        Ok(Receipt {
            order_id: order.id,
            kind: fields.get("type"),
            priority: fields.get("priority").unwrap_or_default(),
        })
    }
}

fn adapter(bridge: &MessagingBridge) -> DispatchAdapter {
    DispatchAdapter::new(bridge.binder().clone(), bridge.codec().clone())
}

fn inbound(body: &str, reply_to: Option<Destination>, correlation_id: &str) -> Message {
    let mut message = Message::text(body);
    message.set_reply_to(reply_to);
    message.set_correlation_id(Some(CorrelationId::from(correlation_id)));
    message.set_jms_type(Some("order.placed".to_string()));
    message
}

#[tokio::test]
async fn test_reply_carries_inbound_correlation_id() -> anyhow::Result<()> {
    initialize_tracing();
    let (broker, bridge) = bridge();
    let replies = Destination::queue("ORDERS.REPLY");
    let session = broker.factory().create_session().await?;
    let mut reply_consumer = session.subscribe(&replies, None).await?;

    let handler = ReceiptHandler::default();
    adapter(&bridge)
        .dispatch(
            session.as_ref(),
            inbound(r#"{"id":7,"quantity":3}"#, Some(replies.clone()), "abc"),
            &handler,
        )
        .await?;

    let reply = reply_consumer.receive().await.expect("one reply");
    assert_eq!(reply.correlation_id().map(CorrelationId::as_str), Some("abc"));
    let expected = Receipt {
        order_id: 7,
        kind: Some("order.placed".to_string()),
        priority: DEFAULT_PRIORITY,
    };
    let receipt: Receipt = serde_json::from_str(reply.body().unwrap_or_default())?;
    assert_eq!(receipt, expected);

    let second = tokio::time::timeout(Duration::from_millis(50), reply_consumer.receive()).await;
    assert!(second.is_err(), "exactly one reply expected");
    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_no_reply_without_reply_address() -> anyhow::Result<()> {
    initialize_tracing();
    let (broker, bridge) = bridge();
    let session = broker.factory().create_session().await?;

    let handler = ReceiptHandler::default();
    adapter(&bridge)
        .dispatch(
            session.as_ref(),
            inbound(r#"{"id":1,"quantity":1}"#, None, "abc"),
            &handler,
        )
        .await?;

    assert!(handler.invoked.load(Ordering::SeqCst));
    assert_eq!(broker.pending_count(&Destination::queue("ORDERS.REPLY")), 0);
    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_handler_error_sends_no_reply() -> anyhow::Result<()> {
    initialize_tracing();
    let (broker, bridge) = bridge();
    let replies = Destination::queue("ORDERS.REPLY");
    let session = broker.factory().create_session().await?;

    let err = adapter(&bridge)
        .dispatch(
            session.as_ref(),
            inbound(r#"{"id":9,"quantity":0}"#, Some(replies.clone()), "abc"),
            &ReceiptHandler::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::HandlerInvocation(ref reason) if reason.contains("empty order 9")));
    assert_eq!(broker.pending_count(&replies), 0);
    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_undecodable_body_skips_handler() -> anyhow::Result<()> {
    initialize_tracing();
    let (broker, bridge) = bridge();
    let session = broker.factory().create_session().await?;
    let handler = ReceiptHandler::default();

    let err = adapter(&bridge)
        .dispatch(session.as_ref(), inbound("not an order", None, "abc"), &handler)
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::Codec(CodecError::Decode { .. })));
    assert!(!handler.invoked.load(Ordering::SeqCst));
    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_unknown_field_parameter_is_unresolved() -> anyhow::Result<()> {
    initialize_tracing();
    let (broker, bridge) = bridge();
    let session = broker.factory().create_session().await?;
    let invoked = Arc::new(AtomicBool::new(false));
    let flag = invoked.clone();
    let handler = FnHandler::new(move |_body: String, _fields: BoundFields| {
        let flag = flag.clone();
        async move {
            flag.store(true, Ordering::SeqCst);
            Ok::<_, anyhow::Error>(())
        }
    })
    .with_field("colour", FieldType::Text);

    let err = adapter(&bridge)
        .dispatch(session.as_ref(), Message::text("x"), &handler)
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::UnresolvedField(ref name) if name == "colour"));
    assert!(!invoked.load(Ordering::SeqCst));
    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_listener_replies_through_supervisor() -> anyhow::Result<()> {
    initialize_tracing();
    let (broker, bridge) = bridge();
    let requests = Destination::queue("ORDERS.IN");
    let replies = Destination::queue("ORDERS.REPLY");

    let registration = bridge
        .register_listener(
            ListenerDeclaration::new(CONNECTION, requests.clone()),
            ReceiptHandler::default(),
        )
        .await?;
    wait_for_state(&registration, ListenerState::Running).await?;

    let session = broker.factory().create_session().await?;
    let mut reply_consumer = session
        .subscribe(&replies, Some(Selector::CorrelationId(CorrelationId::from("abc"))))
        .await?;
    let mut producer = ProducerSettings::default();
    producer.set_priority(8)?;
    session
        .send(
            &requests,
            &producer,
            inbound(r#"{"id":3,"quantity":1}"#, Some(replies.clone()), "abc"),
        )
        .await?;

    let reply = tokio::time::timeout(Duration::from_secs(2), reply_consumer.receive())
        .await?
        .expect("reply");
    let receipt: Receipt = serde_json::from_str(reply.body().unwrap_or_default())?;
    assert_eq!(receipt.order_id, 3);
    assert_eq!(receipt.priority, 8);

    session.close().await;
    bridge.shutdown().await;
    Ok(())
}
