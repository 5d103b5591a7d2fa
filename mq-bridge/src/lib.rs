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

#![forbid(unsafe_code)]
#![forbid(missing_docs)]

//! # MQ Bridge
//!
//! This crate lets application code call remote operations and handle inbound
//! events over a message-queue transport as if they were ordinary async calls.
//! The transport-facing plumbing (connection lookup, destination resolution,
//! header marshalling and fault recovery) is handled uniformly.
//!
//! ## Key Concepts
//!
//! - **Transport (`SessionFactory`, `Session`, `Consumer`)**: The capability
//!   traits a queue provider implements. An in-memory provider
//!   ([`MemoryBroker`](crate::prelude::MemoryBroker)) ships with the crate.
//! - **Registry (`TransportRegistry`)**: Named connection endpoints, resolved
//!   by logical name, plus a per-connection health probe.
//! - **Binding (`FieldBinderTable`)**: String-keyed tables of typed header
//!   mutators and accessors, with coercion through a `TypeConverter`.
//! - **Request/Reply (`RequestReplyEngine`)**: Sends one request, optionally
//!   waits for the single correlated reply, and decodes it.
//! - **Listeners (`ListenerRegistration`)**: Supervised consumer tasks that
//!   restart on transport faults and dispatch to typed handlers.
//! - **Bridge (`MessagingBridge`)**: Wires all of the above together.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mq_bridge::prelude::*;
//!
//! let broker = MemoryBroker::new();
//! let bridge = MessagingBridge::builder()
//!     .endpoint("orders", broker.factory())
//!     .build();
//!
//! let request = ClientDeclaration::new("orders", Destination::queue("ORDERS.IN"))
//!     .request(Some(r#"{"id":1}"#.to_string()), Vec::new());
//! bridge.engine().send(request).await?;
//! ```

/// Registry, configuration, codecs, conversion, errors and the bridge entry point.
pub(crate) mod common;

/// Message, destination and request data types.
pub(crate) mod message;

/// Transport capability traits.
pub(crate) mod traits;

/// Header and property binding tables.
pub(crate) mod binding;

/// Outbound request/reply engine and client declarations.
pub(crate) mod client;

/// Supervised listeners, dispatch adapter and handlers.
pub(crate) mod listener;

/// Bundled transport implementations.
pub(crate) mod transport;

/// A prelude module for conveniently importing the most commonly used items.
///
/// # Re-exports
///
/// ## External Crates
/// *   [`async_trait::async_trait`]: The macro for implementing the transport
///     and handler traits.
///
/// ## Core Types
/// *   [`crate::common::MessagingBridge`]: Entry point wiring every component.
/// *   [`crate::common::TransportRegistry`]: Named connection endpoints.
/// *   [`crate::common::BridgeConfig`]: TOML-backed configuration.
/// *   [`crate::binding::FieldBinderTable`]: Header binding tables.
/// *   [`crate::client::RequestReplyEngine`]: Outbound request/reply.
/// *   [`crate::listener::ListenerRegistration`]: A supervised listener.
/// *   [`crate::transport::MemoryBroker`]: In-memory transport provider.
pub mod prelude {
    pub use async_trait::async_trait;

    pub use crate::binding::{
        BoundFields, FieldBinderTable, FieldBinderTableBuilder, FieldType, FieldValue,
    };
    pub use crate::client::{
        ClientDeclaration, PropertyDeclaration, ReplyDeclaration, RequestReplyEngine,
        DEFAULT_REPLY_TIMEOUT,
    };
    pub use crate::common::{
        BridgeConfig, BridgeError, ClientConfig, CodecError, ConnectionConfig, ConversionError,
        DefaultTypeConverter, Endpoint, HealthReport, HealthStatus, JsonCodec, ListenerConfig,
        MessagingBridge, MessagingBridgeBuilder, ObjectCodec, Result, TransportError,
        TransportRegistry, TypeConverter,
    };
    pub use crate::listener::{
        DeclarationSource, DispatchAdapter, FieldParameter, FnHandler, ListenerContainer,
        ListenerDeclaration, ListenerRegistration, ListenerState, ListenerStats, MessageHandler,
    };
    pub use crate::message::{
        CorrelationId, Destination, DestinationKind, Message, OutboundRequest, ProducerSettings,
        PropertySet, ReplyTo, Selector, DELIVERY_MODE_NON_PERSISTENT, DELIVERY_MODE_PERSISTENT,
        DEFAULT_PRIORITY,
    };
    pub use crate::traits::{Consumer, FaultObserver, Session, SessionFactory};
    pub use crate::transport::{MemoryBroker, MemorySessionFactory};
}
