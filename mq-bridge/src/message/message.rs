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

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::TransportError;
use crate::message::CorrelationId;

/// Delivery mode for messages that may be lost on provider restart.
pub const DELIVERY_MODE_NON_PERSISTENT: i32 = 1;
/// Delivery mode for messages the provider must retain across restarts.
pub const DELIVERY_MODE_PERSISTENT: i32 = 2;
/// Priority assigned when none is set.
pub const DEFAULT_PRIORITY: i32 = 4;

/// Whether a destination is point-to-point or publish/subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DestinationKind {
    /// Each message is delivered to exactly one consumer.
    #[default]
    Queue,
    /// Each message is delivered to every current subscriber.
    Topic,
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queue => write!(f, "queue"),
            Self::Topic => write!(f, "topic"),
        }
    }
}

/// An addressable queue or topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    /// The provider-level destination name.
    pub name: String,
    /// Queue or topic.
    #[serde(default)]
    pub kind: DestinationKind,
}

impl Destination {
    /// Creates a destination of the given kind.
    pub fn new(name: impl Into<String>, kind: DestinationKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Creates a queue destination.
    pub fn queue(name: impl Into<String>) -> Self {
        Self::new(name, DestinationKind::Queue)
    }

    /// Creates a topic destination.
    pub fn topic(name: impl Into<String>) -> Self {
        Self::new(name, DestinationKind::Topic)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:///{}", self.kind, self.name)
    }
}

/// Producer-level facets applied to every message sent with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerSettings {
    /// Minimum delay in milliseconds before the provider delivers the message.
    pub delivery_delay: i64,
    /// Hint that the provider need not assign a message id.
    pub disable_message_id: bool,
    /// Hint that the provider need not assign a timestamp.
    pub disable_message_timestamp: bool,
    /// Type stamped on messages that carry none of their own.
    pub jms_type: Option<String>,
    /// Priority stamped on sent messages.
    pub priority: i32,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            delivery_delay: 0,
            disable_message_id: false,
            disable_message_timestamp: false,
            jms_type: None,
            priority: DEFAULT_PRIORITY,
        }
    }
}

impl ProducerSettings {
    /// Sets the priority, rejecting values outside `0..=9`.
    pub fn set_priority(&mut self, priority: i32) -> Result<(), TransportError> {
        self.priority = validate_priority(priority)?;
        Ok(())
    }

    /// Sets the delivery delay, rejecting negative values.
    pub fn set_delivery_delay(&mut self, delay_ms: i64) -> Result<(), TransportError> {
        if delay_ms < 0 {
            return Err(TransportError::InvalidField {
                field: "deliveryDelay".to_string(),
                reason: format!("{delay_ms} is negative"),
            });
        }
        self.delivery_delay = delay_ms;
        Ok(())
    }
}

/// A text message with its headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    body: Option<String>,
    message_id: Option<String>,
    timestamp: i64,
    correlation_id: Option<CorrelationId>,
    reply_to: Option<Destination>,
    destination: Option<Destination>,
    delivery_mode: i32,
    redelivered: bool,
    jms_type: Option<String>,
    expiration: i64,
    delivery_time: i64,
    priority: i32,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            body: None,
            message_id: None,
            timestamp: 0,
            correlation_id: None,
            reply_to: None,
            destination: None,
            delivery_mode: DELIVERY_MODE_PERSISTENT,
            redelivered: false,
            jms_type: None,
            expiration: 0,
            delivery_time: 0,
            priority: DEFAULT_PRIORITY,
        }
    }
}

impl Message {
    /// Creates a message carrying the given text body.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            ..Self::default()
        }
    }

    /// Creates a message with an optional body.
    pub fn with_body(body: Option<String>) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }

    /// The text body, if any.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: Option<String>) {
        self.body = body;
    }

    /// The provider-assigned message id.
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Sets the message id.
    pub fn set_message_id(&mut self, id: Option<String>) {
        self.message_id = id;
    }

    /// Send timestamp in milliseconds since the Unix epoch.
    pub const fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Sets the send timestamp.
    pub fn set_timestamp(&mut self, millis: i64) {
        self.timestamp = millis;
    }

    /// The correlation id linking a reply to its request.
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.correlation_id.as_ref()
    }

    /// Sets the correlation id.
    pub fn set_correlation_id(&mut self, id: Option<CorrelationId>) {
        self.correlation_id = id;
    }

    /// Where replies should be sent.
    pub fn reply_to(&self) -> Option<&Destination> {
        self.reply_to.as_ref()
    }

    /// Sets the reply-to destination.
    pub fn set_reply_to(&mut self, destination: Option<Destination>) {
        self.reply_to = destination;
    }

    /// The destination the message was sent to.
    pub fn destination(&self) -> Option<&Destination> {
        self.destination.as_ref()
    }

    /// Sets the destination header. Providers stamp this on send.
    pub fn set_destination(&mut self, destination: Option<Destination>) {
        self.destination = destination;
    }

    /// Persistent or non-persistent delivery.
    pub const fn delivery_mode(&self) -> i32 {
        self.delivery_mode
    }

    /// Sets the delivery mode, rejecting unknown modes.
    pub fn set_delivery_mode(&mut self, mode: i32) -> Result<(), TransportError> {
        if mode != DELIVERY_MODE_NON_PERSISTENT && mode != DELIVERY_MODE_PERSISTENT {
            return Err(TransportError::InvalidField {
                field: "deliveryMode".to_string(),
                reason: format!("{mode} is not a delivery mode"),
            });
        }
        self.delivery_mode = mode;
        Ok(())
    }

    /// Whether the provider has delivered this message before.
    pub const fn redelivered(&self) -> bool {
        self.redelivered
    }

    /// Marks the message as redelivered.
    pub fn set_redelivered(&mut self, redelivered: bool) {
        self.redelivered = redelivered;
    }

    /// The application-defined message type.
    pub fn jms_type(&self) -> Option<&str> {
        self.jms_type.as_deref()
    }

    /// Sets the message type.
    pub fn set_jms_type(&mut self, jms_type: Option<String>) {
        self.jms_type = jms_type;
    }

    /// Expiry time in milliseconds since the epoch; zero never expires.
    pub const fn expiration(&self) -> i64 {
        self.expiration
    }

    /// Sets the expiry time.
    pub fn set_expiration(&mut self, millis: i64) {
        self.expiration = millis;
    }

    /// Earliest delivery time in milliseconds since the epoch.
    pub const fn delivery_time(&self) -> i64 {
        self.delivery_time
    }

    /// Sets the earliest delivery time.
    pub fn set_delivery_time(&mut self, millis: i64) {
        self.delivery_time = millis;
    }

    /// Priority in `0..=9`.
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Sets the priority, rejecting values outside `0..=9`.
    pub fn set_priority(&mut self, priority: i32) -> Result<(), TransportError> {
        self.priority = validate_priority(priority)?;
        Ok(())
    }
}

fn validate_priority(priority: i32) -> Result<i32, TransportError> {
    if (0..=9).contains(&priority) {
        Ok(priority)
    } else {
        Err(TransportError::InvalidField {
            field: "priority".to_string(),
            reason: format!("{priority} is outside 0..=9"),
        })
    }
}
