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

use std::time::Duration;

use serde_json::Value;

use crate::message::{Destination, OutboundRequest, PropertySet};

/// Default time to wait for a reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// A property attached to a client operation.
///
/// A declaration without a value contributes `null`, which leaves the header
/// unset unless a call-site value overrides it.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDeclaration {
    /// The binding name.
    pub name: String,
    /// The declared value.
    pub value: Option<Value>,
}

impl PropertyDeclaration {
    /// Declares `name` with a fixed value.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Declares `name` without a value.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

/// Where and how long to wait for a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyDeclaration {
    /// The reply destination.
    pub destination: Destination,
    /// How long to wait.
    pub timeout: Duration,
}

impl ReplyDeclaration {
    /// Waits on `destination` for the default timeout.
    pub fn new(destination: Destination) -> Self {
        Self {
            destination,
            timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    /// Overrides the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A declared outbound operation: the connection, the destination, an
/// optional reply address, and method-level properties.
///
/// ```rust,ignore
/// let place_order = ClientDeclaration::new("orders", Destination::queue("ORDERS.IN"))
///     .with_reply_to(ReplyDeclaration::new(Destination::queue("ORDERS.REPLY")))
///     .with_property(PropertyDeclaration::new("type", "order.place"));
///
/// let request = place_order.request(Some(body), vec![("priority".into(), 7.into())]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientDeclaration {
    /// Logical connection name.
    pub connection: String,
    /// Where requests go.
    pub destination: Destination,
    /// Present for request/reply operations.
    pub reply_to: Option<ReplyDeclaration>,
    /// Method-level properties, in declaration order.
    pub properties: Vec<PropertyDeclaration>,
}

impl ClientDeclaration {
    /// Declares a fire-and-forget operation.
    pub fn new(connection: impl Into<String>, destination: Destination) -> Self {
        Self {
            connection: connection.into(),
            destination,
            reply_to: None,
            properties: Vec::new(),
        }
    }

    /// Turns the operation into a request/reply operation.
    #[must_use]
    pub fn with_reply_to(mut self, reply_to: ReplyDeclaration) -> Self {
        self.reply_to = Some(reply_to);
        self
    }

    /// Appends a method-level property.
    #[must_use]
    pub fn with_property(mut self, property: PropertyDeclaration) -> Self {
        self.properties.push(property);
        self
    }

    /// Builds one request from this declaration.
    ///
    /// Call-site values overwrite method-level declarations of the same name.
    pub fn request<I>(&self, body: Option<String>, call_site: I) -> OutboundRequest
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let properties = PropertySet::collect(&self.properties, call_site);
        let request = OutboundRequest::new(self.connection.clone(), self.destination.clone(), body)
            .with_properties(properties);
        match &self.reply_to {
            Some(reply) => request.with_reply_to(reply.destination.clone(), reply.timeout),
            None => request,
        }
    }
}
