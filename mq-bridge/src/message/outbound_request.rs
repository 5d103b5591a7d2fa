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

use indexmap::IndexMap;
use serde_json::Value;

use crate::client::PropertyDeclaration;
use crate::message::Destination;

/// Ordered property assignments for one outbound message.
///
/// Iteration follows first-insertion order; re-inserting a name replaces the
/// value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySet(IndexMap<String, Value>);

impl PropertySet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects properties from method-level declarations and call-site values.
    ///
    /// Declarations are applied in reverse declaration order, then call-site
    /// values overwrite any matching name, so the value closest to the call wins.
    pub fn collect<I>(declarations: &[PropertyDeclaration], call_site: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut properties = Self::new();
        for declaration in declarations.iter().rev() {
            properties.insert(
                declaration.name.clone(),
                declaration.value.clone().unwrap_or(Value::Null),
            );
        }
        for (name, value) in call_site {
            properties.insert(name, value);
        }
        properties
    }

    /// Inserts or replaces a property.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Looks up a property value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no properties are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates properties in application order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for PropertySet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut set = Self::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}

/// Where and how long to wait for a correlated reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTo {
    /// The destination the responder replies to.
    pub destination: Destination,
    /// How long the caller waits before failing with a timeout.
    pub timeout: Duration,
}

/// One outbound call, built per invocation and discarded afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    /// Logical connection name resolved through the registry.
    pub connection_name: String,
    /// Where the request is sent.
    pub destination: Destination,
    /// Encoded request body.
    pub body: Option<String>,
    /// Header and producer properties, applied in order.
    pub properties: PropertySet,
    /// Present when the caller expects a reply.
    pub reply_to: Option<ReplyTo>,
}

impl OutboundRequest {
    /// Creates a fire-and-forget request with no properties.
    pub fn new(
        connection_name: impl Into<String>,
        destination: Destination,
        body: Option<String>,
    ) -> Self {
        Self {
            connection_name: connection_name.into(),
            destination,
            body,
            properties: PropertySet::new(),
            reply_to: None,
        }
    }

    /// Sets the property set.
    #[must_use]
    pub fn with_properties(mut self, properties: PropertySet) -> Self {
        self.properties = properties;
        self
    }

    /// Requests a correlated reply on `destination` within `timeout`.
    #[must_use]
    pub fn with_reply_to(mut self, destination: Destination, timeout: Duration) -> Self {
        self.reply_to = Some(ReplyTo {
            destination,
            timeout,
        });
        self
    }
}
