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

pub use correlation::{CorrelationId, Selector};
pub use message::{
    Destination, DestinationKind, Message, ProducerSettings, DEFAULT_PRIORITY,
    DELIVERY_MODE_NON_PERSISTENT, DELIVERY_MODE_PERSISTENT,
};
pub use outbound_request::{OutboundRequest, PropertySet, ReplyTo};

/// Correlation ids and reply selectors.
mod correlation;
/// Messages, destinations and producer settings.
#[allow(clippy::module_inception)]
mod message;
/// Outbound requests and property precedence.
mod outbound_request;
