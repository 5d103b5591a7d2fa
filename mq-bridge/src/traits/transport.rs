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

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::common::TransportError;
use crate::message::{Destination, DestinationKind, Message, ProducerSettings, Selector};

/// Callback a session invokes when its underlying connection is lost.
///
/// Providers call the observer at most once per session, from any thread, and
/// must not hold internal locks while doing so.
pub type FaultObserver = Arc<dyn Fn(TransportError) + Send + Sync>;

/// Opens sessions against one named connection.
#[async_trait]
pub trait SessionFactory: Debug + Send + Sync {
    /// Opens a new session. Each session is owned by exactly one caller.
    async fn create_session(&self) -> Result<Box<dyn Session>, TransportError>;
}

/// A transport context used to resolve destinations, send and subscribe.
#[async_trait]
pub trait Session: Send + Sync {
    /// Resolves a destination name of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::DestinationUnreachable`] if the provider
    /// rejects the name.
    fn resolve(&self, name: &str, kind: DestinationKind) -> Result<Destination, TransportError>;

    /// Sends a message to `destination` using the given producer settings.
    async fn send(
        &self,
        destination: &Destination,
        producer: &ProducerSettings,
        message: Message,
    ) -> Result<(), TransportError>;

    /// Opens a consumer on `destination`, optionally filtered by `selector`.
    ///
    /// The consumer is registered with the provider before this returns, so a
    /// message sent afterwards is visible to it.
    async fn subscribe(
        &self,
        destination: &Destination,
        selector: Option<Selector>,
    ) -> Result<Box<dyn Consumer>, TransportError>;

    /// Installs the observer notified on connection loss, replacing any previous one.
    fn set_fault_observer(&self, observer: FaultObserver);

    /// Closes the session and every consumer opened from it. Idempotent.
    async fn close(&self);
}

/// Receives messages for one subscription. Dropping it unsubscribes.
#[async_trait]
pub trait Consumer: Send {
    /// Waits for the next message.
    ///
    /// Returns `None` once the owning session is closed or the connection is lost.
    async fn receive(&mut self) -> Option<Message>;
}
