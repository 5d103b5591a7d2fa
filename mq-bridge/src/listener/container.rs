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

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::common::{Result, TransportRegistry};
use crate::listener::{DispatchAdapter, ListenerRegistration, MessageHandler};
use crate::message::Destination;

/// Where a listener consumes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerDeclaration {
    /// Logical connection name.
    pub connection: String,
    /// The queue or topic to consume.
    pub destination: Destination,
}

impl ListenerDeclaration {
    /// Declares a listener on `destination` over `connection`.
    pub fn new(connection: impl Into<String>, destination: Destination) -> Self {
        Self {
            connection: connection.into(),
            destination,
        }
    }
}

/// A component that contributes listeners to a [`ListenerContainer`].
#[async_trait]
pub trait DeclarationSource: Send + Sync {
    /// Registers this source's listeners.
    ///
    /// # Errors
    ///
    /// Returns the first registration error.
    async fn declare(&self, container: &ListenerContainer) -> Result<()>;
}

/// Owns every listener started through it and closes them together.
#[derive(Debug)]
pub struct ListenerContainer {
    registry: TransportRegistry,
    adapter: DispatchAdapter,
    backoff: Duration,
    registrations: Mutex<Vec<ListenerRegistration>>,
}

impl ListenerContainer {
    /// Creates an empty container.
    pub fn new(registry: TransportRegistry, adapter: DispatchAdapter, backoff: Duration) -> Self {
        Self {
            registry,
            adapter,
            backoff,
            registrations: Mutex::new(Vec::new()),
        }
    }

    /// Starts a listener and keeps it for [`close_all`](Self::close_all).
    ///
    /// # Errors
    ///
    /// See [`ListenerRegistration::start`].
    pub async fn register<H: MessageHandler>(
        &self,
        declaration: ListenerDeclaration,
        handler: H,
    ) -> Result<ListenerRegistration> {
        let registration = ListenerRegistration::start(
            declaration,
            handler,
            self.registry.clone(),
            self.adapter.clone(),
            self.backoff,
        )
        .await?;
        self.registrations.lock().push(registration.clone());
        Ok(registration)
    }

    /// Lets `source` register its listeners.
    ///
    /// # Errors
    ///
    /// Returns the first error `source` reports; listeners it already
    /// registered stay registered.
    pub async fn install(&self, source: &dyn DeclarationSource) -> Result<()> {
        source.declare(self).await
    }

    /// Registered listeners, in registration order.
    pub fn registrations(&self) -> Vec<ListenerRegistration> {
        self.registrations.lock().clone()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.registrations.lock().len()
    }

    /// Returns `true` if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.lock().is_empty()
    }

    /// Closes every registered listener and forgets them.
    #[instrument(skip(self))]
    pub async fn close_all(&self) {
        let registrations = std::mem::take(&mut *self.registrations.lock());
        debug!(count = registrations.len(), "Closing listeners");
        futures::future::join_all(registrations.iter().map(|registration| registration.close())).await;
        info!(count = registrations.len(), "All listeners closed");
    }
}
