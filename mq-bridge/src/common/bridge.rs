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

use tracing::{info, instrument, trace};

use crate::binding::FieldBinderTable;
use crate::client::{ReplyDeclaration, RequestReplyEngine};
use crate::common::{
    BridgeConfig, DefaultTypeConverter, Endpoint, HealthReport, JsonCodec, ObjectCodec, Result,
    TransportRegistry, TypeConverter,
};
use crate::listener::{
    DeclarationSource, DispatchAdapter, ListenerContainer, ListenerDeclaration,
    ListenerRegistration, MessageHandler,
};
use crate::message::Destination;
use crate::traits::SessionFactory;

/// The entry point that wires the registry, binding table, codec, the
/// request/reply engine and the listener container together.
///
/// ```rust,ignore
/// let broker = MemoryBroker::new();
/// let bridge = MessagingBridge::builder()
///     .config(BridgeConfig::load())
///     .endpoint("orders", broker.factory())
///     .build();
///
/// bridge
///     .register_listener(
///         ListenerDeclaration::new("orders", Destination::queue("ORDERS.IN")),
///         FnHandler::new(|order: Order, _| async move { Ok(Receipt::from(order)) }),
///     )
///     .await?;
///
/// bridge.shutdown().await;
/// ```
#[derive(Debug)]
pub struct MessagingBridge {
    config: BridgeConfig,
    registry: TransportRegistry,
    binder: Arc<FieldBinderTable>,
    codec: Arc<dyn ObjectCodec>,
    engine: RequestReplyEngine,
    listeners: ListenerContainer,
}

/// Builds a [`MessagingBridge`].
#[derive(Debug, Default)]
pub struct MessagingBridgeBuilder {
    config: Option<BridgeConfig>,
    endpoints: Vec<Endpoint>,
    registry: Option<TransportRegistry>,
    codec: Option<Arc<dyn ObjectCodec>>,
    converter: Option<Arc<dyn TypeConverter>>,
    binder: Option<FieldBinderTable>,
}

impl MessagingBridgeBuilder {
    /// Uses `config` instead of the defaults.
    #[must_use]
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Adds a named endpoint.
    #[must_use]
    pub fn endpoint(mut self, name: impl Into<String>, factory: Arc<dyn SessionFactory>) -> Self {
        self.endpoints.push(Endpoint::new(name, factory));
        self
    }

    /// Uses a prebuilt registry. Endpoints added with
    /// [`endpoint`](Self::endpoint) are ignored.
    #[must_use]
    pub fn registry(mut self, registry: TransportRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replaces the JSON body codec.
    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn ObjectCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Replaces the converter used by the standard binding table.
    #[must_use]
    pub fn converter(mut self, converter: Arc<dyn TypeConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Replaces the standard binding table.
    #[must_use]
    pub fn binder(mut self, binder: FieldBinderTable) -> Self {
        self.binder = Some(binder);
        self
    }

    /// Finishes the bridge.
    pub fn build(self) -> MessagingBridge {
        let config = self.config.unwrap_or_default();
        let registry = self
            .registry
            .unwrap_or_else(|| TransportRegistry::new(self.endpoints));
        let codec = self
            .codec
            .unwrap_or_else(|| Arc::new(JsonCodec) as Arc<dyn ObjectCodec>);
        let binder = Arc::new(self.binder.unwrap_or_else(|| {
            let converter = self
                .converter
                .unwrap_or_else(|| Arc::new(DefaultTypeConverter) as Arc<dyn TypeConverter>);
            FieldBinderTable::standard(converter)
        }));

        let engine = RequestReplyEngine::new(registry.clone(), binder.clone(), codec.clone());
        let listeners = ListenerContainer::new(
            registry.clone(),
            DispatchAdapter::new(binder.clone(), codec.clone()),
            config.listener.backoff(),
        );
        trace!(connections = ?registry.names(), "Messaging bridge built");

        MessagingBridge {
            config,
            registry,
            binder,
            codec,
            engine,
            listeners,
        }
    }
}

impl MessagingBridge {
    /// Starts building a bridge.
    pub fn builder() -> MessagingBridgeBuilder {
        MessagingBridgeBuilder::default()
    }

    /// The configuration the bridge was built with.
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The connection registry.
    pub const fn registry(&self) -> &TransportRegistry {
        &self.registry
    }

    /// The binding table shared by the engine and every listener.
    pub fn binder(&self) -> &Arc<FieldBinderTable> {
        &self.binder
    }

    /// The body codec.
    pub fn codec(&self) -> &Arc<dyn ObjectCodec> {
        &self.codec
    }

    /// The outbound request/reply engine.
    pub const fn engine(&self) -> &RequestReplyEngine {
        &self.engine
    }

    /// The listener container.
    pub const fn listeners(&self) -> &ListenerContainer {
        &self.listeners
    }

    /// A reply declaration on `destination` using the configured reply timeout.
    pub fn reply_to(&self, destination: Destination) -> ReplyDeclaration {
        ReplyDeclaration::new(destination).with_timeout(self.config.client.reply_timeout())
    }

    /// Starts a supervised listener.
    ///
    /// # Errors
    ///
    /// See [`ListenerRegistration::start`].
    pub async fn register_listener<H: MessageHandler>(
        &self,
        declaration: ListenerDeclaration,
        handler: H,
    ) -> Result<ListenerRegistration> {
        self.listeners.register(declaration, handler).await
    }

    /// Lets `source` register its listeners.
    ///
    /// # Errors
    ///
    /// Returns the first error `source` reports.
    pub async fn install(&self, source: &dyn DeclarationSource) -> Result<()> {
        self.listeners.install(source).await
    }

    /// Probes every connection.
    pub async fn health(&self) -> HealthReport {
        self.registry.probe_all().await
    }

    /// Closes every listener.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.listeners.close_all().await;
        info!("Messaging bridge shut down");
    }
}
