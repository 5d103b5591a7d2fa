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

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, trace, warn};

use crate::binding::FieldBinderTable;
use crate::common::{BridgeError, ObjectCodec, Result, TransportError, TransportRegistry};
use crate::message::{CorrelationId, Message, OutboundRequest, ProducerSettings, Selector};
use crate::traits::Session;

/// Sends outbound requests and waits for correlated replies.
///
/// Every call opens its own session from the registry and closes it before
/// returning, whether the call succeeded, failed or timed out.
#[derive(Debug, Clone)]
pub struct RequestReplyEngine {
    registry: TransportRegistry,
    binder: Arc<FieldBinderTable>,
    codec: Arc<dyn ObjectCodec>,
}

impl RequestReplyEngine {
    /// Creates an engine over the given registry, binding table and codec.
    pub fn new(
        registry: TransportRegistry,
        binder: Arc<FieldBinderTable>,
        codec: Arc<dyn ObjectCodec>,
    ) -> Self {
        Self {
            registry,
            binder,
            codec,
        }
    }

    /// Encodes a typed body with this engine's codec.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Codec`] if the value cannot be encoded.
    pub fn encode_body<T: Serialize + ?Sized>(&self, body: &T) -> Result<Option<String>> {
        Ok(self.codec.encode(body)?)
    }

    /// Sends a request without waiting for a reply.
    ///
    /// A reply address on the request is ignored.
    ///
    /// # Errors
    ///
    /// See [`invoke_raw`](Self::invoke_raw).
    #[instrument(skip(self, request), fields(connection = %request.connection_name, destination = %request.destination))]
    pub async fn send(&self, mut request: OutboundRequest) -> Result<()> {
        if request.reply_to.take().is_some() {
            warn!("Ignoring reply address on fire-and-forget send");
        }
        self.execute(request).await.map(|_| ())
    }

    /// Sends a request and returns the raw reply body.
    ///
    /// Returns `Ok(None)` when the request has no reply address or the reply
    /// carries no body.
    ///
    /// # Errors
    ///
    /// * [`BridgeError::ConnectionNotFound`] for an unknown connection name.
    /// * [`BridgeError::UnsupportedProperty`] for a property with no binding;
    ///   nothing is sent.
    /// * [`BridgeError::ReplyTimeout`] if no reply arrives in time.
    /// * [`BridgeError::Transport`] for session, resolution or send failures.
    #[instrument(skip(self, request), fields(connection = %request.connection_name, destination = %request.destination))]
    pub async fn invoke_raw(&self, request: OutboundRequest) -> Result<Option<String>> {
        let reply = self.execute(request).await?;
        Ok(reply.and_then(|message| message.body().map(str::to_string)))
    }

    /// Sends a request and decodes the reply body as `R`.
    ///
    /// Returns `Ok(None)` only when the request has no reply address; a reply
    /// without a body is decoded from `null`.
    ///
    /// # Errors
    ///
    /// As [`invoke_raw`](Self::invoke_raw), plus [`BridgeError::Codec`] if the
    /// reply cannot be decoded.
    #[instrument(skip(self, request), fields(connection = %request.connection_name, destination = %request.destination))]
    pub async fn invoke<R: DeserializeOwned>(&self, request: OutboundRequest) -> Result<Option<R>> {
        match self.execute(request).await? {
            Some(reply) => Ok(Some(self.codec.decode(reply.body())?)),
            None => Ok(None),
        }
    }

    async fn execute(&self, request: OutboundRequest) -> Result<Option<Message>> {
        let factory = self.registry.get(&request.connection_name)?;
        let session = factory.create_session().await?;
        let outcome = self.exchange(session.as_ref(), request).await;
        session.close().await;
        trace!(ok = outcome.is_ok(), "Request session closed");
        outcome
    }

    async fn exchange(&self, session: &dyn Session, request: OutboundRequest) -> Result<Option<Message>> {
        let OutboundRequest {
            destination,
            body,
            properties,
            reply_to,
            ..
        } = request;

        let mut producer = ProducerSettings::default();
        let mut message = Message::with_body(body);
        self.binder.apply_all(&mut producer, &mut message, &properties)?;
        let destination = session.resolve(&destination.name, destination.kind)?;

        let Some(reply_to) = reply_to else {
            session.send(&destination, &producer, message).await?;
            debug!("Request sent");
            return Ok(None);
        };

        let correlation_id = CorrelationId::generate();
        message.set_correlation_id(Some(correlation_id.clone()));
        let reply_destination = session.resolve(&reply_to.destination.name, reply_to.destination.kind)?;
        message.set_reply_to(Some(reply_destination.clone()));

        // Subscribe first so a fast reply cannot slip past the selector.
        let mut consumer = session
            .subscribe(&reply_destination, Some(Selector::CorrelationId(correlation_id.clone())))
            .await?;
        session.send(&destination, &producer, message).await?;
        debug!(%correlation_id, reply_to = %reply_destination, "Request sent, awaiting reply");

        match tokio::time::timeout(reply_to.timeout, consumer.receive()).await {
            Ok(Some(reply)) => {
                trace!(%correlation_id, "Reply received");
                Ok(Some(reply))
            }
            Ok(None) => Err(TransportError::SessionClosed.into()),
            Err(_) => {
                warn!(%correlation_id, timeout = ?reply_to.timeout, "No reply within timeout");
                Err(BridgeError::ReplyTimeout {
                    correlation_id,
                    timeout: reply_to.timeout,
                })
            }
        }
    }
}
