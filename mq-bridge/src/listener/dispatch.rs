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

use tracing::{debug, instrument, trace};

use crate::binding::FieldBinderTable;
use crate::common::{ObjectCodec, Result};
use crate::listener::handler::ErasedHandler;
use crate::listener::MessageHandler;
use crate::message::{Message, ProducerSettings};
use crate::traits::Session;

/// Binds an inbound message to a handler, invokes it, and sends the reply.
#[derive(Debug, Clone)]
pub struct DispatchAdapter {
    binder: Arc<FieldBinderTable>,
    codec: Arc<dyn ObjectCodec>,
}

impl DispatchAdapter {
    /// Creates an adapter over the given binding table and codec.
    pub fn new(binder: Arc<FieldBinderTable>, codec: Arc<dyn ObjectCodec>) -> Self {
        Self { binder, codec }
    }

    /// Dispatches one message to `handler` and replies on `session`.
    ///
    /// If the message carries a reply address, the encoded handler result is
    /// sent there with the inbound correlation id. Nothing is sent when
    /// binding or the handler fails.
    ///
    /// # Errors
    ///
    /// * [`BridgeError::Codec`](crate::common::BridgeError::Codec) if the body
    ///   cannot be decoded or the result cannot be encoded.
    /// * [`BridgeError::UnresolvedField`](crate::common::BridgeError::UnresolvedField)
    ///   or [`BridgeError::FieldRead`](crate::common::BridgeError::FieldRead)
    ///   if a declared field cannot be bound.
    /// * [`BridgeError::HandlerInvocation`](crate::common::BridgeError::HandlerInvocation)
    ///   if the handler returns an error.
    /// * [`BridgeError::Transport`](crate::common::BridgeError::Transport) if
    ///   the reply cannot be sent.
    pub async fn dispatch<H: MessageHandler>(
        &self,
        session: &dyn Session,
        message: Message,
        handler: &H,
    ) -> Result<()> {
        self.dispatch_erased(session, message, handler).await
    }

    #[instrument(skip_all, fields(message_id = message.message_id().unwrap_or_default()))]
    pub(crate) async fn dispatch_erased(
        &self,
        session: &dyn Session,
        message: Message,
        handler: &dyn ErasedHandler,
    ) -> Result<()> {
        let parameters = handler.parameters();
        let fields = self.binder.read_all(
            &message,
            parameters
                .iter()
                .map(|parameter| (parameter.name.as_str(), parameter.field_type)),
        )?;
        let output = handler.invoke(&self.codec, message.body(), fields).await?;

        let Some(reply_to) = message.reply_to() else {
            trace!("Handled message without reply address");
            return Ok(());
        };
        let mut reply = Message::with_body(output);
        reply.set_correlation_id(message.correlation_id().cloned());
        session
            .send(reply_to, &ProducerSettings::default(), reply)
            .await?;
        debug!(
            reply_to = %reply_to,
            correlation_id = message.correlation_id().map(|id| id.as_str()).unwrap_or_default(),
            "Reply sent"
        );
        Ok(())
    }
}
