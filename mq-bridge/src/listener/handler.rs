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

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::binding::{BoundFields, FieldValue};
use crate::common::{BridgeError, FieldType, ObjectCodec, Result};

/// A header a handler wants bound, and the type to convert it to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldParameter {
    /// The inbound binding name.
    pub name: String,
    /// The converted type.
    pub field_type: FieldType,
}

impl FieldParameter {
    /// Binds `name` as `field_type`.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    /// Binds `name` as the field type of `V`.
    pub fn of<V: FieldValue>(name: impl Into<String>) -> Self {
        Self::new(name, V::FIELD_TYPE)
    }
}

/// Handles inbound messages for one listener.
///
/// The body is decoded as [`Body`](Self::Body) and the headers named by
/// [`fields`](Self::fields) are bound before `handle` runs. When the inbound
/// message carries a reply address, the returned [`Output`](Self::Output) is
/// encoded and sent back with the inbound correlation id. Use `()` for
/// handlers that never reply with a body.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// The decoded body type.
    type Body: DeserializeOwned + Send;
    /// The reply type.
    type Output: Serialize + Send;

    /// Headers to bind for each message.
    fn fields(&self) -> Vec<FieldParameter> {
        Vec::new()
    }

    /// Handles one message.
    async fn handle(&self, body: Self::Body, fields: BoundFields) -> anyhow::Result<Self::Output>;
}

/// Object-safe view of a [`MessageHandler`], with body decoding and reply
/// encoding folded in.
#[async_trait]
pub(crate) trait ErasedHandler: Send + Sync {
    fn parameters(&self) -> Vec<FieldParameter>;

    async fn invoke(
        &self,
        codec: &Arc<dyn ObjectCodec>,
        body: Option<&str>,
        fields: BoundFields,
    ) -> Result<Option<String>>;
}

#[async_trait]
impl<H: MessageHandler> ErasedHandler for H {
    fn parameters(&self) -> Vec<FieldParameter> {
        MessageHandler::fields(self)
    }

    async fn invoke(
        &self,
        codec: &Arc<dyn ObjectCodec>,
        body: Option<&str>,
        fields: BoundFields,
    ) -> Result<Option<String>> {
        let body: H::Body = codec.decode(body)?;
        let output = self.handle(body, fields).await.map_err(BridgeError::from)?;
        Ok(codec.encode(&output)?)
    }
}

/// A [`MessageHandler`] built from an async closure.
///
/// ```rust,ignore
/// let handler = FnHandler::new(|order: Order, fields: BoundFields| async move {
///     let kind: Option<String> = fields.get("type");
///     Ok(Receipt::for_order(&order, kind))
/// })
/// .with_field("type", FieldType::Text);
/// ```
pub struct FnHandler<F, B, O, Fut> {
    f: F,
    fields: Vec<FieldParameter>,
    _marker: PhantomData<fn(B) -> (O, Fut)>,
}

impl<F, B, O, Fut> FnHandler<F, B, O, Fut>
where
    F: Fn(B, BoundFields) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
    B: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self {
            f,
            fields: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Adds a header to bind.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldParameter::new(name, field_type));
        self
    }
}

#[async_trait]
impl<F, B, O, Fut> MessageHandler for FnHandler<F, B, O, Fut>
where
    F: Fn(B, BoundFields) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
    B: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    type Body = B;
    type Output = O;

    fn fields(&self) -> Vec<FieldParameter> {
        self.fields.clone()
    }

    async fn handle(&self, body: B, fields: BoundFields) -> anyhow::Result<O> {
        (self.f)(body, fields).await
    }
}
