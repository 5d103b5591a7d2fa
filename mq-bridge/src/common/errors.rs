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

//! Error types surfaced by the bridge.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::message::CorrelationId;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors raised by a transport provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The provider could not open a connection or session.
    #[error("connection unavailable: {0}")]
    ConnectionUnavailable(String),

    /// The named destination cannot be resolved or reached.
    #[error("destination unreachable: {0}")]
    DestinationUnreachable(String),

    /// The session has been closed, either locally or by the provider.
    #[error("session closed")]
    SessionClosed,

    /// The connection backing a session was lost.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// A header assignment or read was rejected.
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// The field name.
        field: String,
        /// Why the provider rejected it.
        reason: String,
    },
}

/// Errors raised while coercing a value to a bound field type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert {value} to {target}")]
pub struct ConversionError {
    /// The rendered source value.
    pub value: String,
    /// The target type name.
    pub target: &'static str,
}

/// Errors raised while encoding or decoding message bodies.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value could not be encoded.
    #[error("failed to encode body: {0}")]
    Encode(String),
    /// The body could not be decoded into the requested type.
    #[error("failed to decode body into {target}: {reason}")]
    Decode {
        /// The requested type name.
        target: &'static str,
        /// The underlying failure.
        reason: String,
    },
}

/// The error type for every fallible bridge operation.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No endpoint is registered under the requested connection name.
    #[error("no connection named {0}")]
    ConnectionNotFound(String),

    /// An outbound property has no producer-level or message-level binding.
    #[error("unsupported property {name}={value}")]
    UnsupportedProperty {
        /// The property name.
        name: String,
        /// The supplied value.
        value: Value,
    },

    /// An inbound field name has no accessor binding.
    #[error("no bindable field named {0}")]
    UnresolvedField(String),

    /// A registered accessor failed to read a live message.
    #[error("unable to read field {name} from message: {source}")]
    FieldRead {
        /// The field name.
        name: String,
        /// The transport failure.
        #[source]
        source: TransportError,
    },

    /// No correlated reply arrived within the configured window.
    #[error("timed out after {timeout:?} waiting for reply with correlation id {correlation_id}")]
    ReplyTimeout {
        /// The correlation id stamped on the request.
        correlation_id: CorrelationId,
        /// The configured reply timeout.
        timeout: Duration,
    },

    /// A user handler returned an error.
    #[error("handler failed: {0}")]
    HandlerInvocation(String),

    /// The transport rejected an operation.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A body could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A value could not be coerced to a field type.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl From<anyhow::Error> for BridgeError {
    fn from(err: anyhow::Error) -> Self {
        Self::HandlerInvocation(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_property_names_the_key() {
        let err = BridgeError::UnsupportedProperty {
            name: "colour".to_string(),
            value: Value::from("red"),
        };
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn reply_timeout_carries_correlation_id() {
        let id = CorrelationId::from("abc");
        let err = BridgeError::ReplyTimeout {
            correlation_id: id,
            timeout: Duration::from_millis(100),
        };
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn handler_errors_keep_their_context() {
        let err: BridgeError = anyhow::anyhow!("inner").context("outer").into();
        let display = err.to_string();
        assert!(display.contains("outer"));
        assert!(display.contains("inner"));
    }
}
