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

//! Body encoding between typed values and message text.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::common::CodecError;

/// Encodes structured values to body text and back.
///
/// Implementations only see structured values; plain text bodies are passed
/// through unchanged by [`encode`](Self::encode) and
/// [`decode`](Self::decode) before the codec is consulted.
pub trait ObjectCodec: Debug + Send + Sync {
    /// Renders a structured value as body text.
    fn encode_value(&self, value: &Value) -> Result<String, CodecError>;

    /// Parses body text into a structured value.
    fn decode_value(&self, body: &str) -> Result<Value, CodecError>;
}

impl dyn ObjectCodec {
    /// Encodes a typed value as an optional text body.
    ///
    /// `None`/unit values produce no body, strings are sent verbatim, and
    /// everything else goes through [`ObjectCodec::encode_value`].
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Option<String>, CodecError> {
        match serde_json::to_value(value).map_err(|e| CodecError::Encode(e.to_string()))? {
            Value::Null => Ok(None),
            Value::String(text) => Ok(Some(text)),
            other => self.encode_value(&other).map(Some),
        }
    }

    /// Decodes an optional text body into `T`.
    ///
    /// A missing body decodes as `null` (so `()` and `Option<_>` accept it).
    /// [`encode`](Self::encode) never quotes strings, so a body that parses as
    /// a JSON string literal is taken verbatim, quotes included. Text that the
    /// codec cannot parse into `T` is offered to `T` as a plain string before
    /// failing.
    pub fn decode<T: DeserializeOwned>(&self, body: Option<&str>) -> Result<T, CodecError> {
        let target = std::any::type_name::<T>();
        let Some(text) = body else {
            return serde_json::from_value(Value::Null).map_err(|e| CodecError::Decode {
                target,
                reason: e.to_string(),
            });
        };

        let structured = self
            .decode_value(text)
            .map(|value| match value {
                Value::String(_) => Value::String(text.to_string()),
                other => other,
            })
            .and_then(|value| {
                serde_json::from_value::<T>(value).map_err(|e| CodecError::Decode {
                    target,
                    reason: e.to_string(),
                })
            });
        match structured {
            Ok(decoded) => Ok(decoded),
            Err(err) => serde_json::from_value::<T>(Value::String(text.to_string()))
                .map_err(|_| err),
        }
    }
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ObjectCodec for JsonCodec {
    fn encode_value(&self, value: &Value) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode_value(&self, body: &str) -> Result<Value, CodecError> {
        serde_json::from_str(body).map_err(|e| CodecError::Decode {
            target: "json",
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u32,
        item: String,
    }

    fn codec() -> &'static dyn ObjectCodec {
        &JsonCodec
    }

    #[test]
    fn strings_pass_through_verbatim() {
        assert_eq!(codec().encode("hello").unwrap(), Some("hello".to_string()));
        let decoded: String = codec().decode(Some("hello")).unwrap();
        assert_eq!(decoded, "hello");
        let numeric_text: String = codec().decode(Some("123")).unwrap();
        assert_eq!(numeric_text, "123");
    }

    #[test]
    fn quoted_strings_keep_their_quotes() {
        let quoted = "\"quoted\"".to_string();
        let body = codec().encode(&quoted).unwrap();
        assert_eq!(body.as_deref(), Some("\"quoted\""));
        let decoded: String = codec().decode(body.as_deref()).unwrap();
        assert_eq!(decoded, quoted);
        let optional: Option<String> = codec().decode(Some("\"quoted\"")).unwrap();
        assert_eq!(optional.as_deref(), Some("\"quoted\""));
    }

    #[test]
    fn structs_round_trip_as_json() {
        let order = Order {
            id: 7,
            item: "widget".to_string(),
        };
        let body = codec().encode(&order).unwrap().unwrap();
        assert_eq!(body, r#"{"id":7,"item":"widget"}"#);
        let decoded: Order = codec().decode(Some(&body)).unwrap();
        assert_eq!(decoded, order);
    }

    #[test]
    fn unit_has_no_body() {
        assert_eq!(codec().encode(&()).unwrap(), None);
        codec().decode::<()>(None).unwrap();
        let absent: Option<Order> = codec().decode(None).unwrap();
        assert!(absent.is_none());
    }

    #[test]
    fn malformed_body_reports_target_type() {
        let err = codec().decode::<Order>(Some("{not json")).unwrap_err();
        assert!(matches!(err, CodecError::Decode { .. }));
    }
}
