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

//! Scalar coercion between loosely typed property values and bound field types.

use std::fmt::{self, Debug};

use serde_json::Value;

use crate::common::ConversionError;
use crate::message::{Destination, DestinationKind};

/// The value type a field binding reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// UTF-8 text.
    Text,
    /// 64-bit signed integer.
    Long,
    /// 32-bit signed integer.
    Integer,
    /// Boolean flag.
    Boolean,
    /// A queue or topic.
    Destination,
}

impl FieldType {
    /// Human-readable type name used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Long => "long",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Destination => "destination",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Converts a value into the canonical JSON shape of a field type.
///
/// `Null` converts to `Null` for every target; absent headers stay absent.
pub trait TypeConverter: Debug + Send + Sync {
    /// Converts `value` to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] when the value has no representation in
    /// the target type.
    fn convert(&self, value: &Value, target: FieldType) -> Result<Value, ConversionError>;
}

/// Lenient scalar conversion: numbers and booleans from text, text from anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTypeConverter;

impl TypeConverter for DefaultTypeConverter {
    fn convert(&self, value: &Value, target: FieldType) -> Result<Value, ConversionError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let fail = || ConversionError {
            value: value.to_string(),
            target: target.name(),
        };
        match target {
            FieldType::Text => Ok(Value::String(match value {
                Value::String(text) => text.clone(),
                Value::Object(_) => serde_json::from_value::<Destination>(value.clone())
                    .map_or_else(|_| value.to_string(), |dest| dest.to_string()),
                other => other.to_string(),
            })),
            FieldType::Long => to_i64(value).map(Value::from).ok_or_else(fail),
            FieldType::Integer => to_i64(value)
                .and_then(|long| i32::try_from(long).ok())
                .map(Value::from)
                .ok_or_else(fail),
            FieldType::Boolean => match value {
                Value::Bool(flag) => Ok(Value::Bool(*flag)),
                Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(fail()),
                },
                _ => Err(fail()),
            },
            FieldType::Destination => {
                let destination = match value {
                    Value::String(text) => parse_destination(text),
                    Value::Object(_) => serde_json::from_value::<Destination>(value.clone()).ok(),
                    _ => None,
                };
                destination
                    .and_then(|dest| serde_json::to_value(dest).ok())
                    .ok_or_else(fail)
            }
        }
    }
}

/// Floats exactly representable as `i64`; `i64::MAX as f64` is 2^63 and excluded.
const I64_RANGE: std::ops::Range<f64> = i64::MIN as f64..i64::MAX as f64;

fn to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.fract() == 0.0 && I64_RANGE.contains(float))
                .map(|float| float as i64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Parses `queue:///NAME`, `topic:///NAME` or a bare queue name.
fn parse_destination(text: &str) -> Option<Destination> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Some(name) = text.strip_prefix("topic:///") {
        return Some(Destination::new(name, DestinationKind::Topic));
    }
    let name = text.strip_prefix("queue:///").unwrap_or(text);
    Some(Destination::queue(name))
}
