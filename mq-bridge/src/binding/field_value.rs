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

use serde_json::Value;

use crate::common::FieldType;
use crate::message::{CorrelationId, Destination};

/// A Rust type that a field binding can carry.
///
/// `from_value` receives a value already converted to
/// [`FIELD_TYPE`](Self::FIELD_TYPE) by the table's `TypeConverter`.
pub trait FieldValue: Sized + Send + 'static {
    /// The converter target for this type.
    const FIELD_TYPE: FieldType;

    /// Extracts the typed value, or `None` if the shape does not match.
    fn from_value(value: Value) -> Option<Self>;

    /// Renders the typed value.
    fn into_value(self) -> Value;
}

impl FieldValue for String {
    const FIELD_TYPE: FieldType = FieldType::Text;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(text),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl FieldValue for i64 {
    const FIELD_TYPE: FieldType = FieldType::Long;

    fn from_value(value: Value) -> Option<Self> {
        value.as_i64()
    }

    fn into_value(self) -> Value {
        Value::from(self)
    }
}

impl FieldValue for i32 {
    const FIELD_TYPE: FieldType = FieldType::Integer;

    fn from_value(value: Value) -> Option<Self> {
        value.as_i64().and_then(|long| Self::try_from(long).ok())
    }

    fn into_value(self) -> Value {
        Value::from(self)
    }
}

impl FieldValue for bool {
    const FIELD_TYPE: FieldType = FieldType::Boolean;

    fn from_value(value: Value) -> Option<Self> {
        value.as_bool()
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl FieldValue for Destination {
    const FIELD_TYPE: FieldType = FieldType::Destination;

    fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }

    fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl FieldValue for CorrelationId {
    const FIELD_TYPE: FieldType = FieldType::Text;

    fn from_value(value: Value) -> Option<Self> {
        String::from_value(value).map(Self::from)
    }

    fn into_value(self) -> Value {
        Value::String(self.as_str().to_string())
    }
}

/// Absent headers map to `None`; `null` is accepted where `T` alone would reject it.
impl<T: FieldValue> FieldValue for Option<T> {
    const FIELD_TYPE: FieldType = T::FIELD_TYPE;

    fn from_value(value: Value) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::from_value(value).map(Some)
        }
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Null, FieldValue::into_value)
    }
}
