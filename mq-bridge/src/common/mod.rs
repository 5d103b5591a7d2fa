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

//! Shared building blocks: the bridge entry point, the transport registry,
//! configuration, body codecs, scalar conversion and the error types.

// --- Public Re-exports ---
pub use bridge::{MessagingBridge, MessagingBridgeBuilder};
pub use codec::{JsonCodec, ObjectCodec};
pub use config::{BridgeConfig, ClientConfig, ConnectionConfig, ListenerConfig};
pub use conversion::{DefaultTypeConverter, FieldType, TypeConverter};
pub use errors::{BridgeError, CodecError, ConversionError, Result, TransportError};
pub use registry::{Endpoint, HealthReport, HealthStatus, TransportRegistry};

// --- Submodules ---

/// Defines the `MessagingBridge` entry point.
mod bridge;
/// Defines body codecs.
mod codec;
/// Defines the configuration system.
mod config;
/// Defines scalar type conversion.
mod conversion;
/// Defines the error types.
mod errors;
/// Defines the transport registry and health probe.
mod registry;
