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

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, error, instrument, trace};

use crate::common::{BridgeConfig, BridgeError, ConnectionConfig, Result, TransportError};
use crate::traits::SessionFactory;

/// A named connection endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// The logical connection name.
    pub name: String,
    /// Opens sessions on this connection.
    pub factory: Arc<dyn SessionFactory>,
}

impl Endpoint {
    /// Creates an endpoint.
    pub fn new(name: impl Into<String>, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            name: name.into(),
            factory,
        }
    }
}

/// Result of probing one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// A session could be opened.
    Up,
    /// The connection is unknown or refused a session.
    Down,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("UP"),
            Self::Down => f.write_str("DOWN"),
        }
    }
}

/// Per-connection health plus the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// `Down` if any connection is down.
    pub status: HealthStatus,
    /// Status of each connection, ordered by name.
    pub connections: IndexMap<String, HealthStatus>,
}

/// Named connection endpoints, immutable after construction.
///
/// Cloning is cheap; clones share the same endpoint table.
#[derive(Debug, Clone, Default)]
pub struct TransportRegistry {
    endpoints: Arc<HashMap<String, Endpoint>>,
}

impl TransportRegistry {
    /// Builds a registry from endpoints. A later endpoint replaces an earlier one of the same name.
    pub fn new(endpoints: impl IntoIterator<Item = Endpoint>) -> Self {
        let endpoints = endpoints
            .into_iter()
            .map(|endpoint| (endpoint.name.clone(), endpoint))
            .collect();
        Self {
            endpoints: Arc::new(endpoints),
        }
    }

    /// Builds a registry from the configured connections.
    ///
    /// `build` turns each connection's settings into a session factory.
    ///
    /// # Errors
    ///
    /// Returns the first error `build` reports.
    pub fn from_config<F>(config: &BridgeConfig, mut build: F) -> Result<Self>
    where
        F: FnMut(&str, &ConnectionConfig) -> std::result::Result<Arc<dyn SessionFactory>, TransportError>,
    {
        let mut endpoints = Vec::with_capacity(config.connections.len());
        for (name, connection) in &config.connections {
            debug!(connection = %name, host = %connection.host, port = connection.port, "Building endpoint");
            endpoints.push(Endpoint::new(name.clone(), build(name, connection)?));
        }
        Ok(Self::new(endpoints))
    }

    /// Resolves a logical connection name to its session factory.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConnectionNotFound`] if no endpoint has that name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn SessionFactory>> {
        self.endpoints
            .get(name)
            .map(|endpoint| endpoint.factory.clone())
            .ok_or_else(|| BridgeError::ConnectionNotFound(name.to_string()))
    }

    /// Returns `true` if an endpoint is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.endpoints.contains_key(name)
    }

    /// Registered connection names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.endpoints.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Opens and closes a session on `name`.
    #[instrument(skip(self))]
    pub async fn probe(&self, name: &str) -> HealthStatus {
        let factory = match self.get(name) {
            Ok(factory) => factory,
            Err(e) => {
                error!(error = %e, "Health probe failed");
                return HealthStatus::Down;
            }
        };
        match factory.create_session().await {
            Ok(session) => {
                session.close().await;
                trace!("Connection is up");
                HealthStatus::Up
            }
            Err(e) => {
                error!(error = %e, "Health probe failed");
                HealthStatus::Down
            }
        }
    }

    /// Probes every connection.
    #[instrument(skip(self))]
    pub async fn probe_all(&self) -> HealthReport {
        let names = self.names();
        let statuses = futures::future::join_all(names.iter().map(|name| self.probe(name))).await;
        let connections: IndexMap<String, HealthStatus> = names
            .into_iter()
            .map(str::to_string)
            .zip(statuses)
            .collect();
        let status = if connections.values().all(|status| *status == HealthStatus::Up) {
            HealthStatus::Up
        } else {
            HealthStatus::Down
        };
        HealthReport {
            status,
            connections,
        }
    }
}
