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

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the messaging bridge
///
/// Loaded from TOML files in XDG-compliant directories. Every section is
/// optional; missing values take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Connection settings keyed by logical connection name
    pub connections: BTreeMap<String, ConnectionConfig>,
    /// Listener supervision settings
    pub listener: ListenerConfig,
    /// Outbound client settings
    pub client: ClientConfig,
}

/// Settings for one named connection
///
/// These are handed to the session-factory builder supplied to
/// [`TransportRegistry::from_config`](crate::common::TransportRegistry::from_config);
/// the bridge itself does not interpret them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Broker host name
    pub host: String,
    /// Broker listener port
    pub port: u16,
    /// Queue manager name
    pub queue_manager: String,
    /// Application name reported to the broker
    pub application_name: Option<String>,
    /// Server connection channel
    pub channel: Option<String>,
    /// User name for authentication
    pub username: Option<String>,
    /// Password for authentication
    pub password: Option<String>,
    /// TLS cipher suite
    pub cipher_suite: Option<String>,
}

/// Listener supervision settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Delay between failed listener setup attempts, in milliseconds
    pub backoff_ms: u64,
}

/// Outbound client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Default reply timeout for declarations that do not set one, in milliseconds
    pub reply_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1414,
            queue_manager: String::new(),
            application_name: None,
            channel: None,
            username: None,
            password: None,
            cipher_suite: None,
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self { backoff_ms: 5_000 }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: 5_000,
        }
    }
}

impl ListenerConfig {
    /// Convert the setup backoff to Duration
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl ClientConfig {
    /// Convert the default reply timeout to Duration
    pub const fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

impl BridgeConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if the text is malformed or a value has the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load configuration from XDG-compliant locations
    ///
    /// Looks for `mq-bridge/config.toml` under the XDG config directories
    /// (`$XDG_CONFIG_HOME`, then `~/.config`).
    ///
    /// If no configuration file is found, returns the default configuration.
    /// If a configuration file exists but is malformed, logs an error and uses defaults.
    pub fn load() -> Self {
        use tracing::{error, info};

        let xdg_dirs = match xdg::BaseDirectories::with_prefix("mq-bridge") {
            Ok(dirs) => dirs,
            Err(e) => {
                error!("Failed to initialize XDG directories: {}", e);
                return Self::default();
            }
        };

        let Some(path) = xdg_dirs.find_config_file("config.toml") else {
            info!("No configuration file found, using defaults");
            return Self::default();
        };

        info!("Loading configuration from: {}", path.display());
        match std::fs::read_to_string(&path) {
            Ok(config_str) => match Self::from_toml_str(&config_str) {
                Ok(config) => {
                    info!(
                        connections = config.connections.len(),
                        "Successfully loaded configuration"
                    );
                    config
                }
                Err(e) => {
                    error!("Failed to parse configuration file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read configuration file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_defaults() {
        let config = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.listener.backoff(), Duration::from_secs(5));
        assert_eq!(config.client.reply_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn connection_sections_fill_missing_fields() {
        let config = BridgeConfig::from_toml_str(
            r#"
            [connections.orders]
            host = "mq.internal"
            queue_manager = "QM1"
            channel = "DEV.APP.SVRCONN"

            [connections.audit]

            [listener]
            backoff_ms = 250
            "#,
        )
        .unwrap();

        let orders = &config.connections["orders"];
        assert_eq!(orders.host, "mq.internal");
        assert_eq!(orders.port, 1414);
        assert_eq!(orders.queue_manager, "QM1");
        assert_eq!(orders.channel.as_deref(), Some("DEV.APP.SVRCONN"));
        assert!(orders.username.is_none());

        assert_eq!(config.connections["audit"], ConnectionConfig::default());
        assert_eq!(config.listener.backoff_ms, 250);
        assert_eq!(config.client.reply_timeout_ms, 5_000);
    }

    #[test]
    fn wrong_value_type_is_an_error() {
        assert!(BridgeConfig::from_toml_str("[listener]\nbackoff_ms = \"soon\"").is_err());
    }
}
