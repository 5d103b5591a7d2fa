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
use std::fs;
use std::time::Duration;

use mq_bridge::prelude::*;
use tempfile::TempDir;

/// Loads configuration from `$XDG_CONFIG_HOME/mq-bridge/config.toml`.
///
/// Kept as the only test in this binary because it changes the process environment.
#[test]
fn test_load_from_xdg_config_home() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let config_dir = temp_dir.path().join("mq-bridge");
    fs::create_dir_all(&config_dir)?;

    let config_content = r#"
        [connections.orders]
        host = "mq.internal"
        port = 1415
        queue_manager = "QM1"
        channel = "DEV.APP.SVRCONN"

        [listener]
        backoff_ms = 1000

        [client]
        reply_timeout_ms = 250
    "#;
    fs::write(config_dir.join("config.toml"), config_content)?;
    std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());

    let config = BridgeConfig::load();
    let orders = &config.connections["orders"];
    assert_eq!(orders.host, "mq.internal");
    assert_eq!(orders.port, 1415);
    assert_eq!(orders.channel.as_deref(), Some("DEV.APP.SVRCONN"));
    assert_eq!(config.listener.backoff(), Duration::from_secs(1));

    let bridge = MessagingBridge::builder().config(config).build();
    let reply = bridge.reply_to(Destination::queue("R"));
    assert_eq!(reply.timeout, Duration::from_millis(250));

    // A malformed file falls back to defaults.
    fs::write(config_dir.join("config.toml"), "[listener]\nbackoff_ms = \"soon\"\n")?;
    assert_eq!(BridgeConfig::load(), BridgeConfig::default());

    temp_dir.close()?;
    Ok(())
}
