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

use mq_bridge::prelude::*;

use crate::setup::*;

mod setup;

#[tokio::test]
async fn test_probe_reports_up_and_down() -> anyhow::Result<()> {
    initialize_tracing();
    let healthy = MemoryBroker::new();
    let failing = MemoryBroker::new();
    failing.set_available(false);
    let bridge = MessagingBridge::builder()
        .endpoint("orders", healthy.factory())
        .endpoint("billing", failing.factory())
        .build();

    assert_eq!(bridge.registry().probe("orders").await, HealthStatus::Up);
    assert_eq!(bridge.registry().probe("billing").await, HealthStatus::Down);
    assert_eq!(bridge.registry().probe("missing").await, HealthStatus::Down);
    assert_eq!(healthy.session_count(), 0, "probe must close its session");

    let report = bridge.health().await;
    assert_eq!(report.status, HealthStatus::Down);
    assert_eq!(
        report.connections.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["billing", "orders"]
    );
    assert_eq!(report.connections["orders"], HealthStatus::Up);

    failing.set_available(true);
    assert_eq!(bridge.health().await.status, HealthStatus::Up);
    Ok(())
}

#[tokio::test]
async fn test_registry_from_config() -> anyhow::Result<()> {
    initialize_tracing();
    let broker = MemoryBroker::new();
    let config = BridgeConfig::from_toml_str(
        r#"
        [connections.orders]
        host = "mq.internal"
        queue_manager = "QM1"
        "#,
    )?;
    let registry = TransportRegistry::from_config(&config, |_, connection| {
        assert_eq!(connection.queue_manager, "QM1");
        Ok(broker.factory() as Arc<dyn SessionFactory>)
    })?;
    let bridge = MessagingBridge::builder()
        .config(config)
        .registry(registry)
        .build();

    assert!(bridge.registry().contains("orders"));
    assert_eq!(bridge.health().await.status, HealthStatus::Up);
    Ok(())
}
