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
#![allow(dead_code)]

use std::sync::Once;
use std::time::Duration;

use mq_bridge::prelude::*;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

// Ensures tracing initialization happens only once across all tests.
static INIT: Once = Once::new();

/// Initializes the global tracing subscriber for tests.
///
/// Logs go to `logs/bridge_tests.txt`. Uses `std::sync::Once` so repeated
/// calls from different tests are harmless.
pub fn initialize_tracing() {
    INIT.call_once(|| {
        std::fs::create_dir_all("logs").expect("could not create logs dir");

        let file_appender = RollingFileAppender::new(Rotation::NEVER, "logs", "bridge_tests.txt");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Leak the guard so the non-blocking writer is not dropped before process exit
        Box::leak(Box::new(guard));

        let filter = EnvFilter::new("trace")
            .add_directive("mq_bridge::listener=trace".parse().unwrap())
            .add_directive("mq_bridge::client=trace".parse().unwrap())
            .add_directive("mq_bridge::transport=debug".parse().unwrap())
            .add_directive("tokio=info".parse().unwrap())
            .add_directive(tracing_subscriber::filter::LevelFilter::TRACE.into());

        let subscriber = FmtSubscriber::builder()
            .with_span_events(FmtSpan::NONE)
            .with_max_level(Level::TRACE)
            .compact()
            .with_line_number(true)
            .without_time()
            .with_target(true)
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .expect("setting default subscriber failed");
    });
}

/// Connection name every test bridge registers.
pub const CONNECTION: &str = "orders";

/// A bridge over a fresh in-memory broker with a short setup backoff.
pub fn bridge() -> (MemoryBroker, MessagingBridge) {
    let broker = MemoryBroker::new();
    let config = BridgeConfig::from_toml_str("[listener]\nbackoff_ms = 50\n")
        .expect("valid test config");
    let bridge = MessagingBridge::builder()
        .config(config)
        .endpoint(CONNECTION, broker.factory())
        .build();
    (broker, bridge)
}

/// Waits until `registration` reports `state`, or fails after two seconds.
pub async fn wait_for_state(
    registration: &ListenerRegistration,
    state: ListenerState,
) -> anyhow::Result<()> {
    let mut states = registration.subscribe_state();
    tokio::time::timeout(Duration::from_secs(2), states.wait_for(|current| *current == state))
        .await
        .map_err(|_| anyhow::anyhow!("listener never reached {state}"))?
        .map_err(|_| anyhow::anyhow!("listener state channel closed"))?;
    Ok(())
}

/// Polls `condition` every 10 ms for up to two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
