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

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::common::TransportError;
use crate::message::{Destination, DestinationKind, Message, ProducerSettings, Selector};
use crate::traits::{Consumer, FaultObserver, Session, SessionFactory};

/// An in-process broker with queue and topic semantics.
///
/// Queues hand each message to one matching consumer, round-robin, and hold
/// messages no consumer matches until one subscribes. Topics copy each
/// message to every matching consumer and drop it when there are none.
///
/// Fault injection hooks ([`sever_connections`](Self::sever_connections),
/// [`set_available`](Self::set_available),
/// [`deny_destination`](Self::deny_destination)) let tests drive the
/// listener supervisor through its recovery paths.
///
/// Cloning yields another handle to the same broker.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<BrokerState>,
}

impl fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBroker")
            .field("destinations", &self.state.destinations.len())
            .field("sessions", &self.state.sessions.len())
            .field("available", &self.state.is_available())
            .finish()
    }
}

/// Opens sessions on a [`MemoryBroker`].
#[derive(Debug, Clone)]
pub struct MemorySessionFactory {
    broker: MemoryBroker,
}

struct BrokerState {
    destinations: DashMap<Destination, Channel>,
    sessions: DashMap<u64, Arc<SessionState>>,
    denied: DashSet<String>,
    unavailable: AtomicBool,
    next_id: AtomicU64,
}

impl Default for BrokerState {
    fn default() -> Self {
        Self {
            destinations: DashMap::new(),
            sessions: DashMap::new(),
            denied: DashSet::new(),
            unavailable: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }
}

#[derive(Default)]
struct Channel {
    subscribers: Vec<Subscriber>,
    pending: VecDeque<Message>,
    cursor: usize,
}

struct Subscriber {
    id: u64,
    session: u64,
    selector: Option<Selector>,
    sender: mpsc::UnboundedSender<Message>,
}

impl Subscriber {
    fn accepts(&self, message: &Message) -> bool {
        self.selector
            .as_ref()
            .map_or(true, |selector| selector.matches(message))
    }
}

struct SessionState {
    id: u64,
    closed: CancellationToken,
    observer: Mutex<Option<FaultObserver>>,
}

struct MemorySession {
    state: Arc<SessionState>,
    broker: Arc<BrokerState>,
}

struct MemoryConsumer {
    id: u64,
    destination: Destination,
    receiver: mpsc::UnboundedReceiver<Message>,
    closed: CancellationToken,
    broker: Arc<BrokerState>,
}

impl MemoryBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// A session factory for this broker.
    pub fn factory(&self) -> Arc<MemorySessionFactory> {
        Arc::new(MemorySessionFactory {
            broker: self.clone(),
        })
    }

    /// Closes every open session and notifies their fault observers.
    pub fn sever_connections(&self) {
        let sessions: Vec<Arc<SessionState>> = self
            .state
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        warn!(sessions = sessions.len(), "Severing all connections");
        for session in sessions {
            self.state.close_session(&session);
            let observer = session.observer.lock().take();
            if let Some(observer) = observer {
                observer(TransportError::ConnectionLost(
                    "connection severed by broker".to_string(),
                ));
            }
        }
    }

    /// When `false`, new sessions are refused with
    /// [`TransportError::ConnectionUnavailable`]. Open sessions are unaffected.
    pub fn set_available(&self, available: bool) {
        debug!(available, "Broker availability changed");
        self.state.unavailable.store(!available, Ordering::Release);
    }

    /// Makes `name` unresolvable.
    pub fn deny_destination(&self, name: impl Into<String>) {
        self.state.denied.insert(name.into());
    }

    /// Makes `name` resolvable again.
    pub fn allow_destination(&self, name: &str) {
        self.state.denied.remove(name);
    }

    /// Live consumers on `destination`.
    pub fn consumer_count(&self, destination: &Destination) -> usize {
        self.state
            .destinations
            .get(destination)
            .map_or(0, |channel| {
                channel
                    .subscribers
                    .iter()
                    .filter(|subscriber| !subscriber.sender.is_closed())
                    .count()
            })
    }

    /// Messages held on a queue for lack of a matching consumer.
    pub fn pending_count(&self, destination: &Destination) -> usize {
        self.state
            .destinations
            .get(destination)
            .map_or(0, |channel| channel.pending.len())
    }

    /// Open sessions.
    pub fn session_count(&self) -> usize {
        self.state.sessions.len()
    }
}

#[async_trait]
impl SessionFactory for MemorySessionFactory {
    async fn create_session(&self) -> Result<Box<dyn Session>, TransportError> {
        let broker = &self.broker.state;
        if !broker.is_available() {
            return Err(TransportError::ConnectionUnavailable(
                "broker is not accepting connections".to_string(),
            ));
        }
        let state = Arc::new(SessionState {
            id: broker.next_id(),
            closed: CancellationToken::new(),
            observer: Mutex::new(None),
        });
        broker.sessions.insert(state.id, Arc::clone(&state));
        trace!(session = state.id, "Session opened");
        Ok(Box::new(MemorySession {
            state,
            broker: Arc::clone(broker),
        }))
    }
}

impl BrokerState {
    fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::Acquire)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn close_session(&self, session: &SessionState) {
        if session.closed.is_cancelled() {
            return;
        }
        session.closed.cancel();
        self.sessions.remove(&session.id);
        for mut channel in self.destinations.iter_mut() {
            channel
                .subscribers
                .retain(|subscriber| subscriber.session != session.id);
        }
        trace!(session = session.id, "Session closed");
    }

    fn deliver(&self, destination: &Destination, message: Message) {
        let mut channel = self.destinations.entry(destination.clone()).or_default();
        channel
            .subscribers
            .retain(|subscriber| !subscriber.sender.is_closed());

        match destination.kind {
            DestinationKind::Topic => {
                for subscriber in channel.subscribers.iter().filter(|s| s.accepts(&message)) {
                    let _ = subscriber.sender.send(message.clone());
                }
            }
            DestinationKind::Queue => {
                let count = channel.subscribers.len();
                let start = channel.cursor;
                let mut undelivered = Some(message);
                for offset in 0..count {
                    let index = (start + offset) % count;
                    let Some(message) = undelivered.take() else {
                        break;
                    };
                    let subscriber = &channel.subscribers[index];
                    if !subscriber.accepts(&message) {
                        undelivered = Some(message);
                        continue;
                    }
                    match subscriber.sender.send(message) {
                        Ok(()) => {
                            channel.cursor = index + 1;
                        }
                        Err(mpsc::error::SendError(message)) => undelivered = Some(message),
                    }
                }
                if let Some(message) = undelivered {
                    channel.pending.push_back(message);
                }
            }
        }
    }
}

impl MemorySession {
    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.state.closed.is_cancelled() {
            Err(TransportError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn ensure_reachable(&self, name: &str) -> Result<(), TransportError> {
        if name.trim().is_empty() || self.broker.denied.contains(name) {
            Err(TransportError::DestinationUnreachable(name.to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Session for MemorySession {
    fn resolve(&self, name: &str, kind: DestinationKind) -> Result<Destination, TransportError> {
        self.ensure_open()?;
        self.ensure_reachable(name)?;
        Ok(Destination::new(name, kind))
    }

    async fn send(
        &self,
        destination: &Destination,
        producer: &ProducerSettings,
        mut message: Message,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.ensure_reachable(&destination.name)?;

        let now = now_millis();
        message.set_destination(Some(destination.clone()));
        message.set_message_id(
            (!producer.disable_message_id).then(|| format!("ID:{}", Uuid::new_v4().simple())),
        );
        message.set_timestamp(if producer.disable_message_timestamp { 0 } else { now });
        message.set_delivery_time(now.saturating_add(producer.delivery_delay));
        message.set_priority(producer.priority)?;
        if message.jms_type().is_none() {
            message.set_jms_type(producer.jms_type.clone());
        }
        trace!(
            session = self.state.id,
            destination = %destination,
            message_id = message.message_id().unwrap_or_default(),
            "Message sent"
        );

        if producer.delivery_delay > 0 {
            let broker = Arc::clone(&self.broker);
            let destination = destination.clone();
            let delay = Duration::from_millis(producer.delivery_delay.unsigned_abs());
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                broker.deliver(&destination, message);
            });
        } else {
            self.broker.deliver(destination, message);
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        destination: &Destination,
        selector: Option<Selector>,
    ) -> Result<Box<dyn Consumer>, TransportError> {
        self.ensure_open()?;
        self.ensure_reachable(&destination.name)?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let subscriber = Subscriber {
            id: self.broker.next_id(),
            session: self.state.id,
            selector,
            sender,
        };
        let id = subscriber.id;
        {
            let mut channel = self
                .broker
                .destinations
                .entry(destination.clone())
                .or_default();
            if destination.kind == DestinationKind::Queue {
                let pending = std::mem::take(&mut channel.pending);
                for message in pending {
                    if subscriber.accepts(&message) {
                        let _ = subscriber.sender.send(message);
                    } else {
                        channel.pending.push_back(message);
                    }
                }
            }
            channel.subscribers.push(subscriber);
        }
        trace!(session = self.state.id, consumer = id, destination = %destination, "Consumer subscribed");

        Ok(Box::new(MemoryConsumer {
            id,
            destination: destination.clone(),
            receiver,
            closed: self.state.closed.clone(),
            broker: Arc::clone(&self.broker),
        }))
    }

    fn set_fault_observer(&self, observer: FaultObserver) {
        *self.state.observer.lock() = Some(observer);
    }

    async fn close(&self) {
        self.broker.close_session(&self.state);
    }
}

#[async_trait]
impl Consumer for MemoryConsumer {
    async fn receive(&mut self) -> Option<Message> {
        tokio::select! {
            biased;
            () = self.closed.cancelled() => None,
            message = self.receiver.recv() => message,
        }
    }
}

impl Drop for MemoryConsumer {
    fn drop(&mut self) {
        if let Some(mut channel) = self.broker.destinations.get_mut(&self.destination) {
            channel.subscribers.retain(|subscriber| subscriber.id != self.id);
        }
        // Requeue what was handed to this consumer but never received.
        self.receiver.close();
        if self.destination.kind == DestinationKind::Queue {
            while let Ok(mut message) = self.receiver.try_recv() {
                message.set_redelivered(true);
                self.broker.deliver(&self.destination, message);
            }
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}
