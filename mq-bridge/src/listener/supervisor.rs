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

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::common::{BridgeError, TransportError, TransportRegistry};
use crate::listener::handler::ErasedHandler;
use crate::listener::{DispatchAdapter, ListenerDeclaration, MessageHandler};
use crate::message::Destination;
use crate::traits::{Consumer, FaultObserver, Session};

/// Lifecycle state of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerState {
    /// Opening a session and subscribing, or waiting out the setup backoff.
    Starting,
    /// Consuming and dispatching.
    Running,
    /// A transport fault was observed; a restart is in progress.
    Faulted,
    /// Closed for good.
    Closed,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Faulted => "faulted",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Statistics for one listener.
#[derive(Debug, Default)]
pub struct ListenerStats {
    /// Total messages received.
    pub received: AtomicUsize,
    /// Total messages handled without error.
    pub dispatched: AtomicUsize,
    /// Total messages whose binding, handler or reply failed.
    pub failed: AtomicUsize,
    /// Total restarts after a transport fault.
    pub restarts: AtomicUsize,
    /// Total failed setup attempts.
    pub setup_failures: AtomicUsize,
}

impl ListenerStats {
    /// Create new statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of messages received.
    #[must_use]
    pub fn received(&self) -> usize {
        self.received.load(Ordering::Relaxed)
    }

    /// Get the number of messages handled without error.
    #[must_use]
    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Get the number of failed dispatches.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    /// Get the number of restarts.
    #[must_use]
    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::Relaxed)
    }

    /// Get the number of failed setup attempts.
    #[must_use]
    pub fn setup_failures(&self) -> usize {
        self.setup_failures.load(Ordering::Relaxed)
    }
}

const TRANSITION_CAPACITY: usize = 16;

/// Raised when a listener cannot open its session or consumer. Only logged.
#[derive(Debug, Error)]
#[error("listener setup failed for {destination} on connection {connection}")]
struct ListenerSetupError {
    connection: String,
    destination: Destination,
    #[source]
    source: BridgeError,
}

/// One consumer task.
struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// The slot restart and close serialize on.
struct Lifecycle {
    generation: u64,
    current: Option<Worker>,
}

struct Inner {
    connection: String,
    destination: Destination,
    registry: TransportRegistry,
    adapter: DispatchAdapter,
    handler: Arc<dyn ErasedHandler>,
    backoff: Duration,
    runtime: Handle,
    state: watch::Sender<ListenerState>,
    transitions: broadcast::Sender<ListenerState>,
    stats: Arc<ListenerStats>,
    generation: AtomicU64,
    closed: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
    tracker: TaskTracker,
}

/// A supervised listener on one destination.
///
/// The listener owns at most one consumer task at a time. When the transport
/// reports a fault, or the consumer stream ends, the current task is retired
/// together with its session and a new one is started. Faults from a retired
/// task are ignored by generation.
///
/// Cloning yields another handle to the same listener.
#[derive(Clone)]
pub struct ListenerRegistration {
    inner: Arc<Inner>,
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("connection", &self.inner.connection)
            .field("destination", &self.inner.destination)
            .field("state", &self.state())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl ListenerRegistration {
    /// Starts a listener for `declaration` that dispatches to `handler`.
    ///
    /// Returns once the first consumer task is spawned; use
    /// [`subscribe_state`](Self::subscribe_state) to wait for `Running`.
    /// Setup failures after this point are logged and retried every `backoff`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConnectionNotFound`] if the declared connection
    /// is not registered.
    #[instrument(skip(handler, registry, adapter), fields(connection = %declaration.connection, destination = %declaration.destination))]
    pub async fn start<H: MessageHandler>(
        declaration: ListenerDeclaration,
        handler: H,
        registry: TransportRegistry,
        adapter: DispatchAdapter,
        backoff: Duration,
    ) -> Result<Self, BridgeError> {
        registry.get(&declaration.connection)?;
        let (state, _) = watch::channel(ListenerState::Starting);
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        let inner = Arc::new(Inner {
            connection: declaration.connection,
            destination: declaration.destination,
            registry,
            adapter,
            handler: Arc::new(handler),
            backoff,
            runtime: Handle::current(),
            state,
            transitions,
            stats: Arc::new(ListenerStats::new()),
            generation: AtomicU64::new(0),
            closed: CancellationToken::new(),
            lifecycle: Mutex::new(Lifecycle {
                generation: 0,
                current: None,
            }),
            tracker: TaskTracker::new(),
        });

        {
            let mut lifecycle = inner.lifecycle.lock().await;
            lifecycle.current = Some(inner.spawn_worker(lifecycle.generation));
        }
        debug!("Listener started");
        Ok(Self { inner })
    }

    /// The logical connection name.
    pub fn connection(&self) -> &str {
        &self.inner.connection
    }

    /// The declared destination.
    pub fn destination(&self) -> &Destination {
        &self.inner.destination
    }

    /// The current state.
    pub fn state(&self) -> ListenerState {
        *self.inner.state.borrow()
    }

    /// Watches state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ListenerState> {
        self.inner.state.subscribe()
    }

    /// Receives every state transition after this call, in order.
    ///
    /// Unlike [`subscribe_state`](Self::subscribe_state), intermediate states
    /// are not coalesced. A receiver more than 16 transitions behind lags.
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<ListenerState> {
        self.inner.transitions.subscribe()
    }

    /// The generation of the current consumer task, starting at zero.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Dispatch and lifecycle counters.
    pub fn stats(&self) -> &ListenerStats {
        &self.inner.stats
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// Stops the listener and waits for its consumer task to finish.
    ///
    /// Interrupts the setup backoff and a blocked receive. Closing an
    /// already-closed listener does nothing.
    #[instrument(skip(self), fields(connection = %self.inner.connection, destination = %self.inner.destination))]
    pub async fn close(&self) {
        let inner = &self.inner;
        let first = !inner.closed.is_cancelled();
        inner.closed.cancel();
        inner.set_state(ListenerState::Closed);

        let worker = inner.lifecycle.lock().await.current.take();
        if let Some(worker) = worker {
            worker.cancel.cancel();
            if let Err(e) = worker.handle.await {
                error!("Listener task panicked: {}", e);
            }
        }

        inner.tracker.close();
        inner.tracker.wait().await;
        if first {
            info!("Listener closed");
        }
    }
}

impl Inner {
    fn set_state(&self, next: ListenerState) {
        let changed = self.state.send_if_modified(|state| {
            if *state == ListenerState::Closed || *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            trace!(state = %next, "Listener state changed");
            let _ = self.transitions.send(next);
        }
    }

    fn spawn_worker(self: &Arc<Self>, generation: u64) -> Worker {
        let cancel = self.closed.child_token();
        let token = cancel.clone();
        let inner = Arc::clone(self);
        let handle = self
            .tracker
            .spawn_on(async move { inner.run(generation, token).await }, &self.runtime);
        Worker { cancel, handle }
    }

    /// Schedules a restart of `generation`. Safe to call from any thread.
    fn on_fault(self: &Arc<Self>, generation: u64, fault: &TransportError) {
        warn!(
            connection = %self.connection,
            destination = %self.destination,
            generation,
            error = %fault,
            "Transport fault on listener"
        );
        let inner = Arc::clone(self);
        self.tracker
            .spawn_on(async move { inner.restart(generation).await }, &self.runtime);
    }

    async fn restart(self: Arc<Self>, generation: u64) {
        let mut lifecycle = self.lifecycle.lock().await;
        if self.closed.is_cancelled() {
            trace!(generation, "Listener closed, not restarting");
            return;
        }
        if lifecycle.generation != generation {
            trace!(
                generation,
                current = lifecycle.generation,
                "Ignoring stale fault"
            );
            return;
        }

        self.set_state(ListenerState::Faulted);
        if let Some(worker) = lifecycle.current.take() {
            worker.cancel.cancel();
            if let Err(e) = worker.handle.await {
                error!("Listener task panicked: {}", e);
            }
        }

        lifecycle.generation += 1;
        self.generation.store(lifecycle.generation, Ordering::Release);
        self.stats.restarts.fetch_add(1, Ordering::Relaxed);
        self.set_state(ListenerState::Starting);
        info!(
            connection = %self.connection,
            destination = %self.destination,
            generation = lifecycle.generation,
            "Restarting listener"
        );
        lifecycle.current = Some(self.spawn_worker(lifecycle.generation));
    }

    async fn run(self: Arc<Self>, generation: u64, cancel: CancellationToken) {
        loop {
            let setup = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                setup = self.setup(generation) => setup,
            };
            match setup {
                Ok((session, consumer)) => {
                    self.consume(generation, session, consumer, &cancel).await;
                    return;
                }
                Err(e) => {
                    self.stats.setup_failures.fetch_add(1, Ordering::Relaxed);
                    error!(
                        error = %e,
                        cause = %e.source,
                        backoff = ?self.backoff,
                        "Listener setup failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return,
                        () = tokio::time::sleep(self.backoff) => {}
                    }
                }
            }
        }
    }

    async fn setup(
        self: &Arc<Self>,
        generation: u64,
    ) -> Result<(Box<dyn Session>, Box<dyn Consumer>), ListenerSetupError> {
        let fail = |source: BridgeError| ListenerSetupError {
            connection: self.connection.clone(),
            destination: self.destination.clone(),
            source,
        };

        let factory = self.registry.get(&self.connection).map_err(fail)?;
        let session = factory
            .create_session()
            .await
            .map_err(|e| fail(e.into()))?;

        let subscribed = match session.resolve(&self.destination.name, self.destination.kind) {
            Ok(destination) => session.subscribe(&destination, None).await,
            Err(e) => Err(e),
        };
        let consumer = match subscribed {
            Ok(consumer) => consumer,
            Err(e) => {
                session.close().await;
                return Err(fail(e.into()));
            }
        };

        let weak = Arc::downgrade(self);
        let observer: FaultObserver = Arc::new(move |fault: TransportError| {
            if let Some(inner) = weak.upgrade() {
                inner.on_fault(generation, &fault);
            }
        });
        session.set_fault_observer(observer);
        Ok((session, consumer))
    }

    async fn consume(
        self: &Arc<Self>,
        generation: u64,
        session: Box<dyn Session>,
        mut consumer: Box<dyn Consumer>,
        cancel: &CancellationToken,
    ) {
        self.set_state(ListenerState::Running);
        info!(
            connection = %self.connection,
            destination = %self.destination,
            generation,
            "Listener running"
        );

        let mut ended = false;
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = consumer.receive() => next,
            };
            let Some(message) = next else {
                ended = true;
                break;
            };
            self.stats.received.fetch_add(1, Ordering::Relaxed);

            let dispatched = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = AssertUnwindSafe(
                    self.adapter.dispatch_erased(session.as_ref(), message, self.handler.as_ref()),
                )
                .catch_unwind() => result.unwrap_or_else(|payload| {
                    Err(BridgeError::HandlerInvocation(format!(
                        "handler panicked: {}",
                        panic_message(&*payload)
                    )))
                }),
            };
            match dispatched {
                Ok(()) => {
                    self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    error!(destination = %self.destination, error = %e, "Failed to dispatch message");
                }
            }
        }

        drop(consumer);
        session.close().await;
        trace!(generation, "Listener session closed");
        if ended && !cancel.is_cancelled() {
            self.on_fault(generation, &TransportError::SessionClosed);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
