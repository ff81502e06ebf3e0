//! Observable wrapper around the exchange state machine.
//!
//! `SessionStreamConsumer` owns the single `StreamState` of a session view,
//! publishes every transition on a `watch` channel, and tags each exchange
//! with a generation number so events of a cancelled exchange can never be
//! folded into the next one.

use continuum_core::Result;
use continuum_core::backend::EventStream;
use continuum_core::session::{RecoveryChoice, SessionUnavailableInfo, StreamEvent, StreamState};
use futures::StreamExt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Monotonically increasing id of one exchange.
pub type ExchangeId = u64;

/// Handle to the exchange started by [`SessionStreamConsumer::begin`].
#[derive(Debug, Clone)]
pub struct Exchange {
    pub id: ExchangeId,
    /// Cancelled when the user aborts the exchange.
    pub cancel: CancellationToken,
}

struct Inner {
    state: StreamState,
    generation: ExchangeId,
    cancel: Option<CancellationToken>,
}

pub struct SessionStreamConsumer {
    inner: Mutex<Inner>,
    state_tx: watch::Sender<StreamState>,
}

impl Default for SessionStreamConsumer {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStreamConsumer {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(StreamState::Idle);
        Self {
            inner: Mutex::new(Inner {
                state: StreamState::Idle,
                generation: 0,
                cancel: None,
            }),
            state_tx,
        }
    }

    /// Observes state transitions. The receiver starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<StreamState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> StreamState {
        self.lock().state.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        self.state_tx.send_replace(inner.state.clone());
    }

    /// Starts a new exchange (`Idle`/terminal -> `Streaming`).
    pub fn begin(&self) -> Result<Exchange> {
        let mut inner = self.lock();
        inner.state.begin()?;
        inner.generation += 1;
        let cancel = CancellationToken::new();
        inner.cancel = Some(cancel.clone());
        self.publish(&inner);
        tracing::debug!(exchange = inner.generation, "Exchange started");
        Ok(Exchange {
            id: inner.generation,
            cancel,
        })
    }

    /// Folds one event of exchange `id`. Returns `true` once the exchange is over.
    pub fn apply(&self, id: ExchangeId, event: StreamEvent) -> bool {
        let mut inner = self.lock();
        if id != inner.generation || !inner.state.is_streaming() {
            tracing::debug!(exchange = id, current = inner.generation, kind = event.kind(), "Dropping stale event");
            return true;
        }
        if matches!(event, StreamEvent::Unknown) {
            tracing::warn!(exchange = id, "Ignoring event of unknown kind");
        }
        let terminal = inner.state.apply(event);
        if terminal {
            inner.cancel = None;
            tracing::info!(exchange = id, phase = inner.state.phase(), "Exchange finished");
        }
        self.publish(&inner);
        terminal
    }

    /// User-initiated stop of the streaming exchange.
    pub fn abort(&self) -> bool {
        let mut inner = self.lock();
        if !inner.state.abort() {
            return false;
        }
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
        tracing::info!(exchange = inner.generation, "Exchange aborted by user");
        self.publish(&inner);
        true
    }

    /// Ends exchange `id` with a transport error.
    pub fn fail_transport(&self, id: ExchangeId, message: impl Into<String>) -> bool {
        let mut inner = self.lock();
        if id != inner.generation {
            return false;
        }
        let message = message.into();
        if !inner.state.fail_transport(message.clone()) {
            return false;
        }
        inner.cancel = None;
        tracing::warn!(exchange = id, error = %message, "Exchange failed");
        self.publish(&inner);
        true
    }

    /// Enters `SessionUnavailable` because a resume probe failed.
    pub fn require_recovery(&self, info: SessionUnavailableInfo) -> Result<()> {
        let mut inner = self.lock();
        inner.state.require_recovery(info)?;
        self.publish(&inner);
        Ok(())
    }

    /// Applies the user's choice for a `SessionUnavailable` state and returns to `Idle`.
    pub fn resolve_unavailable(&self, choice: RecoveryChoice) -> Result<SessionUnavailableInfo> {
        let mut inner = self.lock();
        let info = inner.state.resolve_unavailable(choice)?;
        self.publish(&inner);
        Ok(info)
    }

    /// Returns to `Idle` for a new session view, aborting a running exchange first.
    pub fn clear(&self) {
        let mut inner = self.lock();
        if inner.state.is_streaming() {
            inner.state.abort();
            if let Some(cancel) = inner.cancel.take() {
                cancel.cancel();
            }
        }
        inner.state = StreamState::Idle;
        self.publish(&inner);
    }

    /// Pumps `events` into the state machine until the exchange ends.
    ///
    /// Stops early when `exchange.cancel` fires; the state then already is
    /// `Aborted`. A sequence that ends without a terminal event fails the
    /// exchange with a transport error.
    pub async fn drive(&self, exchange: &Exchange, mut events: EventStream) -> StreamState {
        loop {
            tokio::select! {
                biased;
                _ = exchange.cancel.cancelled() => break,
                next = events.next() => match next {
                    Some(Ok(event)) => {
                        if self.apply(exchange.id, event) {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        self.fail_transport(exchange.id, e.to_string());
                        break;
                    }
                    None => {
                        self.fail_transport(exchange.id, "stream ended before completion");
                        break;
                    }
                },
            }
        }
        self.state()
    }
}
