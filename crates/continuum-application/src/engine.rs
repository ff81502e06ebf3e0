//! UI-facing facade of the continuity engine.
//!
//! `ContinuityEngine` binds one session view at a time. It routes sends to
//! the backend, exposes the exchange state as a `watch` channel, keeps the
//! native session's pointer record current, and runs imports.

use crate::continuity_manager::{Continuation, ContinuityManager};
use crate::import_pipeline::{ImportOptions, ImportPipeline, ImportRun};
use crate::stream_consumer::{Exchange, SessionStreamConsumer};
use continuum_core::backend::{BackendSession, SendOptions, SendRequest};
use continuum_core::config::EngineConfig;
use continuum_core::import::{ExportReader, ImportScanResult};
use continuum_core::session::{
    ContinuityDecision, RecoveryChoice, SessionStore, SessionUnavailableInfo, StreamState,
};
use continuum_core::{ContinuumError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// What the current view is bound to.
#[derive(Debug, Default)]
struct SessionView {
    /// Bumped whenever the view changes; background work for an older view
    /// must not touch the new one.
    epoch: u64,
    /// Native session the next send goes to. `None` creates a new session.
    session_id: Option<String>,
    /// Imported session on display; sending is disabled until it is continued.
    read_only_import: Option<String>,
    /// Recovery choice passed with the next send.
    recovery_mode: Option<RecoveryChoice>,
    /// Context prepended to the next send.
    continuation: Option<Continuation>,
}

/// Observable handle to one exchange.
pub struct ExchangeHandle {
    /// State transitions of the exchange.
    pub states: watch::Receiver<StreamState>,
    task: JoinHandle<StreamState>,
}

impl ExchangeHandle {
    /// Waits until the exchange is over and its pointer record is written.
    ///
    /// Aborted and failed exchanges also keep the session they were bound to
    /// and refresh its pointer once the backend has named it.
    pub async fn finished(self) -> Result<StreamState> {
        self.task
            .await
            .map_err(|e| ContinuumError::internal(format!("Exchange task failed: {}", e)))
    }
}

pub struct ContinuityEngine {
    backend: Arc<dyn BackendSession>,
    continuity: Arc<ContinuityManager>,
    importer: Arc<ImportPipeline>,
    consumer: Arc<SessionStreamConsumer>,
    view: Arc<Mutex<SessionView>>,
}

impl ContinuityEngine {
    /// Creates an engine over the given collaborators.
    ///
    /// # Arguments
    ///
    /// * `backend` - Resumes native sessions and streams exchanges
    /// * `store` - Local artifact store
    /// * `reader` - Raw export file access for scan/import
    /// * `config` - Engine settings (replay limit, title bound, archive flag)
    pub fn new(
        backend: Arc<dyn BackendSession>,
        store: Arc<dyn SessionStore>,
        reader: Arc<dyn ExportReader>,
        config: &EngineConfig,
    ) -> Self {
        let continuity = Arc::new(ContinuityManager::new(
            store.clone(),
            backend.clone(),
            config.max_context_messages,
            config.title_max_chars,
        ));
        let importer = Arc::new(ImportPipeline::new(
            reader,
            store,
            ImportOptions {
                archive_imported: config.archive_imported,
                title_max_chars: config.title_max_chars,
            },
        ));
        Self {
            backend,
            continuity,
            importer,
            consumer: Arc::new(SessionStreamConsumer::new()),
            view: Arc::new(Mutex::new(SessionView::default())),
        }
    }

    fn lock_view(&self) -> MutexGuard<'_, SessionView> {
        lock(&self.view)
    }

    /// Current exchange state.
    pub fn state(&self) -> StreamState {
        self.consumer.state()
    }

    /// Observes exchange state transitions across exchanges.
    pub fn subscribe(&self) -> watch::Receiver<StreamState> {
        self.consumer.subscribe()
    }

    /// Native session the next send goes to.
    pub fn bound_session_id(&self) -> Option<String> {
        self.lock_view().session_id.clone()
    }

    /// Whether `send` would currently be accepted.
    pub fn can_send(&self) -> bool {
        self.lock_view().read_only_import.is_none() && self.consumer.state().can_begin()
    }

    /// Opens a session view and decides how it continues.
    ///
    /// A running exchange of the previous view is aborted. `RecoveryNeeded`
    /// also puts the exchange state into `SessionUnavailable`, so the user
    /// resolves it through [`resolve_session_unavailable`](Self::resolve_session_unavailable).
    pub async fn open_session(&self, session_id: Option<&str>) -> Result<ContinuityDecision> {
        self.consumer.clear();
        let decision = self.continuity.decide(session_id).await?;

        let mut view = self.lock_view();
        let epoch = view.epoch + 1;
        *view = SessionView {
            epoch,
            ..SessionView::default()
        };
        match &decision {
            ContinuityDecision::FreshSession => {}
            ContinuityDecision::ResumeSession { session_id } => {
                view.session_id = Some(session_id.clone());
            }
            ContinuityDecision::ContinueFromImported {
                original_session_id,
                ..
            } => {
                view.read_only_import = Some(original_session_id.clone());
            }
            ContinuityDecision::RecoveryNeeded(info) => {
                view.session_id = info
                    .session_id
                    .clone()
                    .or_else(|| session_id.map(str::to_string));
                self.consumer.require_recovery(info.clone())?;
            }
        }
        Ok(decision)
    }

    /// Sends a message in the bound session and starts observing the exchange.
    ///
    /// Rejected while an exchange is streaming, while a `SessionUnavailable`
    /// choice is pending, and while an imported session is shown read-only.
    pub fn send(&self, text: &str) -> Result<ExchangeHandle> {
        let (exchange, request, pending, epoch) = {
            let mut view = self.lock_view();
            if let Some(imported) = &view.read_only_import {
                return Err(ContinuumError::invalid_state(format!(
                    "imported session '{}' is read-only until it is continued",
                    imported
                )));
            }
            let exchange = self.consumer.begin()?;

            let pending = PendingSend {
                recovery_mode: view.recovery_mode.take(),
                continuation: view.continuation.take(),
            };
            let message = match &pending.continuation {
                Some(continuation) => format!("{}\n\n{}", continuation.prompt, text),
                None => text.to_string(),
            };
            let request = SendRequest {
                session_id: view.session_id.clone(),
                message,
                options: SendOptions {
                    recovery_mode: pending.recovery_mode,
                    continued_from: pending
                        .continuation
                        .as_ref()
                        .map(|c| c.original_session_id.clone()),
                },
            };
            (exchange, request, pending, view.epoch)
        };

        tracing::info!(session_id = ?request.session_id, exchange = exchange.id, "Sending message");
        let states = self.consumer.subscribe();
        let task = tokio::spawn(run_exchange(
            ExchangeContext {
                backend: self.backend.clone(),
                continuity: self.continuity.clone(),
                consumer: self.consumer.clone(),
                view: self.view.clone(),
                epoch,
            },
            exchange,
            request,
            text.to_string(),
            pending,
        ));
        Ok(ExchangeHandle { states, task })
    }

    /// Stops the streaming exchange. Returns `false` when nothing was streaming.
    pub fn abort(&self) -> bool {
        self.consumer.abort()
    }

    /// Applies the user's choice for an unavailable session.
    ///
    /// `InjectContext` keeps the session bound and asks the backend to replay
    /// local history on the next send; `FreshStart` unbinds it so the next
    /// send starts clean.
    pub fn resolve_session_unavailable(&self, choice: RecoveryChoice) -> Result<SessionUnavailableInfo> {
        let info = self.consumer.resolve_unavailable(choice)?;
        let mut view = self.lock_view();
        view.epoch += 1;
        match choice {
            RecoveryChoice::InjectContext => {
                if view.session_id.is_none() {
                    view.session_id = info.session_id.clone();
                }
            }
            RecoveryChoice::FreshStart => {
                view.session_id = None;
                view.continuation = None;
            }
        }
        view.recovery_mode = Some(choice);
        Ok(info)
    }

    /// Continues an imported session in a new native session.
    ///
    /// The imported session stays untouched; its trailing messages are
    /// replayed as context with the next send.
    pub async fn continue_imported_session(&self, session_id: &str) -> Result<Continuation> {
        let continuation = self.continuity.continue_imported(session_id).await?;
        self.consumer.clear();

        let mut view = self.lock_view();
        let epoch = view.epoch + 1;
        *view = SessionView {
            epoch,
            continuation: Some(continuation.clone()),
            ..SessionView::default()
        };
        tracing::info!(
            original_session_id = %session_id,
            replayed = continuation.replayed_messages,
            "Continuing imported session"
        );
        Ok(continuation)
    }

    /// Summarizes an export without importing it.
    pub async fn scan_export(&self, location: &Path) -> Result<ImportScanResult> {
        self.importer.scan(location).await
    }

    /// Starts an import in the background.
    pub fn run_import(&self, location: impl Into<PathBuf>) -> ImportRun {
        self.importer.spawn_import(location.into())
    }
}

fn lock(view: &Mutex<SessionView>) -> MutexGuard<'_, SessionView> {
    view.lock().unwrap_or_else(PoisonError::into_inner)
}

/// View state consumed by one send, restored if the exchange never started.
struct PendingSend {
    recovery_mode: Option<RecoveryChoice>,
    continuation: Option<Continuation>,
}

struct ExchangeContext {
    backend: Arc<dyn BackendSession>,
    continuity: Arc<ContinuityManager>,
    consumer: Arc<SessionStreamConsumer>,
    view: Arc<Mutex<SessionView>>,
    epoch: u64,
}

async fn run_exchange(
    ctx: ExchangeContext,
    exchange: Exchange,
    request: SendRequest,
    user_text: String,
    pending: PendingSend,
) -> StreamState {
    let bound_session_id = request.session_id.clone();
    let events = match ctx.backend.send(request).await {
        Ok(events) => events,
        Err(e) => {
            ctx.consumer.fail_transport(exchange.id, e.to_string());
            let mut view = lock(&ctx.view);
            if view.epoch == ctx.epoch {
                view.recovery_mode = view.recovery_mode.or(pending.recovery_mode);
                if view.continuation.is_none() {
                    view.continuation = pending.continuation;
                }
            }
            return ctx.consumer.state();
        }
    };

    let final_state = ctx.consumer.drive(&exchange, events).await;
    let Some(metadata) = final_state.metadata() else {
        return final_state;
    };
    // Aborted and failed exchanges count only once the backend named their session.
    let completed = matches!(final_state, StreamState::Completed { .. });
    if !completed && metadata.session_id.is_none() {
        return final_state;
    }
    if let Some(session_id) = &metadata.session_id {
        bind_session(&ctx, session_id);
    }

    let continued_from = pending
        .continuation
        .as_ref()
        .map(|c| c.original_session_id.as_str());
    match ctx
        .continuity
        .record_exchange(bound_session_id.as_deref(), metadata, &user_text, continued_from)
        .await
    {
        Ok(Some(session)) => bind_session(&ctx, &session.id),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Failed to update session pointer"),
    }
    final_state
}

/// Binds the view to `session_id` unless the view changed meanwhile.
fn bind_session(ctx: &ExchangeContext, session_id: &str) {
    let mut view = lock(&ctx.view);
    if view.epoch == ctx.epoch {
        view.session_id = Some(session_id.to_string());
    }
}
