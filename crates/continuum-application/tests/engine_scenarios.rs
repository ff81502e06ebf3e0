//! End-to-end scenarios for `ContinuityEngine` over the markdown store and
//! the file-system export reader, with a scripted backend.

use async_trait::async_trait;
use continuum_application::ContinuityEngine;
use continuum_core::backend::{BackendSession, EventStream, ResumeOutcome, SendRequest};
use continuum_core::config::EngineConfig;
use continuum_core::import::{ExportKind, ImportPhase};
use continuum_core::session::{
    ContinuityDecision, RecoveryChoice, SessionSource, SessionStore, SessionUnavailableInfo,
    StreamErrorKind, StreamEvent, StreamState,
};
use continuum_core::{ContinuumError, Result};
use continuum_infrastructure::{FsExportReader, MarkdownSessionStore};
use futures::StreamExt;
use futures::stream;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

enum Script {
    /// Plays the events, then ends the stream.
    Events(Vec<StreamEvent>),
    /// Plays the events, then never yields again.
    Hang(Vec<StreamEvent>),
    /// Refuses to start the exchange.
    Refuse(String),
}

#[derive(Default)]
struct ScriptedBackend {
    unavailable: Mutex<HashMap<String, SessionUnavailableInfo>>,
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<SendRequest>>,
}

impl ScriptedBackend {
    fn script(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    fn mark_unavailable(&self, session_id: &str, info: SessionUnavailableInfo) {
        self.unavailable
            .lock()
            .unwrap()
            .insert(session_id.to_string(), info);
    }

    fn requests(&self) -> Vec<SendRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendSession for ScriptedBackend {
    async fn resume(&self, session_id: &str) -> Result<ResumeOutcome> {
        Ok(match self.unavailable.lock().unwrap().get(session_id) {
            Some(info) => ResumeOutcome::Unavailable(info.clone()),
            None => ResumeOutcome::Resumable,
        })
    }

    async fn send(&self, request: SendRequest) -> Result<EventStream> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted exchange left");
        match script {
            Script::Events(events) => Ok(stream::iter(events.into_iter().map(Ok)).boxed()),
            Script::Hang(events) => Ok(stream::iter(events.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed()),
            Script::Refuse(message) => Err(ContinuumError::transport(message)),
        }
    }
}

struct Harness {
    _temp_dir: TempDir,
    export_dir: std::path::PathBuf,
    store: Arc<MarkdownSessionStore>,
    backend: Arc<ScriptedBackend>,
    engine: ContinuityEngine,
}

async fn harness() -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(
        MarkdownSessionStore::new(temp_dir.path().join("artifacts"))
            .await
            .unwrap(),
    );
    let backend = Arc::new(ScriptedBackend::default());
    let engine = ContinuityEngine::new(
        backend.clone(),
        store.clone(),
        Arc::new(FsExportReader::new()),
        &EngineConfig::default(),
    );
    let export_dir = temp_dir.path().join("export");
    std::fs::create_dir_all(&export_dir).unwrap();
    Harness {
        _temp_dir: temp_dir,
        export_dir,
        store,
        backend,
        engine,
    }
}

fn session_event(id: &str) -> StreamEvent {
    StreamEvent::Session {
        session_id: id.into(),
        title: None,
    }
}

fn text(content: &str) -> StreamEvent {
    StreamEvent::Text {
        content: content.into(),
    }
}

fn done() -> StreamEvent {
    StreamEvent::Done {
        session_id: None,
        title: None,
    }
}

const CLAUDE_EXPORT: &str = r#"[
  {"uuid":"xyz","name":"Trip planning","created_at":"2024-05-01T10:00:00Z",
   "updated_at":"2024-05-01T10:05:00Z",
   "chat_messages":[
     {"sender":"human","text":"Where should we go?","created_at":"2024-05-01T10:00:00Z"},
     {"sender":"assistant","text":"Kyoto in autumn.","created_at":"2024-05-01T10:01:00Z"}
   ]},
  {"uuid":"empty","name":"Nothing here","chat_messages":[]}
]"#;

fn write_claude_export(dir: &std::path::Path) {
    std::fs::write(dir.join("conversations.json"), CLAUDE_EXPORT).unwrap();
}

async fn import_claude_export(h: &Harness) {
    write_claude_export(&h.export_dir);
    let result = h.engine.run_import(&h.export_dir).finish().await.unwrap();
    assert_eq!(result.conversations_imported, 1);
}

#[tokio::test]
async fn test_completed_exchange_writes_native_pointer() {
    let h = harness().await;
    assert_eq!(
        h.engine.open_session(None).await.unwrap(),
        ContinuityDecision::FreshSession
    );

    h.backend.script(Script::Events(vec![
        session_event("s1"),
        StreamEvent::Init {
            tools: vec!["search".into()],
        },
        text("Hi"),
        done(),
    ]));
    let state = h.engine.send("hello there").unwrap().finished().await.unwrap();

    match &state {
        StreamState::Completed { message, metadata } => {
            assert_eq!(message.text, "Hi");
            assert_eq!(metadata.session_id.as_deref(), Some("s1"));
        }
        other => panic!("expected Completed, got {:?}", other),
    }
    assert_eq!(h.engine.state(), state);
    assert_eq!(h.engine.bound_session_id().as_deref(), Some("s1"));

    let pointer = h.store.read_session_metadata("s1").await.unwrap().unwrap();
    assert_eq!(pointer.source, SessionSource::Native);
    assert_eq!(pointer.title.as_deref(), Some("hello there"));
    assert_eq!(pointer.message_count, 0);
    assert!(h.store.read_session_messages("s1").await.unwrap().is_empty());

    let requests = h.backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].session_id, None);
    assert_eq!(requests[0].message, "hello there");
}

#[tokio::test]
async fn test_follow_up_send_reuses_bound_session() {
    let h = harness().await;
    h.engine.open_session(None).await.unwrap();

    h.backend
        .script(Script::Events(vec![session_event("s1"), text("one"), done()]));
    h.engine.send("first").unwrap().finished().await.unwrap();

    h.backend.script(Script::Events(vec![text("two"), done()]));
    let state = h.engine.send("second").unwrap().finished().await.unwrap();
    assert!(matches!(state, StreamState::Completed { .. }));

    let requests = h.backend.requests();
    assert_eq!(requests[1].session_id.as_deref(), Some("s1"));
    let sessions = h.store.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].title.as_deref(), Some("first"));
}

#[tokio::test]
async fn test_session_unavailable_mid_stream_then_fresh_start() {
    let h = harness().await;
    assert_eq!(
        h.engine.open_session(Some("s1")).await.unwrap(),
        ContinuityDecision::ResumeSession {
            session_id: "s1".into()
        }
    );

    h.backend.script(Script::Events(vec![
        session_event("s1"),
        text("partial"),
        StreamEvent::SessionUnavailable {
            session_id: None,
            reason: "session expired".into(),
            has_markdown_history: true,
            message_count: 5,
        },
    ]));
    let state = h.engine.send("hello").unwrap().finished().await.unwrap();
    match &state {
        StreamState::SessionUnavailable(info) => {
            assert!(info.has_local_history);
            assert_eq!(info.prior_message_count, 5);
        }
        other => panic!("expected SessionUnavailable, got {:?}", other),
    }
    assert!(h.engine.send("again").is_err());
    assert!(!h.engine.can_send());

    h.engine
        .resolve_session_unavailable(RecoveryChoice::FreshStart)
        .unwrap();
    assert_eq!(h.engine.state(), StreamState::Idle);
    assert_eq!(h.engine.bound_session_id(), None);
    assert!(h.engine.can_send());

    h.backend
        .script(Script::Events(vec![session_event("s2"), text("clean"), done()]));
    h.engine.send("start over").unwrap().finished().await.unwrap();

    let request = h.backend.requests().pop().unwrap();
    assert_eq!(request.session_id, None);
    assert_eq!(request.options.recovery_mode, Some(RecoveryChoice::FreshStart));
}

#[tokio::test]
async fn test_open_unresumable_session_then_inject_context() {
    let h = harness().await;
    h.backend.mark_unavailable(
        "gone",
        SessionUnavailableInfo {
            session_id: None,
            reason: "not found on backend".into(),
            has_local_history: true,
            prior_message_count: 3,
        },
    );

    let decision = h.engine.open_session(Some("gone")).await.unwrap();
    match decision {
        ContinuityDecision::RecoveryNeeded(info) => {
            assert_eq!(info.session_id.as_deref(), Some("gone"));
            assert_eq!(info.prior_message_count, 3);
        }
        other => panic!("expected RecoveryNeeded, got {:?}", other),
    }
    assert!(matches!(h.engine.state(), StreamState::SessionUnavailable(_)));
    assert!(h.engine.send("hi").is_err());

    let info = h
        .engine
        .resolve_session_unavailable(RecoveryChoice::InjectContext)
        .unwrap();
    assert!(info.has_local_history);
    assert_eq!(h.engine.bound_session_id().as_deref(), Some("gone"));

    h.backend.script(Script::Events(vec![
        session_event("gone-2"),
        text("back"),
        done(),
    ]));
    h.engine.send("hi").unwrap().finished().await.unwrap();

    let request = h.backend.requests().pop().unwrap();
    assert_eq!(request.session_id.as_deref(), Some("gone"));
    assert_eq!(
        request.options.recovery_mode,
        Some(RecoveryChoice::InjectContext)
    );
    assert_eq!(h.engine.bound_session_id().as_deref(), Some("gone-2"));
}

#[tokio::test]
async fn test_scan_counts_non_empty_and_import_is_idempotent() {
    let h = harness().await;
    write_claude_export(&h.export_dir);

    let scan = h.engine.scan_export(&h.export_dir).await.unwrap();
    assert_eq!(scan.source_kind, Some(ExportKind::Claude));
    assert_eq!(scan.total_conversations, 2);
    assert_eq!(scan.non_empty_conversations, 1);

    let mut run = h.engine.run_import(&h.export_dir);
    let mut snapshots = Vec::new();
    while let Some(snapshot) = run.progress.recv().await {
        snapshots.push(snapshot);
    }
    let first = run.finish().await.unwrap();
    assert_eq!(first.conversations_imported, 1);
    assert_eq!(first.created_artifacts, vec!["claude-xyz".to_string()]);
    assert_eq!(snapshots.first().unwrap().phase, ImportPhase::Scanning);
    let last = snapshots.last().unwrap();
    assert_eq!(last.phase, ImportPhase::Complete);
    assert_eq!((last.processed, last.total), (1, 1));

    let second = h.engine.run_import(&h.export_dir).finish().await.unwrap();
    assert_eq!(second.conversations_imported, 0);
    assert_eq!(second.skipped_existing, vec!["claude-xyz".to_string()]);

    let sessions = h.store.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    let imported = &sessions[0];
    assert_eq!(imported.id, "claude-xyz");
    assert_eq!(imported.source, SessionSource::ClaudeImport);
    assert_eq!(imported.message_count, 2);
    assert!(imported.archived);
}

#[tokio::test]
async fn test_scan_missing_export_location() {
    let h = harness().await;
    let err = h
        .engine
        .scan_export(&h.export_dir.join("nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, ContinuumError::ExportNotFound { .. }));
}

#[tokio::test]
async fn test_continue_imported_session_seeds_new_native_session() {
    let h = harness().await;
    import_claude_export(&h).await;

    let decision = h.engine.open_session(Some("claude-xyz")).await.unwrap();
    match &decision {
        ContinuityDecision::ContinueFromImported {
            original_session_id,
            prior_messages,
        } => {
            assert_eq!(original_session_id, "claude-xyz");
            assert_eq!(prior_messages.len(), 2);
        }
        other => panic!("expected ContinueFromImported, got {:?}", other),
    }
    let err = h.engine.send("more").unwrap_err();
    assert!(matches!(err, ContinuumError::InvalidState(_)));
    assert!(h.backend.requests().is_empty());

    let continuation = h
        .engine
        .continue_imported_session("claude-xyz")
        .await
        .unwrap();
    assert_eq!(continuation.replayed_messages, 2);
    assert!(continuation.prompt.contains("Kyoto in autumn."));

    h.backend
        .script(Script::Events(vec![session_event("n1"), text("Sure"), done()]));
    h.engine.send("What about spring?").unwrap().finished().await.unwrap();

    let request = h.backend.requests().pop().unwrap();
    assert_eq!(request.session_id, None);
    assert_eq!(request.options.continued_from.as_deref(), Some("claude-xyz"));
    assert!(request.message.starts_with(&continuation.prompt));
    assert!(request.message.ends_with("\n\nWhat about spring?"));

    let pointer = h.store.read_session_metadata("n1").await.unwrap().unwrap();
    assert_eq!(pointer.continued_from.as_deref(), Some("claude-xyz"));
    assert_eq!(
        h.store.read_session_messages("claude-xyz").await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_refused_send_keeps_pending_continuation() {
    let h = harness().await;
    import_claude_export(&h).await;
    h.engine
        .continue_imported_session("claude-xyz")
        .await
        .unwrap();

    h.backend.script(Script::Refuse("connection refused".into()));
    let state = h.engine.send("retry me").unwrap().finished().await.unwrap();
    assert!(matches!(
        state,
        StreamState::Error {
            kind: StreamErrorKind::Transport,
            ..
        }
    ));

    h.backend
        .script(Script::Events(vec![session_event("n2"), text("ok"), done()]));
    h.engine.send("retry me").unwrap().finished().await.unwrap();

    let request = h.backend.requests().pop().unwrap();
    assert_eq!(request.options.continued_from.as_deref(), Some("claude-xyz"));
}

#[tokio::test]
async fn test_stream_ending_without_terminal_event_is_transport_error() {
    let h = harness().await;
    h.engine.open_session(None).await.unwrap();
    h.backend
        .script(Script::Events(vec![session_event("s1"), text("partial")]));

    let state = h.engine.send("hello").unwrap().finished().await.unwrap();
    match state {
        StreamState::Error { kind, message, .. } => {
            assert_eq!(kind, StreamErrorKind::Transport);
            assert!(message.contains("stream ended"));
        }
        other => panic!("expected Error, got {:?}", other),
    }
    // the backend named the session before the stream broke
    assert_eq!(h.engine.bound_session_id().as_deref(), Some("s1"));
    assert!(h.store.read_session_metadata("s1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_failed_exchange_without_session_writes_no_pointer() {
    let h = harness().await;
    h.engine.open_session(None).await.unwrap();
    h.backend.script(Script::Events(vec![
        text("partial"),
        StreamEvent::Error {
            error: "overloaded".into(),
        },
    ]));

    let state = h.engine.send("hello").unwrap().finished().await.unwrap();
    assert!(matches!(
        state,
        StreamState::Error {
            kind: StreamErrorKind::Protocol,
            ..
        }
    ));
    assert_eq!(h.engine.bound_session_id(), None);
    assert!(h.store.list_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_protocol_error_after_session_keeps_binding() {
    let h = harness().await;
    h.engine.open_session(None).await.unwrap();
    h.backend.script(Script::Events(vec![
        session_event("s1"),
        text("partial"),
        StreamEvent::Error {
            error: "overloaded".into(),
        },
    ]));
    let state = h.engine.send("plan a trip").unwrap().finished().await.unwrap();
    assert!(matches!(state, StreamState::Error { .. }));
    assert_eq!(h.engine.bound_session_id().as_deref(), Some("s1"));

    let pointer = h.store.read_session_metadata("s1").await.unwrap().unwrap();
    assert_eq!(pointer.title.as_deref(), Some("plan a trip"));

    h.backend.script(Script::Events(vec![text("retrying"), done()]));
    h.engine.send("try again").unwrap().finished().await.unwrap();
    let requests = h.backend.requests();
    assert_eq!(requests[1].session_id.as_deref(), Some("s1"));
}

#[tokio::test]
async fn test_abort_keeps_partial_text_and_allows_next_send() {
    let h = harness().await;
    h.engine.open_session(None).await.unwrap();
    h.backend
        .script(Script::Hang(vec![session_event("s1"), text("half an ans")]));

    let mut handle = h.engine.send("long question").unwrap();
    handle
        .states
        .wait_for(|s| matches!(s, StreamState::Streaming(e) if !e.partial_text.is_empty()))
        .await
        .unwrap();

    let err = h.engine.send("impatient").unwrap_err();
    assert!(matches!(err, ContinuumError::ExchangeInProgress));

    assert!(h.engine.abort());
    let state = handle.finished().await.unwrap();
    match &state {
        StreamState::Aborted {
            partial_text,
            metadata,
        } => {
            assert_eq!(partial_text, "half an ans");
            assert_eq!(metadata.session_id.as_deref(), Some("s1"));
        }
        other => panic!("expected Aborted, got {:?}", other),
    }
    assert!(!h.engine.abort());
    assert_eq!(h.engine.bound_session_id().as_deref(), Some("s1"));
    assert!(h.store.read_session_metadata("s1").await.unwrap().is_some());

    h.backend.script(Script::Events(vec![text("full"), done()]));
    let state = h.engine.send("follow up").unwrap().finished().await.unwrap();
    assert!(matches!(state, StreamState::Completed { .. }));

    let requests = h.backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].session_id.as_deref(), Some("s1"));
}
