//! Conversation import pipeline: scan -> transform -> dedupe -> persist.
//!
//! Conversations are processed strictly in source order, one at a time, so
//! progress snapshots are emitted in that order as well. A conversation that
//! fails to transform or persist is recorded and skipped; it never aborts
//! the batch.

use chrono::{DateTime, Utc};
use continuum_core::export::{
    ClaudeMemoryRecord, ClaudeProject, ParsedConversation, conversation_label, detect_kind,
    parse_conversation,
};
use continuum_core::import::{
    ExportFiles, ExportKind, ExportReader, ImportItemFailure, ImportProgress, ImportResult,
    ImportScanResult, ProjectSummary,
};
use continuum_core::session::{Session, SessionStore, infer_title};
use continuum_core::{ContinuumError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Settings the pipeline takes from the engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Archived flag written on every imported session.
    pub archive_imported: bool,
    pub title_max_chars: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            archive_imported: true,
            title_max_chars: 60,
        }
    }
}

/// A running import started by [`ImportPipeline::spawn_import`].
pub struct ImportRun {
    pub run_id: Uuid,
    /// Progress snapshots in source order.
    pub progress: mpsc::UnboundedReceiver<ImportProgress>,
    /// Stops the run before the next conversation.
    pub cancel: CancellationToken,
    pub handle: JoinHandle<Result<ImportResult>>,
}

impl ImportRun {
    /// Waits for the terminal result, discarding remaining progress.
    pub async fn finish(self) -> Result<ImportResult> {
        drop(self.progress);
        self.handle
            .await
            .map_err(|e| ContinuumError::internal(format!("Import task failed: {}", e)))?
    }
}

/// Raw content of an export, read once per scan or import.
struct LoadedExport {
    files: ExportFiles,
    kind: Option<ExportKind>,
    conversations: Vec<Value>,
    memories: Vec<ClaudeMemoryRecord>,
    projects: Option<Vec<ClaudeProject>>,
}

pub struct ImportPipeline {
    reader: Arc<dyn ExportReader>,
    store: Arc<dyn SessionStore>,
    options: ImportOptions,
}

impl ImportPipeline {
    pub fn new(
        reader: Arc<dyn ExportReader>,
        store: Arc<dyn SessionStore>,
        options: ImportOptions,
    ) -> Self {
        Self {
            reader,
            store,
            options,
        }
    }

    /// Summarizes an export without writing anything.
    ///
    /// Fails only when `location` does not exist; a missing or malformed
    /// conversations file yields a zero-valued result.
    pub async fn scan(&self, location: &Path) -> Result<ImportScanResult> {
        let export = self.load(location).await?;
        let Some(kind) = export.kind else {
            tracing::info!(location = %location.display(), "No recognizable conversations in export");
            return Ok(ImportScanResult::empty());
        };

        let now = Utc::now();
        let mut result = ImportScanResult {
            source_kind: Some(kind),
            total_conversations: export.conversations.len(),
            has_memory: export.memories.iter().any(|m| !m.is_empty()),
            projects: export.projects.as_ref().map(|projects| ProjectSummary {
                count: projects.len(),
                names: projects.iter().map(|p| p.name.clone()).collect(),
            }),
            ..ImportScanResult::default()
        };

        for raw in &export.conversations {
            let Ok(Some(parsed)) = parse_conversation(kind, raw, now) else {
                continue;
            };
            result.non_empty_conversations += 1;
            if let Some(started) = parsed.started_at() {
                result.oldest = Some(result.oldest.map_or(started, |o| o.min(started)));
            }
            if let Some(last) = parsed.last_activity() {
                result.newest = Some(result.newest.map_or(last, |n| n.max(last)));
            }
        }

        tracing::info!(
            kind = %kind,
            total = result.total_conversations,
            non_empty = result.non_empty_conversations,
            "Scanned export"
        );
        Ok(result)
    }

    /// Imports every non-empty conversation of the export at `location`.
    ///
    /// Emits one `Importing` snapshot before each conversation and a final
    /// `Complete` snapshot. A cancelled run stops emitting and returns a
    /// result with `cancelled = true`.
    pub async fn import(
        &self,
        location: &Path,
        progress: mpsc::UnboundedSender<ImportProgress>,
        cancel: CancellationToken,
    ) -> Result<ImportResult> {
        let emit = |snapshot: ImportProgress| {
            if progress.send(snapshot).is_err() {
                tracing::debug!("Progress receiver dropped");
            }
        };

        emit(ImportProgress::scanning());
        let outcome = self.import_inner(location, &emit, &cancel).await;
        if let Err(e) = &outcome {
            emit(ImportProgress::failed(e.to_string()));
        }
        outcome
    }

    async fn import_inner(
        &self,
        location: &Path,
        emit: &(dyn Fn(ImportProgress) + Sync),
        cancel: &CancellationToken,
    ) -> Result<ImportResult> {
        let export = self.load(location).await?;
        let _lock = self.store.acquire_import_lock().await?;

        let mut result = ImportResult {
            source_kind: export.kind,
            ..ImportResult::default()
        };
        let Some(kind) = export.kind else {
            tracing::info!(location = %location.display(), "Nothing to import");
            emit(ImportProgress::complete(0, 0));
            return Ok(result);
        };

        let now = Utc::now();
        tracing::info!(kind = %kind, conversations = export.conversations.len(), "Import started");

        // Transform first: empty conversations drop out before counting.
        let mut pending = Vec::new();
        for raw in &export.conversations {
            match parse_conversation(kind, raw, now) {
                Ok(Some(parsed)) => pending.push(parsed),
                Ok(None) => {}
                Err(e) => {
                    let (conversation_id, title) = conversation_label(raw);
                    tracing::warn!(conversation_id = ?conversation_id, error = %e, "Skipping malformed conversation");
                    result.failures.push(ImportItemFailure {
                        conversation_id,
                        title,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let total = pending.len();
        let mut processed = 0;
        for parsed in pending {
            if cancel.is_cancelled() {
                tracing::info!(processed, total, "Import cancelled");
                result.cancelled = true;
                return Ok(result);
            }
            emit(ImportProgress::importing(
                self.title_for(&parsed).unwrap_or_else(|| parsed.source_id.clone()),
                processed,
                total,
            ));

            match self.persist(kind, &parsed, now).await {
                Ok(Persisted::Created(id)) => {
                    result.conversations_imported += 1;
                    result.created_artifacts.push(id);
                }
                Ok(Persisted::AlreadyImported(id)) => result.skipped_existing.push(id),
                Err(e) => {
                    tracing::warn!(source_id = %parsed.source_id, error = %e, "Failed to persist conversation");
                    result.failures.push(ImportItemFailure {
                        conversation_id: Some(parsed.source_id.clone()),
                        title: parsed.title.clone(),
                        reason: e.to_string(),
                    });
                }
            }
            processed += 1;
        }

        if cancel.is_cancelled() {
            result.cancelled = true;
            return Ok(result);
        }

        self.write_context(kind, &export, now, &mut result).await;

        emit(ImportProgress::complete(processed, total));
        tracing::info!(
            imported = result.conversations_imported,
            skipped = result.skipped_existing.len(),
            failures = result.failures.len(),
            "Import finished"
        );
        Ok(result)
    }

    /// Runs [`import`](Self::import) on a background task.
    pub fn spawn_import(self: &Arc<Self>, location: PathBuf) -> ImportRun {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let run_id = Uuid::new_v4();
        let pipeline = Arc::clone(self);
        let token = cancel.clone();
        let span = tracing::info_span!("import", run_id = %run_id);
        let handle = tokio::spawn(
            async move { pipeline.import(&location, tx, token).await }.instrument(span),
        );
        ImportRun {
            run_id,
            progress: rx,
            cancel,
            handle,
        }
    }

    fn title_for(&self, parsed: &ParsedConversation) -> Option<String> {
        parsed.title.clone().or_else(|| {
            parsed
                .messages
                .iter()
                .find(|m| m.is_human())
                .and_then(|m| infer_title(&m.text, self.options.title_max_chars))
        })
    }

    async fn persist(
        &self,
        kind: ExportKind,
        parsed: &ParsedConversation,
        now: DateTime<Utc>,
    ) -> Result<Persisted> {
        let created_at = parsed.started_at().unwrap_or(now);
        let mut session = Session::imported(
            kind.session_source(),
            parsed.source_id.clone(),
            self.title_for(parsed),
            created_at,
            now,
        );
        if self.store.exists(&session.id).await? {
            tracing::debug!(session_id = %session.id, "Already imported; skipping");
            return Ok(Persisted::AlreadyImported(session.id));
        }

        session.updated_at = parsed.last_activity().unwrap_or(created_at);
        session.archived = self.options.archive_imported;
        session.message_count = parsed.messages.len();
        self.store.write_session(&session, &parsed.messages).await?;
        Ok(Persisted::Created(session.id))
    }

    async fn write_context(
        &self,
        kind: ExportKind,
        export: &LoadedExport,
        now: DateTime<Utc>,
        result: &mut ImportResult,
    ) {
        let Some(content) = render_context_artifact(kind, export, now) else {
            return;
        };
        let artifact_id = kind.context_artifact_id();
        match self.store.write_context_artifact(&artifact_id, &content).await {
            Ok(true) => {
                result.context_files_created += 1;
                result.created_artifacts.push(artifact_id);
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(artifact_id = %artifact_id, error = %e, "Failed to write context artifact");
                result.failures.push(ImportItemFailure {
                    conversation_id: None,
                    title: Some(artifact_id),
                    reason: e.to_string(),
                });
            }
        }
    }

    async fn load(&self, location: &Path) -> Result<LoadedExport> {
        let files = self.reader.locate(location).await?;

        let conversations: Vec<Value> = match &files.conversations {
            Some(path) => self.read_json(path).await.unwrap_or_default(),
            None => Vec::new(),
        };
        let memories: Vec<ClaudeMemoryRecord> = match &files.memories {
            Some(path) => self.read_json(path).await.unwrap_or_default(),
            None => Vec::new(),
        };
        let projects: Option<Vec<ClaudeProject>> = match &files.projects {
            Some(path) => self.read_json(path).await,
            None => None,
        };

        let kind = detect_kind(&conversations).or_else(|| {
            (conversations.is_empty() && files.has_supplementary_files()).then_some(ExportKind::Claude)
        });

        Ok(LoadedExport {
            files,
            kind,
            conversations,
            memories,
            projects,
        })
    }

    /// Reads and decodes one JSON export file; unreadable files count as absent.
    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let text = match self.reader.read_to_string(path).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot read export file");
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Malformed export file");
                None
            }
        }
    }
}

enum Persisted {
    Created(String),
    AlreadyImported(String),
}

/// Renders the memory payload of an export, or `None` when there is none.
fn render_context_artifact(
    kind: ExportKind,
    export: &LoadedExport,
    now: DateTime<Utc>,
) -> Option<String> {
    let records: Vec<&ClaudeMemoryRecord> =
        export.memories.iter().filter(|m| !m.is_empty()).collect();
    if records.is_empty() {
        return None;
    }

    let project_names: BTreeMap<&str, &str> = export
        .projects
        .iter()
        .flatten()
        .map(|p| (p.uuid.as_str(), p.name.as_str()))
        .collect();

    let mut out = format!(
        "# {} memory\n\nImported from {} at {}.\n",
        kind,
        export.files.root.display(),
        now.to_rfc3339()
    );
    for record in records {
        if let Some(memory) = record
            .conversations_memory
            .as_deref()
            .filter(|m| !m.trim().is_empty())
        {
            out.push_str(&format!("\n## Conversations\n\n{}\n", memory.trim_end()));
        }
        for (project_id, memory) in &record.project_memories {
            if memory.trim().is_empty() {
                continue;
            }
            let name = project_names
                .get(project_id.as_str())
                .copied()
                .unwrap_or(project_id.as_str());
            out.push_str(&format!("\n## Project: {}\n\n{}\n", name, memory.trim_end()));
        }
    }
    Some(out)
}
