//! Continuity manager.
//!
//! Decides what opening a session view means, renders the context that
//! seeds a continued imported conversation, and maintains the local
//! pointer records of native sessions.

use chrono::Utc;
use continuum_core::backend::{BackendSession, ResumeOutcome};
use continuum_core::session::{
    CanonicalMessage, ContinuityDecision, ExchangeMetadata, Session, SessionStore, infer_title,
};
use continuum_core::{ContinuumError, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use std::sync::Arc;

const CONTINUATION_TEMPLATE: &str = "\
This conversation continues an earlier one{% if title %} titled \"{{ title }}\"{% endif %}, \
imported from {{ source }}.
{% if omitted > 0 %}
({{ omitted }} earlier message{% if omitted != 1 %}s were{% else %} was{% endif %} omitted.)
{% endif %}
Earlier conversation:
{% for message in messages %}
[{{ message.role }} at {{ message.timestamp }}]
{{ message.text }}
{% endfor %}
Continue from here.";

/// Context prepared for continuing an imported session in a new native one.
#[derive(Debug, Clone, PartialEq)]
pub struct Continuation {
    /// The imported session; it is left untouched.
    pub original_session_id: String,
    /// Text prepended to the first message of the new session.
    pub prompt: String,
    /// Prior messages included in the prompt.
    pub replayed_messages: usize,
    /// Prior messages left out because of the replay limit.
    pub omitted_messages: usize,
}

#[derive(Serialize)]
struct PromptMessage<'a> {
    role: String,
    timestamp: String,
    text: &'a str,
}

pub struct ContinuityManager {
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn BackendSession>,
    max_context_messages: usize,
    title_max_chars: usize,
}

impl ContinuityManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        backend: Arc<dyn BackendSession>,
        max_context_messages: usize,
        title_max_chars: usize,
    ) -> Self {
        Self {
            store,
            backend,
            max_context_messages,
            title_max_chars,
        }
    }

    /// Computes the decision for opening `session_id` (or no session).
    ///
    /// A session without a local record is treated as native: the backend
    /// may know it even when no pointer has been written yet.
    pub async fn decide(&self, session_id: Option<&str>) -> Result<ContinuityDecision> {
        let Some(session_id) = session_id else {
            return Ok(ContinuityDecision::FreshSession);
        };

        if let Some(session) = self.store.read_session_metadata(session_id).await?
            && session.is_imported()
        {
            let prior_messages = self.store.read_session_messages(session_id).await?;
            tracing::info!(session_id = %session_id, messages = prior_messages.len(), "Opened imported session");
            return Ok(ContinuityDecision::ContinueFromImported {
                original_session_id: session.id,
                prior_messages,
            });
        }

        match self.backend.resume(session_id).await? {
            ResumeOutcome::Resumable => {
                tracing::info!(session_id = %session_id, "Resuming native session");
                Ok(ContinuityDecision::ResumeSession {
                    session_id: session_id.to_string(),
                })
            }
            ResumeOutcome::Unavailable(mut info) => {
                info.session_id.get_or_insert_with(|| session_id.to_string());
                tracing::warn!(session_id = %session_id, reason = %info.reason, "Native session cannot be resumed");
                Ok(ContinuityDecision::RecoveryNeeded(info))
            }
        }
    }

    /// Prepares the continuation of an imported session.
    ///
    /// Reads the imported record and messages; writes nothing.
    pub async fn continue_imported(&self, session_id: &str) -> Result<Continuation> {
        let session = self
            .store
            .read_session_metadata(session_id)
            .await?
            .ok_or_else(|| ContinuumError::not_found("Session", session_id))?;
        if !session.is_imported() {
            return Err(ContinuumError::invalid_state(format!(
                "session '{}' is not an imported session",
                session_id
            )));
        }
        let messages = self.store.read_session_messages(session_id).await?;
        self.render_continuation(&session, &messages)
    }

    /// Renders the continuation prompt from the trailing prior messages.
    pub fn render_continuation(
        &self,
        session: &Session,
        messages: &[CanonicalMessage],
    ) -> Result<Continuation> {
        let start = messages.len().saturating_sub(self.max_context_messages);
        let replayed = &messages[start..];
        let prompt_messages: Vec<PromptMessage<'_>> = replayed
            .iter()
            .map(|m| PromptMessage {
                role: m.role.to_string(),
                timestamp: m.timestamp.to_rfc3339(),
                text: &m.text,
            })
            .collect();

        let env = Environment::new();
        let prompt = env
            .render_str(
                CONTINUATION_TEMPLATE,
                context! {
                    title => session.title.as_deref(),
                    source => session.source.to_string(),
                    omitted => start,
                    messages => prompt_messages,
                },
            )
            .map_err(|e| ContinuumError::internal(format!("Failed to render continuation: {}", e)))?;

        Ok(Continuation {
            original_session_id: session.id.clone(),
            prompt,
            replayed_messages: replayed.len(),
            omitted_messages: start,
        })
    }

    /// Creates or refreshes the pointer record after a completed exchange.
    ///
    /// # Arguments
    ///
    /// * `bound_session_id` - Session the exchange was sent to, if any
    /// * `metadata` - Metadata folded from the exchange
    /// * `first_user_text` - The user's message, used to infer a missing title
    /// * `continued_from` - Imported session the native session was seeded from
    ///
    /// # Returns
    ///
    /// The written record, or `None` when the exchange never named a session.
    pub async fn record_exchange(
        &self,
        bound_session_id: Option<&str>,
        metadata: &ExchangeMetadata,
        first_user_text: &str,
        continued_from: Option<&str>,
    ) -> Result<Option<Session>> {
        let Some(session_id) = metadata.session_id.as_deref().or(bound_session_id) else {
            tracing::warn!("Exchange carried no session id; pointer not written");
            return Ok(None);
        };

        let now = Utc::now();
        let mut session = match self.store.read_session_metadata(session_id).await? {
            Some(existing) if existing.is_imported() => {
                return Err(ContinuumError::invalid_state(format!(
                    "backend session id '{}' collides with an imported session",
                    session_id
                )));
            }
            Some(existing) => existing,
            None => Session::native(session_id, now),
        };

        if let Some(title) = metadata.title.as_deref().filter(|t| !t.trim().is_empty()) {
            session.title = Some(title.to_string());
        } else if session.title.is_none() {
            session.title = infer_title(first_user_text, self.title_max_chars);
        }
        if metadata.model.is_some() {
            session.model = metadata.model.clone();
        }
        if session.continued_from.is_none() {
            session.continued_from = continued_from.map(str::to_string);
        }
        session.updated_at = now;

        self.store.write_session(&session, &[]).await?;
        tracing::debug!(session_id = %session.id, "Updated session pointer");
        Ok(Some(session))
    }
}
