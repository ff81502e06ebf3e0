use anyhow::Result;
use continuum_core::config::EngineConfig;
use continuum_core::session::{ContentOwner, SessionStore};

use super::utils::{open_store, truncate};

pub async fn list(config: &EngineConfig, include_archived: bool) -> Result<()> {
    let store = open_store(config).await?;
    let sessions = store.list_sessions().await?;

    let visible: Vec<_> = sessions
        .iter()
        .filter(|s| include_archived || !s.archived)
        .collect();
    if visible.is_empty() {
        let hidden = sessions.len();
        if hidden > 0 {
            println!("No active sessions ({} archived, use --all)", hidden);
        } else {
            println!("No sessions");
        }
        return Ok(());
    }

    for session in visible {
        println!(
            "{:<40} {:<15} {} {:>5}  {}",
            truncate(&session.id, 40),
            session.source,
            session.updated_at.format("%Y-%m-%d %H:%M"),
            session.message_count,
            truncate(session.title.as_deref().unwrap_or("(untitled)"), 60)
        );
    }
    Ok(())
}

pub async fn show(config: &EngineConfig, id: &str) -> Result<()> {
    let store = open_store(config).await?;
    let Some(session) = store.read_session_metadata(id).await? else {
        anyhow::bail!("Session '{}' not found", id);
    };

    println!("{}", session.title.as_deref().unwrap_or("(untitled)"));
    println!("  id:        {}", session.id);
    println!("  source:    {}", session.source);
    println!("  created:   {}", session.created_at.to_rfc3339());
    println!("  updated:   {}", session.updated_at.to_rfc3339());
    if let Some(model) = &session.model {
        println!("  model:     {}", model);
    }
    if let Some(original) = &session.continued_from {
        println!("  continues: {}", original);
    }

    if session.content_owner == ContentOwner::Remote {
        println!();
        println!("Messages of this session are kept by the backend.");
        return Ok(());
    }

    for message in store.read_session_messages(id).await? {
        println!();
        let approx = if message.timestamp_inferred { " (approx.)" } else { "" };
        println!(
            "--- {} · {}{}",
            message.role,
            message.timestamp.format("%Y-%m-%d %H:%M"),
            approx
        );
        println!("{}", message.text);
    }
    Ok(())
}
