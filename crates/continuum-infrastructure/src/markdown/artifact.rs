//! Rendering and parsing of session artifact documents.
//!
//! ```text
//! +++
//! <toml frontmatter>
//! +++
//!
//! # Title
//!
//! ### Human · 2024-01-01T00:00:00Z
//!
//! text
//!
//! ### Assistant · 2024-01-01T00:00:05Z · approximate time · 1 attachment
//!
//! text
//! ```
//!
//! Text lines starting with `###` or `\` get one extra leading `\` so they
//! can never be read back as a turn header.

use super::frontmatter::SessionFrontmatter;
use chrono::{DateTime, SecondsFormat, Utc};
use continuum_core::session::{CanonicalMessage, ContentOwner, MessageRole, Session};
use continuum_core::{ContinuumError, Result};

const FENCE: &str = "+++";
const HEADER_PREFIX: &str = "### ";
const SEPARATOR: &str = " · ";
const APPROXIMATE: &str = "approximate time";

/// A parsed artifact: the session record plus its locally owned turns.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionArtifact {
    pub session: Session,
    pub messages: Vec<CanonicalMessage>,
}

/// Renders a session and its messages into an artifact document.
///
/// Pointer records (remote content) are rendered without turns, whatever
/// `messages` holds.
pub fn render_session_artifact(session: &Session, messages: &[CanonicalMessage]) -> Result<String> {
    let messages = match session.content_owner {
        ContentOwner::Local => messages,
        ContentOwner::Remote => &[],
    };

    let mut frontmatter = SessionFrontmatter::from(session);
    if session.content_owner == ContentOwner::Local {
        frontmatter.message_count = messages.len();
    }

    let mut out = String::new();
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(&toml::to_string(&frontmatter)?);
    out.push_str(FENCE);
    out.push_str("\n\n");

    let title = session.display_title().replace(['\r', '\n'], " ");
    out.push_str(&format!("# {}\n\n", title));

    for message in messages {
        out.push_str(&render_header(message));
        out.push_str("\n\n");
        out.push_str(&escape_text(&message.text));
        out.push_str("\n\n");
    }

    Ok(out)
}

/// Parses an artifact document back into its session record and turns.
pub fn parse_session_artifact(content: &str) -> Result<SessionArtifact> {
    let lines: Vec<&str> = content.split('\n').collect();
    if lines.first().map(|l| l.trim_end_matches('\r')) != Some(FENCE) {
        return Err(ContinuumError::artifact("missing frontmatter fence"));
    }

    let (frontmatter, body_start) = parse_frontmatter(&lines)?;
    let session = Session::from(frontmatter);
    let body = &lines[body_start..];

    let headers: Vec<(usize, Header)> = body
        .iter()
        .enumerate()
        .filter_map(|(idx, line)| parse_header(line).map(|h| (idx, h)))
        .collect();

    let mut messages = Vec::with_capacity(headers.len());
    for (pos, (idx, header)) in headers.iter().enumerate() {
        let next = headers.get(pos + 1).map(|(n, _)| *n);
        let start = idx + 2;
        let mut end = next.unwrap_or(body.len());
        // A document ends with "\n\n": one empty split item for the final
        // newline and one for the blank separator line.
        if next.is_none() && end > start && body[end - 1].is_empty() {
            end -= 1;
        }
        if end > start && body[end - 1].is_empty() {
            end -= 1;
        }

        let text = if start <= end {
            body[start..end]
                .iter()
                .map(|line| unescape_line(line))
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            String::new()
        };

        let message = if header.approximate {
            CanonicalMessage::with_inferred_timestamp(header.role, text, header.timestamp)
        } else {
            CanonicalMessage::new(header.role, text, header.timestamp)
        };
        messages.push(message.with_attachments(header.attachments));
    }

    Ok(SessionArtifact { session, messages })
}

/// Finds the closing fence: the first `+++` line whose preceding block is valid TOML.
///
/// A multi-line string in the frontmatter may itself contain a `+++` line;
/// the block up to such a line is unterminated TOML and is skipped.
fn parse_frontmatter(lines: &[&str]) -> Result<(SessionFrontmatter, usize)> {
    let mut last_error = None;
    for (idx, line) in lines.iter().enumerate().skip(1) {
        if line.trim_end_matches('\r') != FENCE {
            continue;
        }
        match toml::from_str::<SessionFrontmatter>(&lines[1..idx].join("\n")) {
            Ok(frontmatter) => return Ok((frontmatter, idx + 1)),
            Err(e) => last_error = Some(e),
        }
    }
    Err(match last_error {
        Some(e) => e.into(),
        None => ContinuumError::artifact("unterminated frontmatter"),
    })
}

struct Header {
    role: MessageRole,
    timestamp: DateTime<Utc>,
    approximate: bool,
    attachments: u32,
}

fn render_header(message: &CanonicalMessage) -> String {
    let mut header = format!(
        "{}{}{}{}",
        HEADER_PREFIX,
        message.role,
        SEPARATOR,
        message.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    );
    if message.timestamp_inferred {
        header.push_str(SEPARATOR);
        header.push_str(APPROXIMATE);
    }
    match message.attachment_count {
        0 => {}
        1 => header.push_str(&format!("{}1 attachment", SEPARATOR)),
        n => header.push_str(&format!("{}{} attachments", SEPARATOR, n)),
    }
    header
}

fn parse_header(line: &str) -> Option<Header> {
    let rest = line.trim_end_matches('\r').strip_prefix(HEADER_PREFIX)?;
    let mut parts = rest.split(SEPARATOR);
    let role = parts.next()?.parse::<MessageRole>().ok()?;
    let timestamp = DateTime::parse_from_rfc3339(parts.next()?)
        .ok()?
        .with_timezone(&Utc);

    let mut header = Header {
        role,
        timestamp,
        approximate: false,
        attachments: 0,
    };
    for part in parts {
        if part == APPROXIMATE {
            header.approximate = true;
        } else if let Some(count) = part
            .strip_suffix(" attachments")
            .or_else(|| part.strip_suffix(" attachment"))
        {
            header.attachments = count.parse().ok()?;
        } else {
            tracing::debug!(marker = %part, "Ignoring unknown header marker");
        }
    }
    Some(header)
}

fn escape_text(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.starts_with("###") || line.starts_with('\\') {
                format!("\\{}", line)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn unescape_line(line: &str) -> &str {
    line.strip_prefix('\\').unwrap_or(line)
}
