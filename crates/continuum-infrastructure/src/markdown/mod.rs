//! Markdown session artifacts.
//!
//! One document per session: TOML frontmatter between `+++` fences holding
//! the session record, then a body of role-tagged, timestamped turns.

mod artifact;
mod frontmatter;

pub use artifact::{SessionArtifact, parse_session_artifact, render_session_artifact};
pub use frontmatter::{FRONTMATTER_VERSION, SessionFrontmatter};
