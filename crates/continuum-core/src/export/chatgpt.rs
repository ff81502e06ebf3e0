//! Parent-pointer tree export format (ChatGPT).
//!
//! A conversation is a map of nodes. Only the active branch is imported: the
//! path from `current_node` up to the root, replayed root-to-leaf. A missing
//! `current_node`, a dangling parent reference or a cycle all yield an empty
//! branch, which callers treat as "nothing to import".

use super::{ParsedConversation, epoch_seconds};
use crate::session::{CanonicalMessage, MessageRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatGptConversation {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub create_time: Option<f64>,
    #[serde(default)]
    pub update_time: Option<f64>,
    #[serde(default)]
    pub current_node: Option<String>,
    #[serde(default, deserialize_with = "crate::export::null_as_default")]
    pub mapping: HashMap<String, ChatGptNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatGptNode {
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub message: Option<ChatGptMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatGptMessage {
    #[serde(default)]
    pub author: Option<ChatGptAuthor>,
    #[serde(default)]
    pub create_time: Option<f64>,
    #[serde(default)]
    pub content: Option<ChatGptContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatGptAuthor {
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatGptContent {
    #[serde(default, deserialize_with = "crate::export::null_as_default")]
    pub parts: Vec<serde_json::Value>,
}

impl ChatGptConversation {
    pub fn source_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.conversation_id.as_deref())
    }

    /// Node ids of the active branch, root first.
    pub fn active_branch(&self) -> Vec<&str> {
        let Some(mut cursor) = self.current_node.as_deref() else {
            return Vec::new();
        };

        let mut visited = Vec::new();
        let mut seen = HashSet::new();
        loop {
            let Some(node) = self.mapping.get(cursor) else {
                tracing::debug!(node = %cursor, "Broken parent chain; treating branch as empty");
                return Vec::new();
            };
            if !seen.insert(cursor) {
                tracing::debug!(node = %cursor, "Cycle in parent chain; treating branch as empty");
                return Vec::new();
            }
            visited.push(cursor);
            match node.parent.as_deref() {
                Some(parent) => cursor = parent,
                None => break,
            }
        }

        visited.reverse();
        visited
    }

    /// Extracts the canonical messages of the active branch.
    pub fn to_messages(&self, fallback: DateTime<Utc>) -> Vec<CanonicalMessage> {
        self.active_branch()
            .into_iter()
            .filter_map(|id| self.mapping.get(id)?.message.as_ref())
            .filter_map(|message| message.to_message(fallback))
            .collect()
    }

    /// Returns `None` when the conversation has no id to build an identity from.
    pub fn parse(&self, fallback: DateTime<Utc>) -> Option<ParsedConversation> {
        Some(ParsedConversation {
            source_id: self.source_id()?.to_string(),
            title: self.title.clone().filter(|t| !t.trim().is_empty()),
            created_at: self.create_time.and_then(epoch_seconds),
            updated_at: self.update_time.and_then(epoch_seconds),
            messages: self.to_messages(fallback),
        })
    }
}

impl ChatGptMessage {
    fn role(&self) -> Option<MessageRole> {
        match self.author.as_ref()?.role.as_deref()? {
            "user" => Some(MessageRole::Human),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }

    fn to_message(&self, fallback: DateTime<Utc>) -> Option<CanonicalMessage> {
        let role = self.role()?;
        let parts = self.content.as_ref().map(|c| c.parts.as_slice()).unwrap_or_default();

        let text = parts
            .iter()
            .filter_map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return None;
        }
        let non_text_parts = parts.iter().filter(|part| !part.is_string()).count() as u32;

        let message = match self.create_time.and_then(epoch_seconds) {
            Some(timestamp) => CanonicalMessage::new(role, text, timestamp),
            None => CanonicalMessage::with_inferred_timestamp(role, text, fallback),
        };
        Some(message.with_attachments(non_text_parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fallback() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn three_node_chain() -> ChatGptConversation {
        serde_json::from_str(
            r#"{
              "id": "conv-1",
              "title": "Chain",
              "create_time": 1700000000.5,
              "current_node": "c",
              "mapping": {
                "c": {"parent": "b", "message": {"author": {"role": "user"}, "create_time": 1700000020.0,
                      "content": {"content_type": "text", "parts": ["third"]}}},
                "a": {"parent": null, "message": {"author": {"role": "user"},
                      "content": {"parts": ["first"]}}},
                "b": {"parent": "a", "message": {"author": {"role": "assistant"}, "create_time": 1700000010.25,
                      "content": {"parts": ["second", {"asset_pointer": "file-1"}, "more"]}}}
              }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_root_to_leaf_order() {
        let conversation = three_node_chain();
        assert_eq!(conversation.active_branch(), vec!["a", "b", "c"]);

        let messages = conversation.to_messages(fallback());
        let texts: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second\nmore", "third"]);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].attachment_count, 1);
        assert!(messages[0].timestamp_inferred);
        assert_eq!(messages[0].timestamp, fallback());
        assert_eq!(
            messages[1].timestamp,
            Utc.timestamp_opt(1_700_000_010, 250_000_000).unwrap()
        );
    }

    #[test]
    fn test_reserialized_map_extracts_identically() {
        let conversation = three_node_chain();
        let first = conversation.to_messages(fallback());

        let json = serde_json::to_string(&conversation).unwrap();
        let reparsed: ChatGptConversation = serde_json::from_str(&json).unwrap();
        assert_eq!(reparsed.to_messages(fallback()), first);
    }

    #[test]
    fn test_missing_current_node_is_empty() {
        let mut conversation = three_node_chain();
        conversation.current_node = None;
        assert!(conversation.to_messages(fallback()).is_empty());

        conversation.current_node = Some("nope".into());
        assert!(conversation.to_messages(fallback()).is_empty());
    }

    #[test]
    fn test_dangling_parent_is_empty() {
        let mut conversation = three_node_chain();
        conversation.mapping.remove("a");
        assert!(conversation.active_branch().is_empty());
        assert!(conversation.parse(fallback()).unwrap().messages.is_empty());
    }

    #[test]
    fn test_cycle_is_empty() {
        let mut conversation = three_node_chain();
        conversation.mapping.get_mut("a").unwrap().parent = Some("c".into());
        assert!(conversation.active_branch().is_empty());
    }

    #[test]
    fn test_system_and_tool_nodes_skipped() {
        let conversation: ChatGptConversation = serde_json::from_str(
            r#"{"conversation_id":"x","current_node":"t","mapping":{
                "root":{"parent":null},
                "s":{"parent":"root","message":{"author":{"role":"system"},"content":{"parts":["be nice"]}}},
                "t":{"parent":"s","message":{"author":{"role":"tool"},"content":{"parts":["42"]}}}
            }}"#,
        )
        .unwrap();
        let parsed = conversation.parse(fallback()).unwrap();
        assert_eq!(parsed.source_id, "x");
        assert!(parsed.messages.is_empty());
    }

    #[test]
    fn test_null_parts_and_content_are_skipped() {
        let conversation: ChatGptConversation = serde_json::from_str(
            r#"{"id":"n","current_node":"c","mapping":{
                "a":{"parent":null,"message":{"author":{"role":"user"},"content":{"content_type":"text","parts":null}}},
                "b":{"parent":"a","message":{"author":{"role":"assistant"},"content":null}},
                "c":{"parent":"b","message":{"author":{"role":"user"},"content":{"parts":["still here"]}}}
            }}"#,
        )
        .unwrap();
        let parsed = conversation.parse(fallback()).unwrap();
        let texts: Vec<_> = parsed.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["still here"]);
    }
}
