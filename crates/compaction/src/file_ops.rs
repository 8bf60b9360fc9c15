//! File operations digest
//!
//! Scans assistant tool calls for file reads and writes so the compacted summary can
//! tell the resumed agent which files it already looked at and which it changed.

use crate::model::{ConversationMessage, MessageRole};
use serde_json::Value;
use std::collections::BTreeSet;

const READ_TOOLS: &[&str] = &["read", "read_file", "view"];
const WRITE_TOOLS: &[&str] = &["write", "write_file", "edit", "multi_edit", "create_file"];
const PATH_KEYS: &[&str] = &["path", "file_path", "filePath"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileOperations {
    read: BTreeSet<String>,
    modified: BTreeSet<String>,
}

impl FileOperations {
    pub fn collect<'a>(messages: impl IntoIterator<Item = &'a ConversationMessage>) -> Self {
        let mut ops = Self::default();
        for message in messages {
            if message.role != MessageRole::Assistant {
                continue;
            }
            for (_, name, arguments) in message.tool_calls() {
                let Some(path) = path_argument(arguments) else {
                    continue;
                };
                if WRITE_TOOLS.contains(&name) {
                    ops.modified.insert(path);
                } else if READ_TOOLS.contains(&name) {
                    ops.read.insert(path);
                }
            }
        }
        ops
    }

    /// Files that were read but never modified
    pub fn read_only(&self) -> impl Iterator<Item = &str> {
        self.read
            .difference(&self.modified)
            .map(String::as_str)
    }

    pub fn modified(&self) -> impl Iterator<Item = &str> {
        self.modified.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.modified.is_empty()
    }

    /// `<read-files>` and `<modified-files>` sections, each omitted when empty
    pub fn format(&self) -> String {
        let mut sections = Vec::new();
        let read: Vec<&str> = self.read_only().collect();
        if !read.is_empty() {
            sections.push(format!("<read-files>\n{}\n</read-files>", read.join("\n")));
        }
        let modified: Vec<&str> = self.modified().collect();
        if !modified.is_empty() {
            sections.push(format!(
                "<modified-files>\n{}\n</modified-files>",
                modified.join("\n")
            ));
        }
        sections.join("\n\n")
    }
}

fn path_argument(arguments: &Value) -> Option<String> {
    PATH_KEYS
        .iter()
        .find_map(|key| arguments.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(str::to_string)
}
