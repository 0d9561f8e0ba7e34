//! File viewing and editing tool

use async_trait::async_trait;
use serde_json::json;
use shopper_core::error::Result;
use shopper_core::llm::ToolDefinition;
use shopper_core::tools::utils::{format_with_line_numbers, maybe_truncate};
use shopper_core::tools::{Tool, ToolCall, ToolFactory, ToolOutput};
use std::path::{Component, Path, PathBuf};

/// Provider type of the native text editor tool
pub const EDIT_TOOL_TYPE: &str = "text_editor_20250728";

pub const EDIT_TOOL_NAME: &str = "str_replace_based_edit_tool";

/// Views and edits files under a working directory
///
/// Relative paths resolve against the working directory. Absolute paths are
/// re-rooted under it, since the model often assumes a container layout such
/// as `/repo/results.md`. `..` never climbs above the working directory.
pub struct EditTool {
    root: PathBuf,
}

impl EditTool {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let mut resolved = self.root.clone();
        let depth = resolved.components().count();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::ParentDir => {
                    if resolved.components().count() > depth {
                        resolved.pop();
                    }
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        resolved
    }

    async fn view(&self, path: &str, view_range: Option<Vec<i64>>) -> Result<ToolOutput> {
        let resolved = self.resolve(path);

        if resolved.is_dir() {
            let mut entries = Vec::new();
            let mut dir = tokio::fs::read_dir(&resolved).await?;
            while let Some(entry) = dir.next_entry().await? {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                if entry.file_type().await?.is_dir() {
                    name.push('/');
                }
                entries.push(name);
            }
            entries.sort();
            return Ok(ToolOutput::ok(entries.join("\n")));
        }

        if !resolved.is_file() {
            return Ok(ToolOutput::error(format!("Error: File not found: {}", path)));
        }

        let content = tokio::fs::read_to_string(&resolved).await?;
        let lines: Vec<&str> = content.lines().collect();

        let (start, end) = match view_range.as_deref() {
            None => (0, lines.len()),
            Some([start, end]) => {
                let end = if *end == -1 {
                    lines.len()
                } else {
                    (*end).clamp(0, lines.len() as i64) as usize
                };
                let start = (*start - 1).clamp(0, lines.len() as i64) as usize;
                (start, end.max(start))
            }
            Some(other) => {
                return Ok(ToolOutput::error(format!(
                    "Error: view_range must be [start, end], got {:?}",
                    other
                )))
            }
        };

        let selected = lines[start..end].join("\n");
        let numbered = format_with_line_numbers(&selected, start + 1);
        Ok(ToolOutput::ok(maybe_truncate(&numbered, None)))
    }

    async fn str_replace(&self, path: &str, old_str: &str, new_str: &str) -> Result<ToolOutput> {
        let resolved = self.resolve(path);
        if !resolved.is_file() {
            return Ok(ToolOutput::error(format!("Error: File not found: {}", path)));
        }
        if old_str.is_empty() {
            return Ok(ToolOutput::error("Error: old_str must not be empty."));
        }

        let content = tokio::fs::read_to_string(&resolved).await?;
        match content.matches(old_str).count() {
            0 => Ok(ToolOutput::error(
                "Error: No match found for replacement. Please check your text and try again.",
            )),
            1 => {
                let updated = content.replacen(old_str, new_str, 1);
                tokio::fs::write(&resolved, updated).await?;
                Ok(ToolOutput::ok(
                    "Successfully replaced text at exactly one location.",
                ))
            }
            count => Ok(ToolOutput::error(format!(
                "Error: Found {} matches for replacement text. Please provide more context to make a unique match.",
                count
            ))),
        }
    }

    async fn create(&self, path: &str, file_text: &str) -> Result<ToolOutput> {
        let resolved = self.resolve(path);
        if resolved.exists() {
            return Ok(ToolOutput::error(format!(
                "Error: File already exists: {}",
                path
            )));
        }

        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&resolved, file_text).await?;
        tracing::debug!("Created {}", resolved.display());
        Ok(ToolOutput::ok(format!("Successfully created file {}", path)))
    }

    async fn insert(&self, path: &str, insert_line: i64, text: &str) -> Result<ToolOutput> {
        let resolved = self.resolve(path);
        if !resolved.is_file() {
            return Ok(ToolOutput::error(format!("Error: File not found: {}", path)));
        }

        let content = tokio::fs::read_to_string(&resolved).await?;
        let lines: Vec<&str> = content.split_inclusive('\n').collect();

        if insert_line < 0 || insert_line as usize > lines.len() {
            return Ok(ToolOutput::error(format!(
                "Error: insert_line {} is out of range. Use 0 to insert at the beginning, or 1-{} to insert after that line.",
                insert_line,
                lines.len()
            )));
        }
        let at = insert_line as usize;

        let mut inserted = text.to_string();
        if !inserted.is_empty() && !inserted.ends_with('\n') {
            inserted.push('\n');
        }
        // The line before the insertion point may lack a trailing newline
        let mut head = lines[..at].concat();
        if !head.is_empty() && !head.ends_with('\n') && !inserted.is_empty() {
            head.push('\n');
        }

        let updated = format!("{}{}{}", head, inserted, lines[at..].concat());
        tokio::fs::write(&resolved, updated).await?;
        Ok(ToolOutput::ok(format!(
            "Successfully inserted text after line {}.",
            insert_line
        )))
    }
}

#[async_trait]
impl Tool for EditTool {
    fn name(&self) -> &str {
        EDIT_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Tool for viewing, creating and editing files\n\
         * Paths are relative to the working directory; absolute paths are placed under it.\n\
         * If `path` is a file, `view` shows numbered lines. If `path` is a directory, `view` lists its entries.\n\
         * `create` refuses to overwrite an existing file.\n\
         * `str_replace` requires `old_str` to match exactly one location.\n\
         * `insert` adds text after `insert_line` (0 for the top of the file)."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "enum": ["view", "create", "str_replace", "insert"],
                    "description": "The command to run."
                },
                "path": {
                    "type": "string",
                    "description": "File or directory path."
                },
                "file_text": {
                    "type": "string",
                    "description": "Content of the file to create."
                },
                "old_str": {
                    "type": "string",
                    "description": "Text to replace; must match exactly once."
                },
                "new_str": {
                    "type": "string",
                    "description": "Replacement text."
                },
                "insert_line": {
                    "type": "integer",
                    "description": "Line after which to insert."
                },
                "insert_text": {
                    "type": "string",
                    "description": "Text to insert."
                },
                "view_range": {
                    "type": "array",
                    "items": {"type": "integer"},
                    "description": "Optional [start, end] line range, 1-indexed; -1 means end of file."
                }
            },
            "required": ["command", "path"]
        })
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::Builtin {
            tool_type: EDIT_TOOL_TYPE.to_string(),
            name: self.name().to_string(),
            options: serde_json::Map::new(),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolOutput> {
        let command: String = call.get_parameter("command")?;
        let path: String = call.get_parameter("path")?;

        match command.as_str() {
            "view" => self.view(&path, call.get_optional("view_range")?).await,
            "str_replace" => {
                let old_str: String = call.get_optional("old_str")?.unwrap_or_default();
                let new_str: String = call.get_optional("new_str")?.unwrap_or_default();
                self.str_replace(&path, &old_str, &new_str).await
            }
            "create" => {
                let file_text: String = call.get_optional("file_text")?.unwrap_or_default();
                self.create(&path, &file_text).await
            }
            "insert" => {
                let insert_line: i64 = call.get_optional("insert_line")?.unwrap_or(0);
                let text: String = match call.get_optional("insert_text")? {
                    Some(text) => text,
                    None => call.get_optional("new_str")?.unwrap_or_default(),
                };
                self.insert(&path, insert_line, &text).await
            }
            other => Ok(ToolOutput::error(format!(
                "Error: Unknown command '{}'",
                other
            ))),
        }
    }
}

/// Creates editors rooted at the run's working directory
pub struct EditToolFactory {
    root: PathBuf,
}

impl EditToolFactory {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

impl ToolFactory for EditToolFactory {
    fn create(&self) -> Box<dyn Tool> {
        Box::new(EditTool::new(self.root.clone()))
    }

    fn tool_name(&self) -> &str {
        EDIT_TOOL_NAME
    }

    fn tool_description(&self) -> &str {
        "View, create and edit files under the working directory"
    }
}
