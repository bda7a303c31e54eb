//! Shared data model for the Specdeck engine.
//!
//! These types cross the engine's two external boundaries: they are what
//! the filesystem provider returns ([`TreeNode`], [`ChangeEvent`]) and what
//! the rendering layer consumes (everything here). All types serialize to
//! camelCase JSON.

use serde::{Deserialize, Serialize};

use crate::util::paths;

/// Name of the checklist file that determines a change folder's progress.
pub const CHECKLIST_FILE: &str = "tasks.md";

/// Whether a tree entry is a folder or a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    File,
}

/// Completion counts derived from a checklist file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Number of checked, non-section items.
    pub completed: usize,
    /// Number of non-section items.
    pub total: usize,
}

/// Extension-derived classification of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Markdown,
    Javascript,
    Typescript,
    Vue,
    Json,
    Yaml,
    Css,
    Scss,
    Html,
    Xml,
    Python,
    Java,
    Bash,
    Batch,
    Powershell,
    Sql,
    Text,
    Image,
}

impl FileKind {
    /// Classifies a file by its name's extension. Unknown extensions map
    /// to [`FileKind::Text`].
    pub fn from_name(name: &str) -> Self {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "md" => Self::Markdown,
            "js" => Self::Javascript,
            "ts" => Self::Typescript,
            "vue" => Self::Vue,
            "json" => Self::Json,
            "yaml" | "yml" => Self::Yaml,
            "css" => Self::Css,
            "scss" => Self::Scss,
            "html" => Self::Html,
            "xml" => Self::Xml,
            "py" => Self::Python,
            "java" => Self::Java,
            "sh" => Self::Bash,
            "bat" => Self::Batch,
            "ps1" => Self::Powershell,
            "sql" => Self::Sql,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "ico" => Self::Image,
            _ => Self::Text,
        }
    }

    /// Whether this kind renders as syntax-highlighted code.
    pub fn is_code(self) -> bool {
        matches!(
            self,
            Self::Javascript
                | Self::Typescript
                | Self::Vue
                | Self::Json
                | Self::Yaml
                | Self::Css
                | Self::Html
                | Self::Python
                | Self::Java
                | Self::Sql
        )
    }
}

/// One filesystem entry within a session's tree.
///
/// Paths are project-relative, forward-slash normalized, and unique within
/// one session's tree; the path doubles as the node's identity across
/// reloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Stable identifier; equals `path`.
    pub id: String,
    /// Entry name (last path segment).
    pub name: String,
    /// Folder or file.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Project-relative, forward-slash path.
    pub path: String,
    /// Child nodes; meaningful only when `children_loaded` is true.
    #[serde(default)]
    pub children: Vec<TreeNode>,
    /// Whether `children` has been fetched at least once.
    #[serde(default)]
    pub children_loaded: bool,
    /// Whether some path segment contains "archive".
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_archived: bool,
    /// Checklist completion, present only on direct children of the
    /// changes root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    /// Extension-derived classification, files only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_kind: Option<FileKind>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl TreeNode {
    /// Creates a folder node for the given project-relative path.
    pub fn folder(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id: path.clone(),
            name: paths::file_name(&path).to_string(),
            kind: NodeKind::Folder,
            path,
            children: Vec::new(),
            children_loaded: false,
            is_archived: false,
            progress: None,
            file_kind: None,
        }
    }

    /// Creates a file node for the given project-relative path, with the
    /// kind derived from the name.
    pub fn file(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = paths::file_name(&path).to_string();
        let file_kind = Some(FileKind::from_name(&name));
        Self {
            id: path.clone(),
            name,
            kind: NodeKind::File,
            path,
            children: Vec::new(),
            children_loaded: false,
            is_archived: false,
            progress: None,
            file_kind,
        }
    }

    /// Whether this node is a folder.
    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }
}

/// Display categorization of the currently open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayKind {
    Markdown,
    Task,
    Code,
    Image,
    Other,
}

/// The currently open file within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    /// Project-relative path of the file.
    pub path: String,
    /// File name (last path segment).
    pub name: String,
    /// Full text content.
    pub content: String,
    /// How the rendering layer should display this file.
    pub display: DisplayKind,
    /// Extension-derived classification.
    pub file_kind: FileKind,
}

impl FileContent {
    /// Builds file content with display categorization derived from the
    /// name: the checklist file is a task list, other markdown renders as
    /// markdown, images as images, code-ish kinds as code, the rest plain.
    pub fn classify(path: impl Into<String>, content: String) -> Self {
        let path = path.into();
        let name = paths::file_name(&path).to_string();
        let file_kind = FileKind::from_name(&name);
        let display = if file_kind == FileKind::Image {
            DisplayKind::Image
        } else if name == CHECKLIST_FILE {
            DisplayKind::Task
        } else if file_kind == FileKind::Markdown {
            DisplayKind::Markdown
        } else if file_kind.is_code() {
            DisplayKind::Code
        } else {
            DisplayKind::Other
        };
        Self {
            path,
            name,
            content,
            display,
            file_kind,
        }
    }
}

/// Classification of a raw filesystem change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// A raw change notification from the filesystem provider's watch stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// The subscription this event belongs to; events for foreign keys are
    /// ignored by consumers.
    pub key: String,
    /// What happened.
    pub kind: ChangeKind,
    /// Absolute path of the affected entry, as reported by the provider.
    pub path: String,
}
