//! Checklist parser.
//!
//! Parses markdown checklist files (`tasks.md`) into a flat task sequence
//! the rendering layer can display directly. Completion counts are derived
//! from the same parsed sequence, so the progress badge and the rendered
//! checklist can never disagree.
//!
//! # Format
//!
//! - `##`/`###` headings open a section. A section whose title starts with
//!   a dotted numeric token (`## 1.2 Storage`) establishes a numbering
//!   prefix for the items below it.
//! - `- [ ]` / `- [x]` lines are tasks. Nesting comes from indentation
//!   (two spaces per level); an item numbered beneath the section prefix
//!   (`- [ ] 1.2.3 write schema`) is pushed to at least the depth its
//!   numbering implies, which reconciles unindented but numbered
//!   sub-items.
//! - A trailing `_Requirements: 1.1, 2.3_` annotation is extracted and
//!   stripped from the label.
//! - Indented plain `-` lines following a task accumulate into that
//!   task's description.
//!
//! Parsing is pure: no I/O, deterministic, idempotent.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::Progress;

/// Matches a level-2 or level-3 heading.
static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{2,3}\s+(.+)$").expect("section pattern"));

/// Matches a checkbox line: indentation, `- [x]` or `- [ ]` (optionally
/// followed by an emphasis `*`), then the label.
static TASK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\s*)-\s*\[(x|\s*)\]\*?\s*(.+)$").expect("task pattern"));

/// Matches a `_Requirements: …_` annotation inside a label.
static REQUIREMENTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)_requirements?:\s*([^_]+)_").expect("requirements pattern"));

/// Matches an indented plain list line that continues a task description.
static DESCRIPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{2,}-\s+[^\[\]]").expect("description pattern"));

/// Captures the text of a description continuation line.
static DESCRIPTION_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+-\s+(.+)$").expect("description text pattern"));

/// One parsed checklist entry: either a section heading or a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    /// Stable identifier within one parse (`section-N` / `task-N`).
    pub id: String,
    /// Display label with annotations stripped.
    pub label: String,
    /// Whether the checkbox is checked; always false for sections.
    pub checked: bool,
    /// Nesting level, 0-based.
    pub level: usize,
    /// Requirement references extracted from the label.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
    /// Free-form description accumulated from continuation lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Title of the section this task belongs to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub section: String,
    /// Whether this entry is a section heading rather than a task.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_section: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Parses checklist text into a flat sequence of sections and tasks.
pub fn parse_task_list(text: &str) -> Vec<TaskItem> {
    let mut items: Vec<TaskItem> = Vec::new();
    let mut next_id = 0usize;
    let mut current_section = String::new();
    let mut section_prefix: Option<Vec<u32>> = None;
    // Index into `items` of the task currently accumulating description
    // lines, if any.
    let mut open_task: Option<usize> = None;

    for line in text.lines() {
        if let Some(captures) = SECTION_RE.captures(line) {
            current_section = captures[1].trim().to_string();
            section_prefix = numeric_token(&current_section);
            items.push(TaskItem {
                id: format!("section-{next_id}"),
                label: current_section.clone(),
                checked: false,
                level: 0,
                requirements: Vec::new(),
                description: None,
                section: String::new(),
                is_section: true,
            });
            next_id += 1;
            open_task = None;
            continue;
        }

        if let Some(captures) = TASK_RE.captures(line) {
            let indent = captures[1].len();
            let checked = captures[2].eq_ignore_ascii_case("x");
            let raw_label = captures[3].trim().to_string();

            let requirements = REQUIREMENTS_RE
                .captures(&raw_label)
                .map(|req| {
                    req[1]
                        .split(',')
                        .map(|part| part.trim().to_string())
                        .filter(|part| !part.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            let label = REQUIREMENTS_RE
                .replace_all(&raw_label, "")
                .trim()
                .to_string();

            let base_level = indent / 2;
            let level = numbered_level(&label, section_prefix.as_deref())
                .map_or(base_level, |numbered| numbered.max(base_level));

            items.push(TaskItem {
                id: format!("task-{next_id}"),
                label,
                checked,
                level,
                requirements,
                description: None,
                section: current_section.clone(),
                is_section: false,
            });
            next_id += 1;
            open_task = Some(items.len() - 1);
            continue;
        }

        if let Some(task_idx) = open_task {
            if DESCRIPTION_RE.is_match(line) {
                if let Some(captures) = DESCRIPTION_TEXT_RE.captures(line) {
                    let text = captures[1].to_string();
                    let description = &mut items[task_idx].description;
                    match description {
                        Some(existing) => {
                            existing.push('\n');
                            existing.push_str(&text);
                        }
                        None => *description = Some(text),
                    }
                }
            }
        }
    }

    items
}

/// Derives completion counts from checklist text.
///
/// Filters the same sequence [`parse_task_list`] produces; there is no
/// separate counting pass.
pub fn task_progress(text: &str) -> Progress {
    let items = parse_task_list(text);
    let tasks: Vec<&TaskItem> = items.iter().filter(|item| !item.is_section).collect();
    Progress {
        completed: tasks.iter().filter(|task| task.checked).count(),
        total: tasks.len(),
    }
}

/// Parses a leading dotted numeric token ("1.2.3") into its integer parts.
fn numeric_token(text: &str) -> Option<Vec<u32>> {
    let token: &str = text
        .split_whitespace()
        .next()
        .filter(|token| token.chars().all(|c| c.is_ascii_digit() || c == '.'))?;
    let token = token.trim_matches('.');
    if token.is_empty() {
        return None;
    }
    token
        .split('.')
        .map(|part| part.parse::<u32>().ok())
        .collect()
}

/// If the label is numbered beneath the section prefix, returns the
/// nesting level its extra numeric depth implies.
fn numbered_level(label: &str, section_prefix: Option<&[u32]>) -> Option<usize> {
    let prefix = section_prefix?;
    let parts = numeric_token(label)?;
    if parts.len() > prefix.len() && parts[..prefix.len()] == *prefix {
        Some(parts.len() - prefix.len())
    } else {
        None
    }
}
