//! Tree loader.
//!
//! Builds the three category trees (`changes`, `specs`, `other`) from the
//! filesystem provider at a given depth, rewriting every returned path
//! into a stable, project-rooted logical identifier.
//!
//! A project may keep its OpenSpec directories at the root
//! (`<root>/changes`) or nested (`<root>/openspec/changes`); the resolved
//! [`BaseResolution`] decides both where to read and which logical prefix
//! the resulting paths carry, so node identity is independent of the
//! physical layout.
//!
//! A failed read of any category root yields an empty tree for that root,
//! never an error for the whole load.

use tracing::{debug, trace};

use crate::provider::FileSystemProvider;
use crate::types::TreeNode;
use crate::util::paths;

/// Category directory names probed for and excluded from the other tree.
const CHANGES_DIR: &str = "changes";
const SPECS_DIR: &str = "specs";
const OPENSPEC_DIR: &str = "openspec";

/// Where a project's OpenSpec directories physically live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseResolution {
    /// `changes`/`specs` sit directly under the project root.
    Root,
    /// `changes`/`specs` sit under an `openspec/` subdirectory.
    OpenspecSubdir,
}

impl BaseResolution {
    /// Physical directory the category trees are read from.
    pub fn physical_base(self, project_path: &str) -> String {
        match self {
            Self::Root => project_path.to_string(),
            Self::OpenspecSubdir => paths::join(project_path, OPENSPEC_DIR),
        }
    }

    /// Logical prefix for a category's node paths.
    pub fn logical_prefix(self, category: &str) -> String {
        match self {
            Self::Root => category.to_string(),
            Self::OpenspecSubdir => paths::join(OPENSPEC_DIR, category),
        }
    }
}

/// The three category trees produced by one load pass.
#[derive(Debug, Default, Clone)]
pub struct ProjectTrees {
    pub changes: Vec<TreeNode>,
    pub specs: Vec<TreeNode>,
    pub other: Vec<TreeNode>,
}

/// Probes the project layout to resolve where `changes`/`specs` live.
///
/// A probe failure (no `openspec/` directory at all) resolves to
/// [`BaseResolution::Root`]; it is not an error.
pub async fn resolve_base(provider: &dyn FileSystemProvider, project_path: &str) -> BaseResolution {
    let openspec_path = paths::join(project_path, OPENSPEC_DIR);
    match provider.list_directory(&openspec_path, Some(0)).await {
        Ok(items) => {
            let has_categories = items
                .iter()
                .any(|item| item.name == CHANGES_DIR || item.name == SPECS_DIR);
            if has_categories {
                debug!(path = %openspec_path, "Resolved OpenSpec base to subdirectory");
                BaseResolution::OpenspecSubdir
            } else {
                BaseResolution::Root
            }
        }
        Err(e) => {
            trace!(path = %openspec_path, error = %e, "No openspec subdirectory");
            BaseResolution::Root
        }
    }
}

/// Loads the category trees at the given depth.
///
/// `depth = None` traverses without bound. The other-files tree is read
/// only when `include_other` is set, and excludes the category
/// directories themselves.
pub async fn load_trees(
    provider: &dyn FileSystemProvider,
    project_path: &str,
    base: BaseResolution,
    depth: Option<usize>,
    include_other: bool,
) -> ProjectTrees {
    let physical_base = base.physical_base(project_path);

    let changes = load_category(provider, &physical_base, base, CHANGES_DIR, depth).await;
    let specs = load_category(provider, &physical_base, base, SPECS_DIR, depth).await;

    let other = if include_other {
        load_other(provider, project_path, depth).await
    } else {
        Vec::new()
    };

    ProjectTrees {
        changes,
        specs,
        other,
    }
}

/// Reads the children of a single folder node (one level deep) and
/// re-prefixes them with the node's own path, leaving sibling and
/// ancestor identity untouched.
pub async fn expand_dir(
    provider: &dyn FileSystemProvider,
    project_path: &str,
    node_path: &str,
) -> Vec<TreeNode> {
    let physical = paths::join(project_path, node_path);
    match provider.list_directory(&physical, Some(0)).await {
        Ok(items) => prefix_nodes(items, node_path),
        Err(e) => {
            debug!(path = %physical, error = %e, "Folder expansion read failed");
            Vec::new()
        }
    }
}

/// Reads one category tree and rewrites its paths to logical identifiers.
async fn load_category(
    provider: &dyn FileSystemProvider,
    physical_base: &str,
    base: BaseResolution,
    category: &str,
    depth: Option<usize>,
) -> Vec<TreeNode> {
    let read_path = paths::join(physical_base, category);
    match provider.list_directory(&read_path, depth).await {
        Ok(items) => {
            let prefix = base.logical_prefix(category);
            let nodes = prefix_nodes(items, &prefix);
            trace!(category = %category, count = nodes.len(), "Loaded category tree");
            nodes
        }
        Err(e) => {
            debug!(path = %read_path, error = %e, "Category read failed, tree left empty");
            Vec::new()
        }
    }
}

/// Reads the project root for the other-files panel, excluding the
/// category directories.
async fn load_other(
    provider: &dyn FileSystemProvider,
    project_path: &str,
    depth: Option<usize>,
) -> Vec<TreeNode> {
    match provider.list_directory(project_path, depth).await {
        Ok(items) => items
            .into_iter()
            .filter(|item| {
                item.name != CHANGES_DIR && item.name != SPECS_DIR && item.name != OPENSPEC_DIR
            })
            .map(finalize_node)
            .collect(),
        Err(e) => {
            debug!(path = %project_path, error = %e, "Other-files read failed, tree left empty");
            Vec::new()
        }
    }
}

/// Rewrites provider-relative paths under a logical prefix, recursively,
/// and derives archive flags.
fn prefix_nodes(items: Vec<TreeNode>, prefix: &str) -> Vec<TreeNode> {
    items
        .into_iter()
        .map(|mut node| {
            let rel = if node.path.is_empty() {
                node.name.clone()
            } else {
                node.path.clone()
            };
            node.path = paths::join(prefix, &rel);
            node.id = node.path.clone();
            node.is_archived = paths::has_archive_segment(&node.path);
            node.children = prefix_nodes(std::mem::take(&mut node.children), prefix);
            node
        })
        .collect()
}

/// Normalizes a root-level other-files node: path and id are the bare
/// name, archive flags derived.
fn finalize_node(mut node: TreeNode) -> TreeNode {
    node.path = paths::normalize(if node.path.is_empty() {
        &node.name
    } else {
        &node.path
    });
    node.id = node.path.clone();
    node.is_archived = paths::has_archive_segment(&node.path);
    node.children = std::mem::take(&mut node.children)
        .into_iter()
        .map(finalize_node)
        .collect();
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;

    fn folder_with_children(path: &str, children: Vec<TreeNode>) -> TreeNode {
        let mut node = TreeNode::folder(path);
        node.children = children;
        node.children_loaded = true;
        node
    }

    #[test]
    fn base_resolution_paths_and_prefixes() {
        assert_eq!(BaseResolution::Root.physical_base("/proj"), "/proj");
        assert_eq!(
            BaseResolution::OpenspecSubdir.physical_base("/proj"),
            "/proj/openspec"
        );
        assert_eq!(BaseResolution::Root.logical_prefix("changes"), "changes");
        assert_eq!(
            BaseResolution::OpenspecSubdir.logical_prefix("specs"),
            "openspec/specs"
        );
    }

    #[test]
    fn prefixing_rewrites_paths_recursively() {
        let tree = vec![folder_with_children(
            "add-auth",
            vec![TreeNode::file("add-auth/tasks.md")],
        )];

        let prefixed = prefix_nodes(tree, "changes");
        assert_eq!(prefixed[0].path, "changes/add-auth");
        assert_eq!(prefixed[0].id, "changes/add-auth");
        assert_eq!(prefixed[0].children[0].path, "changes/add-auth/tasks.md");
        assert_eq!(prefixed[0].children[0].kind, NodeKind::File);
    }

    #[test]
    fn prefixing_marks_archive_segments() {
        let tree = vec![folder_with_children(
            "archive",
            vec![TreeNode::folder("archive/old-change")],
        )];

        let prefixed = prefix_nodes(tree, "changes");
        assert!(prefixed[0].is_archived);
        assert!(prefixed[0].children[0].is_archived);
    }

    #[test]
    fn prefixing_falls_back_to_name_for_empty_paths() {
        let mut node = TreeNode::folder("ignored");
        node.path = String::new();
        node.name = "add-auth".to_string();

        let prefixed = prefix_nodes(vec![node], "openspec/changes");
        assert_eq!(prefixed[0].path, "openspec/changes/add-auth");
    }
}
