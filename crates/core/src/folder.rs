//! Folder hierarchy.
//!
//! [`FolderTree`] is an arena built fresh from the flat folder rows every time
//! a structural question is asked. Nodes reference their parent and children by
//! arena index; the synthetic root always sits at index 0.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::naming::validate_folder_name;
use crate::types::{DbId, ROOT_FOLDER_ID};

/// Arena index of the root node.
const ROOT_INDEX: usize = 0;

/// A folder row as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: DbId,
    pub parent_id: DbId,
    pub name: String,
}

impl Folder {
    /// The synthetic root folder: id 0, its own parent, no name.
    pub fn root() -> Self {
        Self {
            id: ROOT_FOLDER_ID,
            parent_id: ROOT_FOLDER_ID,
            name: String::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_FOLDER_ID
    }
}

/// One node of a [`FolderTree`].
#[derive(Debug, Clone)]
pub struct FolderNode {
    pub id: DbId,
    pub name: String,
    parent: usize,
    children: Vec<usize>,
}

impl FolderNode {
    pub fn is_root(&self) -> bool {
        self.id == ROOT_FOLDER_ID
    }
}

fn names_equal(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// In-memory folder tree.
#[derive(Debug, Clone)]
pub struct FolderTree {
    nodes: Vec<FolderNode>,
    index: HashMap<DbId, usize>,
}

impl FolderTree {
    /// Build a tree from flat folder rows.
    ///
    /// The synthetic root is always added (a root row in `folders` is
    /// ignored). Every node must reach the root through its parent chain
    /// without revisiting a node; otherwise [`CoreError::CircularReference`]
    /// is returned carrying the id of the node where the walk looped (or of
    /// the node whose parent does not exist).
    pub fn build<I>(folders: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = Folder>,
    {
        let rows: Vec<Folder> = folders.into_iter().filter(|f| !f.is_root()).collect();

        let mut nodes = Vec::with_capacity(rows.len() + 1);
        let mut index = HashMap::with_capacity(rows.len() + 1);
        nodes.push(FolderNode {
            id: ROOT_FOLDER_ID,
            name: String::new(),
            parent: ROOT_INDEX,
            children: Vec::new(),
        });
        index.insert(ROOT_FOLDER_ID, ROOT_INDEX);

        for row in &rows {
            if index.insert(row.id, nodes.len()).is_some() {
                return Err(CoreError::Internal(format!(
                    "Duplicate folder id {} in folder list",
                    row.id
                )));
            }
            nodes.push(FolderNode {
                id: row.id,
                name: row.name.clone(),
                parent: ROOT_INDEX,
                children: Vec::new(),
            });
        }

        for (i, row) in rows.iter().enumerate() {
            let parent = *index
                .get(&row.parent_id)
                .ok_or(CoreError::CircularReference { folder_id: row.id })?;
            nodes[i + 1].parent = parent;
        }

        let mut tree = Self { nodes, index };
        tree.validate_acyclic()?;
        tree.link_children();
        Ok(tree)
    }

    /// Walk every node up to the root, failing on the first revisit.
    fn validate_acyclic(&self) -> Result<(), CoreError> {
        for start in 1..self.nodes.len() {
            let mut visited = HashSet::new();
            let mut current = start;
            while current != ROOT_INDEX {
                if !visited.insert(current) {
                    return Err(CoreError::CircularReference {
                        folder_id: self.nodes[current].id,
                    });
                }
                current = self.nodes[current].parent;
            }
        }
        Ok(())
    }

    fn link_children(&mut self) {
        for i in 1..self.nodes.len() {
            let parent = self.nodes[i].parent;
            self.nodes[parent].children.push(i);
        }
        let keys: Vec<String> = self.nodes.iter().map(|n| n.name.to_lowercase()).collect();
        for node in &mut self.nodes {
            node.children.sort_by(|a, b| keys[*a].cmp(&keys[*b]));
        }
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn root(&self) -> &FolderNode {
        &self.nodes[ROOT_INDEX]
    }

    pub fn get(&self, id: DbId) -> Option<&FolderNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: DbId) -> bool {
        self.index.contains_key(&id)
    }

    /// Number of real folders. The synthetic root is not counted.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    /// True when the tree holds only the root.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parent id of `id`. The root is its own parent.
    pub fn parent_of(&self, id: DbId) -> Option<DbId> {
        self.index
            .get(&id)
            .map(|&i| self.nodes[self.nodes[i].parent].id)
    }

    /// Direct children of `id`, sorted case-insensitively by name.
    pub fn children(&self, id: DbId) -> Vec<&FolderNode> {
        self.index
            .get(&id)
            .map(|&i| self.nodes[i].children.iter().map(|&c| &self.nodes[c]).collect())
            .unwrap_or_default()
    }

    fn child_named(&self, parent: usize, name: &str) -> Option<usize> {
        self.nodes[parent]
            .children
            .iter()
            .copied()
            .find(|&c| names_equal(&self.nodes[c].name, name))
    }

    /// Direct child of `parent_id` named `name` (case-insensitive).
    pub fn find_child(&self, parent_id: DbId, name: &str) -> Option<&FolderNode> {
        let parent = *self.index.get(&parent_id)?;
        self.child_named(parent, name).map(|c| &self.nodes[c])
    }

    /// Absolute path of a folder, e.g. `/Crashes/Android`. The root is `/`.
    pub fn path_of(&self, id: DbId) -> Option<String> {
        let mut current = *self.index.get(&id)?;
        if current == ROOT_INDEX {
            return Some("/".to_string());
        }
        let mut names = Vec::new();
        while current != ROOT_INDEX {
            names.push(self.nodes[current].name.as_str());
            current = self.nodes[current].parent;
        }
        names.reverse();
        Some(format!("/{}", names.join("/")))
    }

    /// Resolve a `/`-separated path.
    ///
    /// Paths start at the root whether or not they begin with `/`. `..` moves
    /// to the parent (the root's parent is the root); any other segment
    /// matches a direct child by case-insensitive name. A trailing `/` is
    /// ignored; an empty interior segment (`a//b`) resolves to nothing.
    pub fn resolve_path(&self, path: &str) -> Option<&FolderNode> {
        let mut segments: Vec<&str> = path.split('/').collect();
        if segments.first() == Some(&"") {
            segments.remove(0);
        }
        if segments.last() == Some(&"") {
            segments.pop();
        }
        self.resolve_segments(ROOT_INDEX, &segments)
            .map(|i| &self.nodes[i])
    }

    fn resolve_segments(&self, current: usize, segments: &[&str]) -> Option<usize> {
        let Some((first, rest)) = segments.split_first() else {
            return Some(current);
        };
        let next = match *first {
            "" => return None,
            ".." => self.nodes[current].parent,
            name => self.child_named(current, name)?,
        };
        self.resolve_segments(next, rest)
    }

    /// Whether `ancestor` is `id` itself or appears on its parent chain.
    pub fn is_ancestor_or_self(&self, ancestor: DbId, id: DbId) -> bool {
        let (Some(&target), Some(&start)) = (self.index.get(&ancestor), self.index.get(&id))
        else {
            return false;
        };
        let mut current = start;
        loop {
            if current == target {
                return true;
            }
            if current == ROOT_INDEX {
                return false;
            }
            current = self.nodes[current].parent;
        }
    }

    /// Ids of every folder below `id`, depth first, not including `id`.
    pub fn descendants(&self, id: DbId) -> Vec<DbId> {
        let mut out = Vec::new();
        let Some(&start) = self.index.get(&id) else {
            return out;
        };
        let mut stack: Vec<usize> = self.nodes[start].children.iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            out.push(self.nodes[i].id);
            stack.extend(self.nodes[i].children.iter().rev().copied());
        }
        out
    }

    // -----------------------------------------------------------------------
    // Structural validation
    // -----------------------------------------------------------------------

    fn require(&self, id: DbId) -> Result<&FolderNode, CoreError> {
        self.get(id).ok_or(CoreError::NotFound {
            entity: "folder",
            id,
        })
    }

    fn ensure_name_free(
        &self,
        parent_id: DbId,
        name: &str,
        except: Option<DbId>,
    ) -> Result<(), CoreError> {
        match self.find_child(parent_id, name) {
            Some(existing) if Some(existing.id) != except => Err(CoreError::Conflict(format!(
                "A folder named '{}' already exists in '{}'",
                existing.name,
                self.path_of(parent_id).unwrap_or_default()
            ))),
            _ => Ok(()),
        }
    }

    /// Check that a folder named `name` can be created under `parent_id`.
    pub fn validate_add(&self, parent_id: DbId, name: &str) -> Result<(), CoreError> {
        validate_folder_name(name)?;
        self.require(parent_id)?;
        self.ensure_name_free(parent_id, name, None)
    }

    /// Check that `id` can be moved under `new_parent_id`.
    pub fn validate_move(&self, id: DbId, new_parent_id: DbId) -> Result<(), CoreError> {
        let node = self.require(id)?;
        if node.is_root() {
            return Err(CoreError::Validation(
                "The root folder cannot be moved".to_string(),
            ));
        }
        self.require(new_parent_id)?;
        if id == new_parent_id {
            return Err(CoreError::Validation(
                "A folder cannot be moved into itself".to_string(),
            ));
        }
        if self.is_ancestor_or_self(id, new_parent_id) {
            return Err(CoreError::Validation(format!(
                "Folder '{}' cannot be moved into its own subfolder",
                node.name
            )));
        }
        self.ensure_name_free(new_parent_id, &node.name, Some(id))
    }

    /// Check that `id` can be renamed to `name`. Changing only the casing of
    /// a folder's own name is allowed.
    pub fn validate_rename(&self, id: DbId, name: &str) -> Result<(), CoreError> {
        let node = self.require(id)?;
        if node.is_root() {
            return Err(CoreError::Validation(
                "The root folder cannot be renamed".to_string(),
            ));
        }
        validate_folder_name(name)?;
        let parent_id = self.nodes[node.parent].id;
        self.ensure_name_free(parent_id, name, Some(id))
    }

    /// Check that `id` can be deleted as far as the tree is concerned (no
    /// subfolders). Whether it still holds events is a storage question.
    pub fn validate_delete(&self, id: DbId) -> Result<(), CoreError> {
        let node = self.require(id)?;
        if node.is_root() {
            return Err(CoreError::Validation(
                "The root folder cannot be deleted".to_string(),
            ));
        }
        if !node.children.is_empty() {
            return Err(CoreError::Validation(format!(
                "Folder '{}' is not empty: it has subfolders",
                node.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn folder(id: DbId, parent_id: DbId, name: &str) -> Folder {
        Folder {
            id,
            parent_id,
            name: name.to_string(),
        }
    }

    /// root -> a(1) -> b(2), root -> Zed(3), a -> C(4)
    fn sample() -> FolderTree {
        FolderTree::build(vec![
            folder(1, 0, "a"),
            folder(2, 1, "b"),
            folder(3, 0, "Zed"),
            folder(4, 1, "C"),
        ])
        .unwrap()
    }

    #[test]
    fn root_only_builds() {
        let tree = FolderTree::build(Vec::new()).unwrap();
        assert_eq!(tree.len(), 0);
        assert!(tree.is_empty());
        assert!(tree.root().is_root());
        assert_eq!(tree.path_of(0).as_deref(), Some("/"));
    }

    #[test]
    fn explicit_root_row_is_ignored() {
        let tree = FolderTree::build(vec![Folder::root(), folder(1, 0, "a")]).unwrap();
        assert_eq!(tree.len(), 1);
        assert!(!tree.is_empty());
    }

    #[test]
    fn two_node_cycle_is_rejected() {
        let result = FolderTree::build(vec![folder(1, 2, "A"), folder(2, 1, "B")]);
        assert_matches!(
            result,
            Err(CoreError::CircularReference { folder_id }) if folder_id == 1 || folder_id == 2
        );
    }

    #[test]
    fn self_parent_is_rejected() {
        let result = FolderTree::build(vec![folder(5, 5, "loop")]);
        assert_matches!(result, Err(CoreError::CircularReference { folder_id: 5 }));
    }

    #[test]
    fn cycle_reported_on_cycle_node_not_descendant() {
        // 9 hangs off the 1 <-> 2 cycle; the reported id must be on the cycle.
        let result = FolderTree::build(vec![
            folder(9, 1, "tail"),
            folder(1, 2, "A"),
            folder(2, 1, "B"),
        ]);
        assert_matches!(
            result,
            Err(CoreError::CircularReference { folder_id }) if folder_id == 1 || folder_id == 2
        );
    }

    #[test]
    fn orphan_is_rejected() {
        let result = FolderTree::build(vec![folder(1, 42, "orphan")]);
        assert_matches!(result, Err(CoreError::CircularReference { folder_id: 1 }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = FolderTree::build(vec![folder(1, 0, "a"), folder(1, 0, "b")]);
        assert_matches!(result, Err(CoreError::Internal(_)));
    }

    #[test]
    fn children_sorted_case_insensitively() {
        let tree = FolderTree::build(vec![
            folder(1, 0, "beta"),
            folder(2, 0, "Alpha"),
            folder(3, 0, "gamma"),
        ])
        .unwrap();
        let names: Vec<&str> = tree.children(0).iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "beta", "gamma"]);
    }

    #[test]
    fn resolve_relative_and_absolute_paths() {
        let tree = sample();
        assert_eq!(tree.resolve_path("a/b").map(|n| n.id), Some(2));
        assert_eq!(tree.resolve_path("/a/b").map(|n| n.id), Some(2));
        assert_eq!(tree.resolve_path("/A/B").map(|n| n.id), Some(2));
        assert_eq!(tree.resolve_path("a/b/").map(|n| n.id), Some(2));
    }

    #[test]
    fn resolve_missing_child_is_not_found() {
        let tree = sample();
        assert!(tree.resolve_path("a/x").is_none());
        assert!(tree.resolve_path("/nope").is_none());
    }

    #[test]
    fn resolve_interior_empty_segment_is_not_found() {
        let tree = sample();
        assert!(tree.resolve_path("a//b").is_none());
    }

    #[test]
    fn resolve_root_and_parent_segments() {
        let tree = sample();
        assert_eq!(tree.resolve_path("").map(|n| n.id), Some(0));
        assert_eq!(tree.resolve_path("/").map(|n| n.id), Some(0));
        assert_eq!(tree.resolve_path("a/b/../C").map(|n| n.id), Some(4));
        assert_eq!(tree.resolve_path("/../..").map(|n| n.id), Some(0));
    }

    #[test]
    fn path_of_nested_folder() {
        let tree = sample();
        assert_eq!(tree.path_of(2).as_deref(), Some("/a/b"));
        assert_eq!(tree.path_of(3).as_deref(), Some("/Zed"));
        assert_eq!(tree.path_of(99), None);
    }

    #[test]
    fn ancestry_and_descendants() {
        let tree = sample();
        assert!(tree.is_ancestor_or_self(1, 2));
        assert!(tree.is_ancestor_or_self(2, 2));
        assert!(tree.is_ancestor_or_self(0, 2));
        assert!(!tree.is_ancestor_or_self(2, 1));
        assert!(!tree.is_ancestor_or_self(3, 2));
        assert_eq!(tree.descendants(1), vec![2, 4]);
        assert_eq!(tree.descendants(0).len(), 4);
        assert_eq!(tree.parent_of(2), Some(1));
        assert_eq!(tree.parent_of(0), Some(0));
    }

    #[test]
    fn add_rejects_sibling_collision() {
        let tree = sample();
        assert_matches!(tree.validate_add(1, "B"), Err(CoreError::Conflict(_)));
        assert!(tree.validate_add(3, "b").is_ok());
        assert_matches!(tree.validate_add(77, "x"), Err(CoreError::NotFound { .. }));
        assert_matches!(tree.validate_add(0, "a/b"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn move_into_self_or_descendant_is_rejected() {
        let tree = sample();
        assert_matches!(tree.validate_move(1, 1), Err(CoreError::Validation(_)));
        assert_matches!(tree.validate_move(1, 2), Err(CoreError::Validation(_)));
        assert_matches!(tree.validate_move(0, 3), Err(CoreError::Validation(_)));
        assert!(tree.validate_move(2, 3).is_ok());
        assert!(tree.validate_move(2, 0).is_ok());
    }

    #[test]
    fn move_rejects_name_collision_in_target() {
        let tree = FolderTree::build(vec![
            folder(1, 0, "a"),
            folder(2, 1, "dup"),
            folder(3, 0, "Dup"),
        ])
        .unwrap();
        assert_matches!(tree.validate_move(2, 0), Err(CoreError::Conflict(_)));
    }

    #[test]
    fn rename_rules() {
        let tree = sample();
        assert!(tree.validate_rename(2, "B").is_ok());
        assert_matches!(tree.validate_rename(2, "c"), Err(CoreError::Conflict(_)));
        assert_matches!(tree.validate_rename(0, "x"), Err(CoreError::Validation(_)));
        assert_matches!(tree.validate_rename(2, ""), Err(CoreError::Validation(_)));
    }

    #[test]
    fn delete_rules() {
        let tree = sample();
        assert_matches!(tree.validate_delete(1), Err(CoreError::Validation(_)));
        assert_matches!(tree.validate_delete(0), Err(CoreError::Validation(_)));
        assert!(tree.validate_delete(2).is_ok());
    }
}
