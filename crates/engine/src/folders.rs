//! Folder operations.
//!
//! Each operation rebuilds the tree from storage, validates the change
//! against that snapshot, and only then issues a single storage mutation.
//! Folder counts are small; the event table is never read to build the tree.

use triage_core::error::CoreError;
use triage_core::folder::FolderTree;
use triage_core::store::EventStore;
use triage_core::types::DbId;

use crate::context::load_folder_tree;
use crate::engine::FilterEngine;

impl<S: EventStore> FilterEngine<S> {
    /// The current folder tree.
    pub async fn folder_tree(&self) -> Result<FolderTree, CoreError> {
        load_folder_tree(self.store()).await
    }

    /// Resolve a folder path to its id.
    pub async fn resolve_folder(&self, path: &str) -> Result<Option<DbId>, CoreError> {
        Ok(self.folder_tree().await?.resolve_path(path).map(|n| n.id))
    }

    /// Create a folder under `parent_id`, returning its id.
    pub async fn add_folder(&self, parent_id: DbId, name: &str) -> Result<DbId, CoreError> {
        let tree = self.folder_tree().await?;
        tree.validate_add(parent_id, name)?;
        let id = self.store().add_folder(parent_id, name).await?;
        tracing::info!(folder_id = id, parent_id, name, "Folder created");
        Ok(id)
    }

    /// Move a folder under a new parent. Moving a folder into itself or one
    /// of its descendants is rejected. Moving to the current parent is a
    /// no-op.
    pub async fn move_folder(&self, id: DbId, new_parent_id: DbId) -> Result<(), CoreError> {
        let tree = self.folder_tree().await?;
        tree.validate_move(id, new_parent_id)?;
        if tree.parent_of(id) == Some(new_parent_id) {
            return Ok(());
        }
        self.store().move_folder(id, new_parent_id).await?;
        tracing::info!(folder_id = id, new_parent_id, "Folder moved");
        Ok(())
    }

    pub async fn rename_folder(&self, id: DbId, name: &str) -> Result<(), CoreError> {
        let tree = self.folder_tree().await?;
        tree.validate_rename(id, name)?;
        self.store().rename_folder(id, name).await?;
        tracing::info!(folder_id = id, name, "Folder renamed");
        Ok(())
    }

    /// Delete an empty folder: no subfolders and no events.
    pub async fn delete_folder(&self, id: DbId) -> Result<(), CoreError> {
        let tree = self.folder_tree().await?;
        tree.validate_delete(id)?;
        let events = self.store().count_events_in_folder(id).await?;
        if events > 0 {
            let name = tree.get(id).map(|n| n.name.as_str()).unwrap_or_default();
            return Err(CoreError::Validation(format!(
                "Folder '{name}' is not empty: it contains {events} event(s)"
            )));
        }
        self.store().delete_folder(id).await?;
        tracing::info!(folder_id = id, "Folder deleted");
        Ok(())
    }
}
