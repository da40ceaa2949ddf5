//! Run-scoped state shared by every event evaluated in one run.

use triage_core::condition::ConditionEvaluator;
use triage_core::error::CoreError;
use triage_core::folder::FolderTree;
use triage_core::store::EventStore;

/// State computed once at the start of a run.
///
/// The folder tree is a snapshot: folder changes made in storage after the
/// run starts are not visible to `folder` conditions or `MoveTo` actions in
/// the same run. Event moves made by actions are visible, because they update
/// the in-memory event's folder id, which is looked up in this snapshot.
#[derive(Debug)]
pub struct RunContext {
    pub folders: FolderTree,
    pub evaluator: ConditionEvaluator,
}

impl RunContext {
    pub fn new(folders: FolderTree) -> Self {
        Self {
            folders,
            evaluator: ConditionEvaluator::new(),
        }
    }

    /// Load the folder snapshot from storage.
    pub async fn load<S>(store: &S) -> Result<Self, CoreError>
    where
        S: EventStore + ?Sized,
    {
        Ok(Self::new(load_folder_tree(store).await?))
    }
}

/// Build the folder tree from storage. A circular reference means corrupted
/// data or a racing writer, so it is logged at error level before returning.
pub async fn load_folder_tree<S>(store: &S) -> Result<FolderTree, CoreError>
where
    S: EventStore + ?Sized,
{
    let folders = store.list_folders().await?;
    FolderTree::build(folders).inspect_err(|e| {
        if let CoreError::CircularReference { folder_id } = e {
            tracing::error!(folder_id, "Folder tree contains a circular reference");
        }
    })
}
