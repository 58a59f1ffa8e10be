//! Path-safe storage mutations
//!
//! Every operation validates each path it will touch against the caller's
//! namespace before the first store call. Folder operations enumerate the
//! prefix once, then work through it in fixed-size batches: all objects of a
//! batch run concurrently and are awaited together, batches run one after
//! another with a throttle delay in between. A failing object is recorded and
//! never aborts its siblings, so folder operations are best-effort and not
//! atomic.

use super::path::{validate, ObjectPath, PathPrefix};
use super::{MutationError, ObjectMeta, ObjectStore};
use crate::config::BatchSettings;
use bytes::Bytes;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Content type of folder placeholder objects
pub const PLACEHOLDER_CONTENT_TYPE: &str = "application/x-directory";

/// One object that a folder operation could not process
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemError {
    pub item: String,
    pub error: String,
}

/// Outcome of a batched folder operation
#[derive(Debug, Clone, Default)]
pub struct FolderOperationResult {
    /// Objects fully processed
    pub processed_count: usize,
    pub errors: Vec<ItemError>,
    /// Batches dispatched
    pub batches: usize,
}

impl FolderOperationResult {
    pub fn total_attempted(&self) -> usize {
        self.processed_count + self.errors.len()
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Source and final destination of a folder move, after pre-flight checks
#[derive(Debug, Clone, PartialEq)]
pub struct FolderMove {
    pub source: PathPrefix,
    pub dest: PathPrefix,
}

pub struct StorageMutator {
    store: Arc<dyn ObjectStore>,
    batch: BatchSettings,
}

impl StorageMutator {
    pub fn new(store: Arc<dyn ObjectStore>, batch: BatchSettings) -> Self {
        Self { store, batch }
    }

    // ------------------------------------------------------------------
    // Single objects
    // ------------------------------------------------------------------

    /// Copy one object; the source is kept and an existing destination is overwritten
    pub async fn copy_file(
        &self,
        caller_id: &str,
        source: &str,
        dest: &str,
    ) -> Result<ObjectMeta, MutationError> {
        let source = ObjectPath::parse(source, caller_id, "copyFile")?;
        let dest = ObjectPath::parse(dest, caller_id, "copyFile")?;

        self.require_exists(&source).await?;
        let meta = self.store.copy(source.as_str(), dest.as_str()).await?;

        tracing::info!(caller = caller_id, "copyFile {} -> {}", source, dest);
        Ok(meta)
    }

    /// Move one object; refuses to overwrite, deletes the source only after the copy landed
    pub async fn move_file(
        &self,
        caller_id: &str,
        source: &str,
        dest: &str,
    ) -> Result<ObjectMeta, MutationError> {
        let source = ObjectPath::parse(source, caller_id, "moveFile")?;
        let dest = ObjectPath::parse(dest, caller_id, "moveFile")?;

        self.relocate(caller_id, &source, &dest, "moveFile").await
    }

    /// Rename one object within its folder
    pub async fn rename_file(
        &self,
        caller_id: &str,
        source: &str,
        new_name: &str,
    ) -> Result<ObjectMeta, MutationError> {
        let source = ObjectPath::parse(source, caller_id, "renameFile")?;
        let dest = source.with_file_name(new_name, caller_id, "renameFile")?;

        self.relocate(caller_id, &source, &dest, "renameFile").await
    }

    /// Delete one object
    pub async fn delete_file(&self, caller_id: &str, path: &str) -> Result<(), MutationError> {
        let path = ObjectPath::parse(path, caller_id, "deleteFile")?;

        self.require_exists(&path).await?;
        self.store.delete(path.as_str()).await?;

        tracing::info!(caller = caller_id, "deleteFile {}", path);
        Ok(())
    }

    async fn relocate(
        &self,
        caller_id: &str,
        source: &ObjectPath,
        dest: &ObjectPath,
        operation: &str,
    ) -> Result<ObjectMeta, MutationError> {
        self.require_exists(source).await?;
        if self.store.exists(dest.as_str()).await? {
            return Err(MutationError::AlreadyExists(format!(
                "Destination '{}' already exists",
                dest
            )));
        }

        let meta = self.store.copy(source.as_str(), dest.as_str()).await?;
        self.store.delete(source.as_str()).await?;

        tracing::info!(caller = caller_id, "{} {} -> {}", operation, source, dest);
        Ok(meta)
    }

    async fn require_exists(&self, path: &ObjectPath) -> Result<(), MutationError> {
        if self.store.exists(path.as_str()).await? {
            Ok(())
        } else {
            Err(MutationError::NotFound(format!("File '{}' does not exist", path)))
        }
    }

    // ------------------------------------------------------------------
    // Folders
    // ------------------------------------------------------------------

    /// Materialize an empty folder with a placeholder object
    pub async fn create_folder(&self, caller_id: &str, path: &str) -> Result<PathPrefix, MutationError> {
        let folder = PathPrefix::parse(path, caller_id, "createFolder")?;
        let placeholder = folder.placeholder();
        validate(&placeholder, caller_id, "createFolder")?;

        if !self.store.list(folder.as_str(), Some(1)).await?.is_empty() {
            return Err(MutationError::AlreadyExists(format!(
                "Folder '{}' already exists",
                folder
            )));
        }

        self.store
            .put(&placeholder, Bytes::new(), PLACEHOLDER_CONTENT_TYPE)
            .await?;

        tracing::info!(caller = caller_id, "createFolder {}", folder);
        Ok(folder)
    }

    /// Delete every object under a prefix.
    ///
    /// Deleting a folder that holds nothing is a successful no-op. Only a
    /// failure of the initial listing is returned as an error.
    pub async fn delete_folder(
        &self,
        caller_id: &str,
        prefix: &str,
    ) -> Result<FolderOperationResult, MutationError> {
        let folder = PathPrefix::parse(prefix, caller_id, "deleteFolder")?;
        let objects = self.store.list(folder.as_str(), None).await?;

        tracing::info!(
            caller = caller_id,
            "deleteFolder {} ({} objects, batch size {})",
            folder,
            objects.len(),
            self.batch.delete_batch_size
        );

        let keys: Vec<String> = objects.into_iter().map(|o| o.path).collect();
        let store = &self.store;
        let result = run_batches(
            &keys,
            self.batch.delete_batch_size,
            self.batch.delete_batch_delay,
            |key| async move { store.delete(key).await.map_err(|e| e.to_string()) },
        )
        .await;

        log_outcome("deleteFolder", caller_id, &folder, &result);
        Ok(result)
    }

    /// Pre-flight for folder moves: both prefixes validated, no self-move, no
    /// move into a descendant. Issues no store calls.
    pub fn plan_folder_move(
        &self,
        caller_id: &str,
        source: &str,
        dest: &str,
        operation: &str,
    ) -> Result<FolderMove, MutationError> {
        let source = PathPrefix::parse(source, caller_id, operation)?;
        let dest = PathPrefix::parse(dest, caller_id, operation)?;
        check_move(source, dest)
    }

    /// Move every object under `source` to the same relative key under `dest`
    pub async fn move_folder(
        &self,
        caller_id: &str,
        source: &str,
        dest: &str,
    ) -> Result<FolderOperationResult, MutationError> {
        let plan = self.plan_folder_move(caller_id, source, dest, "moveFolder")?;
        self.execute_folder_move(caller_id, &plan, "moveFolder").await
    }

    /// Move `source` into the folder `dest_parent`, keeping its name
    pub async fn move_folder_into(
        &self,
        caller_id: &str,
        source: &str,
        dest_parent: &str,
    ) -> Result<(PathPrefix, FolderOperationResult), MutationError> {
        let source = PathPrefix::parse(source, caller_id, "moveFolder")?;
        let parent = PathPrefix::parse(dest_parent, caller_id, "moveFolder")?;
        let dest = parent.child(source.name(), caller_id, "moveFolder")?;

        let result = self.move_folder(caller_id, source.as_str(), dest.as_str()).await?;
        Ok((dest, result))
    }

    /// Rename a folder: a move to a sibling prefix
    pub async fn rename_folder(
        &self,
        caller_id: &str,
        source: &str,
        new_name: &str,
    ) -> Result<(PathPrefix, FolderOperationResult), MutationError> {
        let source = PathPrefix::parse(source, caller_id, "renameFolder")?;
        let dest = source.sibling(new_name, caller_id, "renameFolder")?;

        let plan = self.plan_folder_move(caller_id, source.as_str(), dest.as_str(), "renameFolder")?;
        let result = self.execute_folder_move(caller_id, &plan, "renameFolder").await?;
        Ok((plan.dest, result))
    }

    async fn execute_folder_move(
        &self,
        caller_id: &str,
        plan: &FolderMove,
        operation: &str,
    ) -> Result<FolderOperationResult, MutationError> {
        let objects = self.store.list(plan.source.as_str(), None).await?;

        // Every destination key is checked before anything is mutated
        let mut moves = Vec::with_capacity(objects.len());
        for object in objects {
            let new_path = plan.source.rebase(&object.path, &plan.dest).ok_or_else(|| {
                MutationError::InvalidInput(format!(
                    "{}: listed object '{}' is outside '{}'",
                    operation, object.path, plan.source
                ))
            })?;
            validate(&new_path, caller_id, operation)?;
            moves.push((object.path, new_path));
        }

        tracing::info!(
            caller = caller_id,
            "{} {} -> {} ({} objects, batch size {})",
            operation,
            plan.source,
            plan.dest,
            moves.len(),
            self.batch.move_batch_size
        );

        let store = &self.store;
        let result = run_batches(
            &moves,
            self.batch.move_batch_size,
            self.batch.move_batch_delay,
            |(from, to)| async move {
                // Copy must land before the original goes away
                store
                    .copy(from, to)
                    .await
                    .map_err(|e| format!("copy failed: {}", e))?;
                store
                    .delete(from)
                    .await
                    .map_err(|e| format!("copied to {} but deleting source failed: {}", to, e))
            },
        )
        .await;

        log_outcome(operation, caller_id, &plan.source, &result);
        Ok(result)
    }
}

fn check_move(source: PathPrefix, dest: PathPrefix) -> Result<FolderMove, MutationError> {
    if dest == source {
        return Err(MutationError::InvalidInput(
            "Source and destination folders are the same".into(),
        ));
    }
    if dest.is_descendant_of(&source) {
        return Err(MutationError::InvalidInput(format!(
            "Cannot move folder '{}' into its own subfolder '{}'",
            source, dest
        )));
    }
    Ok(FolderMove { source, dest })
}

/// Items that have a display key for error reporting
trait BatchItem {
    fn key(&self) -> &str;
}

impl BatchItem for String {
    fn key(&self) -> &str {
        self
    }
}

impl BatchItem for (String, String) {
    fn key(&self) -> &str {
        &self.0
    }
}

/// Run `op` over `items` in batches of `batch_size`.
///
/// Items within a batch run concurrently with all-settle semantics; batches
/// run in order with `delay` between consecutive batches.
async fn run_batches<'a, T, F, Fut>(
    items: &'a [T],
    batch_size: usize,
    delay: Duration,
    op: F,
) -> FolderOperationResult
where
    T: BatchItem,
    F: Fn(&'a T) -> Fut,
    Fut: std::future::Future<Output = Result<(), String>>,
{
    let mut result = FolderOperationResult::default();

    for (index, batch) in items.chunks(batch_size.max(1)).enumerate() {
        if index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let outcomes = join_all(batch.iter().map(|item| {
            let fut = op(item);
            async move { (item.key(), fut.await) }
        }))
        .await;
        result.batches += 1;

        for (key, outcome) in outcomes {
            match outcome {
                Ok(()) => result.processed_count += 1,
                Err(error) => {
                    tracing::warn!("batch item {} failed: {}", key, error);
                    result.errors.push(ItemError {
                        item: key.to_string(),
                        error,
                    });
                }
            }
        }
    }

    result
}

fn log_outcome(operation: &str, caller_id: &str, folder: &PathPrefix, result: &FolderOperationResult) {
    if result.is_complete() {
        tracing::info!(
            caller = caller_id,
            "{} {} done: {} objects in {} batches",
            operation,
            folder,
            result.processed_count,
            result.batches
        );
    } else {
        tracing::warn!(
            caller = caller_id,
            "{} {} partial: {} of {} ok, {} failed",
            operation,
            folder,
            result.processed_count,
            result.total_attempted(),
            result.errors.len()
        );
    }
}
