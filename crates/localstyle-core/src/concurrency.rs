use crate::CoreError;
use localstyle_host::SourceModel;
use tracing::debug;

/// Shared read access to the host's source model, released on drop.
pub struct ReadSnapshot<'a, M: SourceModel + ?Sized> {
    model: &'a M,
}

impl<'a, M: SourceModel + ?Sized> ReadSnapshot<'a, M> {
    pub fn acquire(model: &'a M) -> Self {
        model.acquire_read();
        Self { model }
    }
}

impl<M: SourceModel + ?Sized> Drop for ReadSnapshot<'_, M> {
    fn drop(&mut self) {
        self.model.release_read();
    }
}

/// Block until the source model is consistent: the index is not being
/// rebuilt and every edited document has been committed.
///
/// Waiting for commits from a thread that already holds read access would
/// deadlock, so that case is rejected before anything is scheduled.
pub fn wait_for_consistency<M: SourceModel + ?Sized>(model: &M) -> Result<(), CoreError> {
    if model.is_index_stale() {
        debug!("source index is being rebuilt; waiting");
        model.await_index_ready();
    }

    if model.has_uncommitted_edits() {
        if model.is_read_access_allowed() {
            return Err(CoreError::CommitWaitUnderReadAccess);
        }
        debug!("uncommitted edits pending; waiting for commit");
        model.flush_and_wait()?;
    }
    Ok(())
}
