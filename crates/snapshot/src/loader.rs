use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::{Result, Snapshot, SourceText, TextStorage};

/// Lazily-loaded source derived from a [`Snapshot`].
///
/// Defers any read of content until first access. Concurrent and subsequent
/// accesses reuse the same in-flight computation instead of re-issuing the
/// storage read, so a document synced across processes costs one read no
/// matter how many consumers resolve it. A failed load is not cached;
/// callers may retry.
pub struct DeferredText {
	snapshot: Arc<Snapshot>,
	storage: Arc<dyn TextStorage>,
	loaded: OnceCell<Arc<SourceText>>,
}

impl DeferredText {
	/// Wraps a snapshot and the storage collaborator that can realize it.
	pub fn new(snapshot: Arc<Snapshot>, storage: Arc<dyn TextStorage>) -> Self {
		Self {
			snapshot,
			storage,
			loaded: OnceCell::new(),
		}
	}

	/// Returns the underlying snapshot.
	pub fn snapshot(&self) -> &Arc<Snapshot> {
		&self.snapshot
	}

	/// Returns the loaded text without suspending, if a load completed.
	pub fn try_get(&self) -> Option<Arc<SourceText>> {
		self.loaded.get().cloned()
	}

	/// Returns the text, loading it on first access.
	pub async fn load(&self) -> Result<Arc<SourceText>> {
		self.loaded
			.get_or_try_init(|| self.snapshot.text(self.storage.as_ref()))
			.await
			.cloned()
	}
}

impl std::fmt::Debug for DeferredText {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DeferredText")
			.field("checksum", &self.snapshot.checksum())
			.field("loaded", &self.loaded.initialized())
			.finish()
	}
}
