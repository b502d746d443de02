//! In-memory stand-in for the external storage collaborator, test-only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::{StorageError, StorageLocator, TextStorage};

/// Storage stub keeping regions in a map and counting reads.
#[derive(Default)]
pub struct MemoryStorage {
	regions: Mutex<HashMap<String, Bytes>>,
	next_region: AtomicU64,
	reads: AtomicUsize,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}

	/// Allocates a region, writes `content`, and returns its locator.
	pub async fn store(&self, content: &str) -> StorageLocator {
		let locator = self.allocate(content.len() as u64).await.unwrap();
		self.write(&locator, content.as_bytes()).await.unwrap();
		locator
	}

	/// Number of `read` calls observed.
	pub fn read_count(&self) -> usize {
		self.reads.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl TextStorage for MemoryStorage {
	async fn allocate(&self, size: u64) -> Result<StorageLocator, StorageError> {
		let id = self.next_region.fetch_add(1, Ordering::SeqCst);
		let name = format!("mem-{id}");
		self.regions.lock().insert(name.clone(), Bytes::new());
		Ok(StorageLocator::new(name, 0, size))
	}

	async fn write(&self, locator: &StorageLocator, bytes: &[u8]) -> Result<(), StorageError> {
		let mut regions = self.regions.lock();
		match regions.get_mut(&locator.name) {
			Some(slot) => {
				*slot = Bytes::copy_from_slice(bytes);
				Ok(())
			}
			None => Err(StorageError::Unavailable {
				name: locator.name.clone(),
				reason: "not allocated".into(),
			}),
		}
	}

	async fn read(&self, locator: &StorageLocator) -> Result<Bytes, StorageError> {
		self.reads.fetch_add(1, Ordering::SeqCst);
		self.regions.lock().get(&locator.name).cloned().ok_or_else(|| StorageError::Unavailable {
			name: locator.name.clone(),
			reason: "not allocated".into(),
		})
	}

	async fn release(&self, locator: &StorageLocator) -> Result<(), StorageError> {
		match self.regions.lock().remove(&locator.name) {
			Some(_) => Ok(()),
			None => Err(StorageError::Unavailable {
				name: locator.name.clone(),
				reason: "not allocated".into(),
			}),
		}
	}
}
