use async_trait::async_trait;
use bytes::Bytes;

/// Opaque reference to a region of externally-owned shared storage.
///
/// The storage service owning the region must outlive every snapshot that
/// references it; the locator itself carries no liveness.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageLocator {
	/// Storage region name, assigned by the storage service.
	pub name: String,
	/// Byte offset of the text within the region.
	pub offset: u64,
	/// Byte length of the text.
	pub size: u64,
}

impl StorageLocator {
	/// Creates a locator.
	pub fn new(name: impl Into<String>, offset: u64, size: u64) -> Self {
		Self {
			name: name.into(),
			offset,
			size,
		}
	}
}

/// Failures raised by the storage collaborator.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
	/// The named region could not be allocated, read, or released.
	#[error("storage region '{name}': {reason}")]
	Unavailable {
		/// Region name from the locator.
		name: String,
		/// Collaborator-supplied failure description.
		reason: String,
	},
	/// A read returned fewer bytes than the locator declares.
	#[error("storage read returned {actual} bytes, locator declares {expected}")]
	ShortRead {
		/// Byte count declared by the locator.
		expected: u64,
		/// Byte count actually returned.
		actual: u64,
	},
}

/// External shared-storage collaborator.
///
/// Consumed, never implemented, by this crate: the service owns allocation
/// and reclamation, and may live in another process. Nothing here assumes
/// in-process locality.
#[async_trait]
pub trait TextStorage: Send + Sync {
	/// Allocates a region of `size` bytes and returns its locator.
	async fn allocate(&self, size: u64) -> Result<StorageLocator, StorageError>;

	/// Writes `bytes` into an allocated region.
	async fn write(&self, locator: &StorageLocator, bytes: &[u8]) -> Result<(), StorageError>;

	/// Reads the full contents of a region.
	async fn read(&self, locator: &StorageLocator) -> Result<Bytes, StorageError>;

	/// Releases a region back to the storage service.
	async fn release(&self, locator: &StorageLocator) -> Result<(), StorageError>;
}
