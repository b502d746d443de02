//! Checksum-identified document text snapshots.
//!
//! A [`Snapshot`] is an immutable, checksum-addressed view of document text
//! that can be serialized for sending to another process. The text is not
//! required to be live in the current process: it is backed either by inline
//! text or by a locator into externally-owned shared storage, and is
//! materialized on demand through the [`TextStorage`] collaborator.
//!
//! Two snapshots with equal checksums are semantically interchangeable
//! regardless of backing.

mod checksum;
mod loader;
mod snapshot;
mod storage;
#[cfg(test)]
mod testing;
mod text;
mod wire;

pub use checksum::{Checksum, ChecksumAlgorithm};
pub use loader::DeferredText;
pub use snapshot::Snapshot;
pub use storage::{StorageError, StorageLocator, TextStorage};
pub use text::{SourceText, TextEncoding};

/// A convenient type alias for `Result` with `E` = [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible errors.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// Declared and recomputed content checksums disagree. Fatal for the
	/// snapshot being decoded, not for the caller's queue.
	#[error("content checksum mismatch: declared {declared}, recomputed {actual}")]
	Corruption {
		/// The checksum carried by the serialized payload.
		declared: Checksum,
		/// The checksum recomputed from the payload's inline bytes.
		actual: Checksum,
	},
	/// The external storage collaborator failed. Retryable at the caller's
	/// discretion.
	#[error("storage unavailable: {0}")]
	Storage(#[from] StorageError),
	/// The serialized payload is structurally invalid.
	#[error("malformed snapshot payload: {0}")]
	Malformed(&'static str),
	/// The serialized payload names a checksum algorithm this build does not
	/// know.
	#[error("unknown checksum algorithm id {0}")]
	UnknownAlgorithm(i32),
	/// The serialized payload names a text encoding this build does not know.
	#[error("unknown text encoding id {0}")]
	UnknownEncoding(i32),
}
