use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::{Checksum, ChecksumAlgorithm, Error, Result, SourceText, StorageLocator, TextEncoding, TextStorage};

/// Where a snapshot's text currently lives.
///
/// Exactly one backing per snapshot, fixed at construction.
#[derive(Debug, Clone)]
pub(crate) enum Backing {
	/// Text held inline in this process.
	Inline(Arc<SourceText>),
	/// Text held in an externally-owned storage region.
	Storage(StorageLocator),
}

/// An immutable, checksum-identified representation of document text.
///
/// Identity is the checksum: two snapshots with equal checksums are
/// interchangeable regardless of backing. Storage-backed snapshots
/// materialize text on demand through the [`TextStorage`] collaborator and
/// keep a weak reference to the last materialization, so repeated requests
/// share one instance as long as something else is holding it alive. The
/// weak slot is best-effort coalescing only; racing readers may legitimately
/// both issue the storage read.
#[derive(Debug)]
pub struct Snapshot {
	checksum: Checksum,
	algorithm: ChecksumAlgorithm,
	encoding: TextEncoding,
	backing: Backing,
	/// Weakly-held last materialization of a storage backing. Never an
	/// owner; reclaimable at any time.
	materialized: Mutex<Weak<SourceText>>,
}

impl Snapshot {
	/// Creates an inline-backed snapshot, computing the content checksum.
	pub fn from_text(text: SourceText) -> Self {
		let checksum = text.checksum(ChecksumAlgorithm::Sha256);
		let encoding = text.encoding();
		Self {
			checksum,
			algorithm: ChecksumAlgorithm::Sha256,
			encoding,
			backing: Backing::Inline(Arc::new(text)),
			materialized: Mutex::new(Weak::new()),
		}
	}

	/// Wraps an externally-allocated storage region without reading it.
	///
	/// The caller vouches that the region's content matches `checksum`; the
	/// region must stay allocated for this snapshot's lifetime.
	pub fn from_storage(locator: StorageLocator, checksum: Checksum, algorithm: ChecksumAlgorithm, encoding: TextEncoding) -> Self {
		Self {
			checksum,
			algorithm,
			encoding,
			backing: Backing::Storage(locator),
			materialized: Mutex::new(Weak::new()),
		}
	}

	/// Reassembles an inline snapshot from already-verified decoded parts.
	pub(crate) fn from_decoded_text(text: Arc<SourceText>, checksum: Checksum, algorithm: ChecksumAlgorithm) -> Self {
		let encoding = text.encoding();
		Self {
			checksum,
			algorithm,
			encoding,
			backing: Backing::Inline(text),
			materialized: Mutex::new(Weak::new()),
		}
	}

	/// Returns the content checksum. Never changes after construction.
	pub const fn checksum(&self) -> Checksum {
		self.checksum
	}

	/// Returns the checksum algorithm.
	pub const fn algorithm(&self) -> ChecksumAlgorithm {
		self.algorithm
	}

	/// Returns the encoding tag.
	pub const fn encoding(&self) -> TextEncoding {
		self.encoding
	}

	pub(crate) fn backing(&self) -> &Backing {
		&self.backing
	}

	/// Returns the storage locator for storage-backed snapshots.
	pub fn locator(&self) -> Option<&StorageLocator> {
		match &self.backing {
			Backing::Inline(_) => None,
			Backing::Storage(locator) => Some(locator),
		}
	}

	/// Returns `true` when the text is held inline in this process.
	pub fn is_inline(&self) -> bool {
		matches!(self.backing, Backing::Inline(_))
	}

	/// Returns the text without suspending: the inline text, or the weakly
	/// cached materialization if something is still holding it alive.
	pub fn try_text(&self) -> Option<Arc<SourceText>> {
		match &self.backing {
			Backing::Inline(text) => Some(text.clone()),
			Backing::Storage(_) => self.materialized.lock().upgrade(),
		}
	}

	/// Returns the text, reading it from the backing storage if no cached
	/// materialization is alive.
	///
	/// The result is stored back into the weak cache slot so later requests
	/// can share it. Concurrent callers may both read from storage; only the
	/// slot, not the read, is coalesced.
	pub async fn text(&self, storage: &dyn TextStorage) -> Result<Arc<SourceText>> {
		let locator = match &self.backing {
			Backing::Inline(text) => return Ok(text.clone()),
			Backing::Storage(locator) => locator,
		};
		if let Some(text) = self.materialized.lock().upgrade() {
			return Ok(text);
		}

		let bytes = storage.read(locator).await?;
		if (bytes.len() as u64) < locator.size {
			return Err(Error::Storage(crate::StorageError::ShortRead {
				expected: locator.size,
				actual: bytes.len() as u64,
			}));
		}
		tracing::debug!(name = %locator.name, size = locator.size, checksum = %self.checksum, "snapshot.materialize");

		let content = String::from_utf8(bytes.to_vec()).map_err(|_| Error::Malformed("storage bytes are not valid UTF-8"))?;
		let text = Arc::new(SourceText::with_encoding(content, self.encoding));
		debug_assert_eq!(text.checksum(self.algorithm), self.checksum);

		*self.materialized.lock() = Arc::downgrade(&text);
		Ok(text)
	}
}
