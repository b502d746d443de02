use std::fmt;

use crate::{Checksum, ChecksumAlgorithm};

/// Identifies the byte encoding of serialized text.
///
/// The discriminants are the wire ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TextEncoding {
	/// UTF-8, the only encoding current builds emit.
	Utf8 = 0,
}

impl TextEncoding {
	/// Returns the wire id for this encoding.
	pub const fn as_wire(self) -> i32 {
		self as i32
	}

	/// Looks up an encoding by wire id.
	pub const fn from_wire(id: i32) -> Option<Self> {
		match id {
			0 => Some(Self::Utf8),
			_ => None,
		}
	}
}

/// Immutable realized document text.
///
/// Shared as `Arc<SourceText>` so materializations can be handed to many
/// requests without copying.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceText {
	encoding: TextEncoding,
	content: String,
}

impl SourceText {
	/// Creates a UTF-8 source text.
	pub fn new(content: impl Into<String>) -> Self {
		Self {
			encoding: TextEncoding::Utf8,
			content: content.into(),
		}
	}

	/// Creates a source text with an explicit encoding tag.
	pub fn with_encoding(content: impl Into<String>, encoding: TextEncoding) -> Self {
		Self {
			encoding,
			content: content.into(),
		}
	}

	/// Returns the text content.
	pub fn as_str(&self) -> &str {
		&self.content
	}

	/// Returns the serialized byte form of the content.
	pub fn as_bytes(&self) -> &[u8] {
		self.content.as_bytes()
	}

	/// Returns the content length in bytes.
	pub fn len(&self) -> usize {
		self.content.len()
	}

	/// Returns `true` for empty content.
	pub fn is_empty(&self) -> bool {
		self.content.is_empty()
	}

	/// Returns the encoding tag.
	pub const fn encoding(&self) -> TextEncoding {
		self.encoding
	}

	/// Computes the content checksum under `algorithm`.
	pub fn checksum(&self, algorithm: ChecksumAlgorithm) -> Checksum {
		Checksum::compute(algorithm, self.as_bytes())
	}
}

impl fmt::Debug for SourceText {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SourceText")
			.field("encoding", &self.encoding)
			.field("len", &self.content.len())
			.finish()
	}
}
