use std::fmt;

use sha2::{Digest, Sha256};

/// Identifies the digest function behind a [`Checksum`].
///
/// The discriminants are the wire ids; decoding an unknown id fails rather
/// than guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ChecksumAlgorithm {
	/// SHA-256, the only algorithm current builds emit.
	Sha256 = 1,
}

impl ChecksumAlgorithm {
	/// Returns the wire id for this algorithm.
	pub const fn as_wire(self) -> i32 {
		self as i32
	}

	/// Looks up an algorithm by wire id.
	pub const fn from_wire(id: i32) -> Option<Self> {
		match id {
			1 => Some(Self::Sha256),
			_ => None,
		}
	}
}

/// Content digest identifying a snapshot's text.
///
/// Equality of checksums is equality of snapshot identity: content reachable
/// through a snapshot is always consistent with its checksum.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; Self::LEN]);

impl Checksum {
	/// Digest length in bytes.
	pub const LEN: usize = 32;

	/// Computes the checksum of `bytes` under `algorithm`.
	pub fn compute(algorithm: ChecksumAlgorithm, bytes: &[u8]) -> Self {
		match algorithm {
			ChecksumAlgorithm::Sha256 => Self(Sha256::digest(bytes).into()),
		}
	}

	/// Wraps an already-computed digest.
	pub const fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
		Self(bytes)
	}

	/// Returns the raw digest bytes.
	pub const fn as_bytes(&self) -> &[u8; Self::LEN] {
		&self.0
	}
}

impl fmt::Display for Checksum {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for byte in &self.0 {
			write!(f, "{byte:02x}")?;
		}
		Ok(())
	}
}

impl fmt::Debug for Checksum {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Checksum({self})")
	}
}
