//! Persisted/wire layout of a serialized snapshot.
//!
//! Bit-exact layout, all integers little-endian:
//!
//! ```text
//! i32 checksum algorithm id
//! i32 text encoding id
//! i32 hash length, hash bytes
//! i32 kind (0 = inline bytes, 1 = storage locator)
//! inline:  i32 length, text bytes
//! storage: i32 length, region name bytes, i64 offset, i64 size
//! ```
//!
//! Decoding recomputes the checksum of inline bytes and rejects payloads
//! whose declared and recomputed checksums disagree.

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::snapshot::Backing;
use crate::{Checksum, ChecksumAlgorithm, Error, Result, Snapshot, SourceText, StorageLocator, TextEncoding};

const KIND_INLINE: i32 = 0;
const KIND_STORAGE: i32 = 1;

impl Snapshot {
	/// Serializes this snapshot into `buf`.
	pub fn encode(&self, buf: &mut impl BufMut) {
		buf.put_i32_le(self.algorithm().as_wire());
		buf.put_i32_le(self.encoding().as_wire());
		buf.put_i32_le(Checksum::LEN as i32);
		buf.put_slice(self.checksum().as_bytes());

		match self.backing() {
			Backing::Inline(text) => {
				buf.put_i32_le(KIND_INLINE);
				buf.put_i32_le(text.len() as i32);
				buf.put_slice(text.as_bytes());
			}
			Backing::Storage(locator) => {
				buf.put_i32_le(KIND_STORAGE);
				buf.put_i32_le(locator.name.len() as i32);
				buf.put_slice(locator.name.as_bytes());
				buf.put_i64_le(locator.offset as i64);
				buf.put_i64_le(locator.size as i64);
			}
		}
	}

	/// Serializes this snapshot into a fresh buffer.
	pub fn to_bytes(&self) -> Bytes {
		let mut buf = BytesMut::new();
		self.encode(&mut buf);
		buf.freeze()
	}

	/// Deserializes a snapshot, verifying inline content against the
	/// declared checksum.
	pub fn decode(buf: &mut impl Buf) -> Result<Self> {
		let algorithm_id = take_i32(buf)?;
		let algorithm = ChecksumAlgorithm::from_wire(algorithm_id).ok_or(Error::UnknownAlgorithm(algorithm_id))?;
		let encoding_id = take_i32(buf)?;
		let encoding = TextEncoding::from_wire(encoding_id).ok_or(Error::UnknownEncoding(encoding_id))?;

		let hash_len = take_len(buf)?;
		if hash_len != Checksum::LEN {
			return Err(Error::Malformed("unexpected content hash length"));
		}
		let hash = take_bytes(buf, hash_len)?;
		let mut digest = [0u8; Checksum::LEN];
		digest.copy_from_slice(&hash);
		let declared = Checksum::from_bytes(digest);

		match take_i32(buf)? {
			KIND_INLINE => {
				let len = take_len(buf)?;
				let content = take_bytes(buf, len)?;
				let actual = Checksum::compute(algorithm, &content);
				if actual != declared {
					return Err(Error::Corruption { declared, actual });
				}
				let content = String::from_utf8(content.to_vec()).map_err(|_| Error::Malformed("inline bytes are not valid UTF-8"))?;
				let text = Arc::new(SourceText::with_encoding(content, encoding));
				Ok(Self::from_decoded_text(text, declared, algorithm))
			}
			KIND_STORAGE => {
				let name_len = take_len(buf)?;
				let name = take_bytes(buf, name_len)?;
				let name = String::from_utf8(name.to_vec()).map_err(|_| Error::Malformed("region name is not valid UTF-8"))?;
				let offset = take_u64(buf)?;
				let size = take_u64(buf)?;
				Ok(Self::from_storage(StorageLocator::new(name, offset, size), declared, algorithm, encoding))
			}
			_ => Err(Error::Malformed("unknown backing kind")),
		}
	}
}

fn take_i32(buf: &mut impl Buf) -> Result<i32> {
	if buf.remaining() < 4 {
		return Err(Error::Malformed("unexpected end of payload"));
	}
	Ok(buf.get_i32_le())
}

fn take_u64(buf: &mut impl Buf) -> Result<u64> {
	if buf.remaining() < 8 {
		return Err(Error::Malformed("unexpected end of payload"));
	}
	let value = buf.get_i64_le();
	u64::try_from(value).map_err(|_| Error::Malformed("negative storage extent"))
}

fn take_len(buf: &mut impl Buf) -> Result<usize> {
	let len = take_i32(buf)?;
	usize::try_from(len).map_err(|_| Error::Malformed("negative length"))
}

fn take_bytes(buf: &mut impl Buf, len: usize) -> Result<Bytes> {
	if buf.remaining() < len {
		return Err(Error::Malformed("unexpected end of payload"));
	}
	Ok(buf.copy_to_bytes(len))
}
