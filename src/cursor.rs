use crate::error::{Result, WireError};
use crate::types::{Endian, IntSpec};

/// Bounded cursor over an immutable byte slice with a shrinkable limit.
///
/// The limit models the active size window: a struct that commits to a
/// declared size lowers the limit for its children and restores it on exit.
pub(crate) struct Cursor<'a> {
	bytes: &'a [u8],
	pos: usize,
	limit: usize,
}

impl<'a> Cursor<'a> {
	/// Create a cursor starting at `offset` with the whole slice visible.
	pub fn new(bytes: &'a [u8], offset: usize) -> Self {
		Self {
			bytes,
			pos: offset.min(bytes.len()),
			limit: bytes.len(),
		}
	}

	/// Return current byte offset.
	pub fn pos(&self) -> usize {
		self.pos
	}

	/// Return the active window limit.
	pub fn limit(&self) -> usize {
		self.limit
	}

	/// Return unread bytes inside the active window.
	pub fn remaining(&self) -> usize {
		self.limit.saturating_sub(self.pos)
	}

	/// Lower the limit to `end` and return the previous limit.
	///
	/// `end` must not grow the window beyond the current limit.
	pub fn push_limit(&mut self, end: usize) -> usize {
		let old = self.limit;
		self.limit = end.min(old);
		old
	}

	/// Restore a limit previously returned by `push_limit`.
	pub fn pop_limit(&mut self, old: usize) {
		self.limit = old;
	}

	/// Read exactly `n` bytes and advance.
	pub fn read_exact(&mut self, n: usize) -> Result<&'a [u8]> {
		if n > self.remaining() {
			return Err(WireError::InsufficientBytes {
				at: self.pos,
				need: n,
				rem: self.remaining(),
			});
		}

		let start = self.pos;
		self.pos += n;
		Ok(&self.bytes[start..self.pos])
	}

	/// Read all bytes up to the window limit.
	pub fn read_rest(&mut self) -> &'a [u8] {
		let start = self.pos;
		self.pos = self.limit;
		&self.bytes[start..self.limit]
	}

	/// Read an unsigned integer through its endian rule.
	pub fn read_uint(&mut self, spec: IntSpec) -> Result<u64> {
		let raw = self.read_exact(spec.width as usize)?;
		let mut buf = [0_u8; 8];
		match spec.endian {
			Endian::Big => buf[8 - raw.len()..].copy_from_slice(raw),
			Endian::Little => buf[..raw.len()].copy_from_slice(raw),
		}
		Ok(match spec.endian {
			Endian::Big => u64::from_be_bytes(buf),
			Endian::Little => u64::from_le_bytes(buf),
		})
	}

	/// Read a signed integer through its endian rule, sign-extended.
	pub fn read_int(&mut self, spec: IntSpec) -> Result<i64> {
		let unsigned = self.read_uint(spec)?;
		let bits = u32::from(spec.width) * 8;
		if bits == 64 {
			return Ok(unsigned as i64);
		}
		let sign = 1_u64 << (bits - 1);
		if unsigned & sign != 0 {
			Ok((unsigned | !((1_u64 << bits) - 1)) as i64)
		} else {
			Ok(unsigned as i64)
		}
	}

	/// Read a zero-terminated byte string without the terminator.
	pub fn read_cstring_bytes(&mut self) -> Result<&'a [u8]> {
		let start = self.pos;
		let rem = &self.bytes[self.pos..self.limit];
		let Some(rel_end) = rem.iter().position(|byte| *byte == 0) else {
			return Err(WireError::InsufficientBytes {
				at: self.pos,
				need: 1,
				rem: self.remaining(),
			});
		};

		let end = start + rel_end;
		self.pos = end + 1;
		Ok(&self.bytes[start..end])
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{INT16, UINT16, UINT32_LE};

	fn int_spec(ty: crate::types::TypeRef) -> IntSpec {
		match ty {
			crate::types::TypeRef::Int(spec) => spec,
			_ => unreachable!(),
		}
	}

	#[test]
	fn uint_reads_respect_endianness() {
		let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
		let mut cursor = Cursor::new(&data, 0);
		assert_eq!(cursor.read_uint(int_spec(UINT16)).unwrap(), 0x0102);
		assert_eq!(cursor.read_uint(int_spec(UINT32_LE)).unwrap(), 0x0605_0403);
		assert_eq!(cursor.remaining(), 0);
	}

	#[test]
	fn int_reads_sign_extend() {
		let data = [0xff, 0xfe];
		let mut cursor = Cursor::new(&data, 0);
		assert_eq!(cursor.read_int(int_spec(INT16)).unwrap(), -2);
	}

	#[test]
	fn limit_bounds_reads() {
		let data = [1, 2, 3, 4];
		let mut cursor = Cursor::new(&data, 0);
		let old = cursor.push_limit(2);
		assert!(cursor.read_exact(3).is_err());
		assert_eq!(cursor.read_rest(), &[1, 2]);
		cursor.pop_limit(old);
		assert_eq!(cursor.read_rest(), &[3, 4]);
	}

	#[test]
	fn cstring_stops_at_terminator() {
		let data = [b'a', b'b', 0, b'c'];
		let mut cursor = Cursor::new(&data, 0);
		assert_eq!(cursor.read_cstring_bytes().unwrap(), b"ab");
		assert_eq!(cursor.pos(), 3);
	}
}
