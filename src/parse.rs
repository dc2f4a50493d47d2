use std::sync::Arc;

use log::debug;

use crate::cursor::Cursor;
use crate::error::{Result, WireError};
use crate::structdef::{round_up, Entry, StructType};
use crate::types::TypeRef;
use crate::value::{StructValue, Value};

/// Window discipline for one struct level.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
	/// Non-greedy: a size callback bounds the window, otherwise the variable
	/// trailer parses empty.
	Exact,
	/// Greedy: the whole remaining window belongs to this level (`create`,
	/// trailer fills, extension layers).
	Greedy,
}

impl TypeRef {
	/// Parse one value from the start of `bytes`.
	///
	/// Returns the value and the number of bytes consumed, padding included.
	pub fn parse(&self, bytes: &[u8]) -> Result<(Value, usize)> {
		self.parse_at(bytes, 0)
	}

	/// Parse one value starting at `offset`.
	pub fn parse_at(&self, bytes: &[u8], offset: usize) -> Result<(Value, usize)> {
		let mut cur = Cursor::new(bytes, offset);
		let value = parse_field(self, &mut cur, false)?;
		Ok((value, cur.pos() - offset))
	}

	/// Parse a value consuming all of `bytes`.
	///
	/// Size callbacks are skipped, the variable trailer is fed greedily, and
	/// unused bytes are preserved as the value's extension tail.
	pub fn create(&self, bytes: &[u8]) -> Result<Value> {
		let mut cur = Cursor::new(bytes, 0);
		parse_field(self, &mut cur, true)
	}

	/// Instantiate a default value of a struct or bitfield type.
	///
	/// Runs init callbacks from the root of the base chain down.
	///
	/// # Panics
	///
	/// Panics when called on a non-composite type.
	pub fn new_value(&self) -> Result<StructValue> {
		match self {
			TypeRef::Struct(def) => def.default_value(),
			TypeRef::Bitfield(def) => def.default_value(),
			TypeRef::Formatted(def) => def.inner.new_value(),
			other => panic!("{} is not a composite type", other.type_name()),
		}
	}
}

/// Parse one field value.
///
/// `fill` marks trailer position: the field owns the remaining window.
pub(crate) fn parse_field(ty: &TypeRef, cur: &mut Cursor<'_>, fill: bool) -> Result<Value> {
	match ty {
		TypeRef::Int(spec) => {
			if spec.signed {
				Ok(Value::Int(cur.read_int(*spec)?))
			} else {
				Ok(Value::Uint(cur.read_uint(*spec)?))
			}
		}
		TypeRef::Char => Ok(Value::Bytes(cur.read_exact(1)?.to_vec())),
		TypeRef::CharArray(n) => {
			let raw = cur.read_exact(*n)?;
			Ok(Value::Bytes(strip_nul(raw)))
		}
		TypeRef::Raw { strip } => {
			let raw = if fill { cur.read_rest() } else { &[] };
			if *strip {
				Ok(Value::Bytes(strip_nul(raw)))
			} else {
				Ok(Value::Bytes(raw.to_vec()))
			}
		}
		TypeRef::Cstr => Ok(Value::Bytes(cur.read_cstring_bytes()?.to_vec())),
		TypeRef::Array(array) => {
			if array.len > 0 {
				let mut items = Vec::with_capacity(array.len);
				for _ in 0..array.len {
					items.push(parse_field(&array.elem, cur, false)?);
				}
				return Ok(Value::List(items));
			}
			// Open trailer: whole elements until the window runs dry; bytes
			// too short for another element are dropped.
			let mut items = Vec::new();
			if fill {
				while cur.remaining() > 0 {
					match parse_field(&array.elem, cur, false) {
						Ok(item) => items.push(item),
						Err(WireError::InsufficientBytes { .. }) => break,
						Err(err) => return Err(err),
					}
				}
				let _ = cur.read_rest();
			}
			Ok(Value::List(items))
		}
		TypeRef::Enum(def) => {
			let spec = def.base;
			if spec.signed {
				Ok(Value::Int(cur.read_int(spec)?))
			} else {
				Ok(Value::Uint(cur.read_uint(spec)?))
			}
		}
		TypeRef::Bitfield(def) => {
			let backing = cur.read_uint(def.base)?;
			Ok(Value::Struct(Box::new(def.extract(backing))))
		}
		TypeRef::Struct(def) => {
			let mode = if fill { Mode::Greedy } else { Mode::Exact };
			let value = parse_struct(def, cur, mode)?;
			Ok(Value::Struct(Box::new(value)))
		}
		TypeRef::Formatted(def) => parse_field(&def.inner, cur, fill),
		TypeRef::Optional(_) | TypeRef::DArray(_) => {
			panic!("{} can only appear as a struct member", ty.type_name())
		}
	}
}

/// Parse a struct, dispatch derived types, and skip alignment padding.
pub(crate) fn parse_struct(ty: &Arc<StructType>, cur: &mut Cursor<'_>, mode: Mode) -> Result<StructValue> {
	let root = ty.root();
	let start = cur.pos();

	let mut slots = vec![Value::Null; root.flat_len_total()];
	for (index, field) in root.flat.iter().enumerate() {
		if field.name.is_none() {
			slots[root.base_flat_len + index] = Value::Bytes(Vec::new());
		}
	}
	let mut value = StructValue::with_slots(TypeRef::Struct(Arc::clone(&root)), slots);

	let extra = parse_level(&root, cur, &mut value, 0, mode)?;
	value.set_extra(extra);

	// Derived dispatch: extension layers parse greedily from the captured
	// window tail; the value's effective type follows the chain down.
	let mut effective = root.clone();
	loop {
		let Some(sub) = effective.classify(&value)? else {
			break;
		};
		debug!("extending {} into {}", effective.name, sub.name);
		let tail = value.take_extra();
		for field in &sub.flat {
			match &field.name {
				Some(_) => value.slots_mut().push(Value::Null),
				None => value.slots_mut().push(Value::Bytes(Vec::new())),
			}
		}
		value.set_type(TypeRef::Struct(Arc::clone(&sub)));
		let mut sub_cur = Cursor::new(&tail, 0);
		let extra = parse_level(&sub, &mut sub_cur, &mut value, sub.base_flat_len, Mode::Greedy)?;
		value.set_extra(extra);
		effective = sub;
	}

	if mode == Mode::Exact {
		let consumed = cur.pos() - start;
		let padded = round_up(consumed, root.padding);
		if padded > consumed {
			cur.read_exact(padded - consumed)?;
		}
	}
	Ok(value)
}

/// Parse one chain level's entries into the target value.
///
/// Returns the unclaimed bytes of the level's size window (the extension
/// tail); levels with a variable trailer never leave one.
fn parse_level(level: &Arc<StructType>, cur: &mut Cursor<'_>, value: &mut StructValue, flat_off: usize, mode: Mode) -> Result<Vec<u8>> {
	let start = cur.pos();

	for (index, entry) in level.entries.iter().enumerate() {
		if Some(index) == level.trailer {
			continue;
		}
		parse_entry(level, entry, cur, value, flat_off, false)?;
	}

	let window_end = match mode {
		Mode::Greedy => cur.limit(),
		Mode::Exact => match &level.size_fn {
			Some(size_fn) => {
				let declared = size_fn(value).map_err(|e| WireError::callback("size", &level.name, e))?;
				let consumed = cur.pos() - start;
				if declared < consumed {
					return Err(WireError::SizeUnderflow {
						type_name: level.name.to_string(),
						declared,
						need: consumed,
					});
				}
				if start + declared > cur.limit() {
					debug!("{}: declared size {} exceeds window", level.name, declared);
					return Err(WireError::InsufficientBytes {
						at: cur.pos(),
						need: start + declared - cur.pos(),
						rem: cur.remaining(),
					});
				}
				start + declared
			}
			None => cur.pos(),
		},
	};

	let old_limit = cur.push_limit(window_end);
	let mut extra = Vec::new();
	if let Some(index) = level.trailer {
		parse_entry(level, &level.entries[index], cur, value, flat_off, true)?;
		let _ = cur.read_rest();
	} else {
		extra = cur.read_rest().to_vec();
	}
	cur.pop_limit(old_limit);
	Ok(extra)
}

fn parse_entry(
	level: &Arc<StructType>,
	entry: &Entry,
	cur: &mut Cursor<'_>,
	value: &mut StructValue,
	flat_off: usize,
	fill: bool,
) -> Result<()> {
	match entry {
		Entry::Pad { width } => {
			let _ = cur.read_exact(*width)?;
			Ok(())
		}
		Entry::Field { flat } => {
			let ty = level.flat[*flat].ty.clone();
			let parsed = match &ty {
				TypeRef::Optional(def) => {
					let wanted = (def.pred)(value).map_err(|e| WireError::callback("criteria", &def.name, e))?;
					if wanted {
						parse_field(&def.inner, cur, fill)?
					} else {
						Value::Null
					}
				}
				TypeRef::DArray(def) => {
					let count = (def.count)(value).map_err(|e| WireError::callback("count", &def.name, e))?;
					let start = cur.pos();
					let mut items = Vec::with_capacity(count);
					for _ in 0..count {
						items.push(parse_field(&def.elem, cur, false)?);
					}
					let consumed = cur.pos() - start;
					let padded = round_up(consumed, def.padding);
					if padded > consumed {
						cur.read_exact(padded - consumed)?;
					}
					Value::List(items)
				}
				other => parse_field(other, cur, fill)?,
			};
			*value.slot_mut(flat_off + flat) = parsed;
			Ok(())
		}
		Entry::Embedded {
			ty,
			flat_start,
			extra_slot,
		} => {
			let start = cur.pos();
			let mode = if fill { Mode::Greedy } else { Mode::Exact };
			let extra = parse_level(ty, cur, value, flat_off + flat_start, mode)?;
			if let Some(slot) = extra_slot {
				*value.slot_mut(flat_off + slot) = Value::Bytes(extra);
			}
			if mode == Mode::Exact {
				let consumed = cur.pos() - start;
				let padded = round_up(consumed, ty.padding);
				if padded > consumed {
					cur.read_exact(padded - consumed)?;
				}
			}
			Ok(())
		}
	}
}

fn strip_nul(raw: &[u8]) -> Vec<u8> {
	let end = raw.iter().rposition(|byte| *byte != 0).map_or(0, |i| i + 1);
	raw[..end].to_vec()
}
